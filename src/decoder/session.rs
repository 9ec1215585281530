//! 読み取りの世代管理
//!
//! 新しい画像が渡されると前の読み取りは古くなる。古い読み取りが後から完了しても、
//! その結果で新しい状態を上書きしないよう、世代番号で破棄する。

use crate::error::{IntakeError, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// 読み取り開始時に発行される世代番号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeTicket(u64);

impl DecodeTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct DecodeSession {
    latest: AtomicU64,
}

impl DecodeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい読み取りを開始する（それ以前のチケットは無効になる）
    pub fn begin(&self) -> DecodeTicket {
        DecodeTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: DecodeTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// 最新の読み取りの結果だけを通す
    pub fn settle<T>(&self, ticket: DecodeTicket, result: Result<T>) -> Result<T> {
        if self.is_current(ticket) {
            result
        } else {
            Err(IntakeError::Superseded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ticket_is_current() {
        let session = DecodeSession::new();
        let first = session.begin();
        assert!(session.is_current(first));

        let second = session.begin();
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let session = DecodeSession::new();
        let stale = session.begin();
        let fresh = session.begin();

        let stale_result = session.settle(stale, Ok("OLD-1".to_string()));
        assert!(matches!(stale_result, Err(IntakeError::Superseded)));

        let fresh_result = session.settle(fresh, Ok("NEW-2".to_string()));
        assert_eq!(fresh_result.unwrap(), "NEW-2");
    }

    #[test]
    fn test_errors_pass_through_for_current_ticket() {
        let session = DecodeSession::new();
        let ticket = session.begin();
        let result: Result<String> = session.settle(ticket, Err(IntakeError::DecodeFailure { attempts: 7 }));
        assert!(matches!(result, Err(IntakeError::DecodeFailure { attempts: 7 })));
    }
}
