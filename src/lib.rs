//! part-intake: 倉庫部品入庫ツール
//!
//! ラベル写真からパーツコードを読み取り、部品カタログと照合して入庫ログに記録する。

pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod export;
pub mod imaging;
pub mod intake;
pub mod scanner;
pub mod store;
