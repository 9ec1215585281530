//! 入庫パイプライン
//!
//! 読み取り → カタログ照合 → 登録 をまとめるセッションコンテキスト。
//! 状態はすべてこの構造体が持ち、関数には明示的に渡す（グローバル状態は持たない）。
//!
//! ## 変更履歴
//! - 2026-10-18: 初期作成

use crate::config::PipelineConfig;
use crate::decoder::{DecodeOrchestrator, DecodeOutcome, DecodeSession, SymbolDecoder};
use crate::error::{IntakeError, Result};
use crate::imaging;
use crate::store::{CatalogSource, IntakeRequest, SubmissionSink, SubmitReceipt};
use image::DynamicImage;
use part_intake_common::{match_code, Catalog, CatalogEntry, MatchOptions, MatchResult};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// 照合に使うカタログのスナップショット
///
/// 読み込みに失敗した場合は空のカタログで動き続ける（照合は常にNONE）。
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    catalog: Catalog,
    unavailable: Option<String>,
}

impl CatalogSnapshot {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            unavailable: None,
        }
    }

    pub fn load(source: &dyn CatalogSource) -> Self {
        match source.load() {
            Ok(catalog) => Self::new(catalog),
            Err(e) => {
                warn!(error = %e, "catalog unavailable, matching is degraded");
                Self {
                    catalog: Catalog::empty(),
                    unavailable: Some(e.to_string()),
                }
            }
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_degraded(&self) -> bool {
        self.unavailable.is_some()
    }

    /// 読み込み失敗の理由
    pub fn warning(&self) -> Option<&str> {
        self.unavailable.as_deref()
    }
}

/// 登録フォームの入力
#[derive(Debug, Clone, Default)]
pub struct IntakeForm {
    pub quantity: String,
    pub location: String,
    pub reason: String,
    pub submitted_by: Option<String>,
}

/// 画像1枚の読み取り・照合結果
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub decode: DecodeOutcome,
    pub matched: MatchResult,
}

pub struct IntakeContext<D> {
    orchestrator: DecodeOrchestrator<D>,
    snapshot: CatalogSnapshot,
    match_options: MatchOptions,
    session: DecodeSession,
}

impl<D: SymbolDecoder> IntakeContext<D> {
    pub fn new(decoder: D, config: &PipelineConfig, snapshot: CatalogSnapshot) -> Self {
        Self::with_orchestrator(
            DecodeOrchestrator::new(decoder, config),
            snapshot,
            config.match_options(),
        )
    }

    pub fn with_orchestrator(
        orchestrator: DecodeOrchestrator<D>,
        snapshot: CatalogSnapshot,
        match_options: MatchOptions,
    ) -> Self {
        Self {
            orchestrator,
            snapshot,
            match_options,
            session: DecodeSession::new(),
        }
    }

    pub fn orchestrator(&self) -> &DecodeOrchestrator<D> {
        &self.orchestrator
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    /// カタログを読み直す
    pub fn reload_catalog(&mut self, source: &dyn CatalogSource) {
        self.snapshot = CatalogSnapshot::load(source);
    }

    /// 画像からパーツコードを読み取る（全滅なら `DecodeFailure`）
    pub fn decode_barcode(&self, image: &DynamicImage) -> Result<String> {
        self.orchestrator.decode(image)
    }

    /// 生コードをカタログと照合する（失敗しない）
    pub fn match_code(&self, raw_code: &str) -> MatchResult {
        match_code(raw_code, self.snapshot.catalog(), &self.match_options)
    }

    /// 照合結果からエントリを取り出す
    ///
    /// 該当なしは `NoCatalogMatch`、カタログが読めていなければ `CatalogUnavailable`。
    pub fn require_entry(&self, result: &MatchResult, raw_code: &str) -> Result<CatalogEntry> {
        if let Some(entry) = result.entry() {
            return Ok(entry.clone());
        }
        match self.snapshot.warning() {
            Some(reason) => Err(IntakeError::CatalogUnavailable(reason.to_string())),
            None => Err(IntakeError::NoCatalogMatch(raw_code.to_string())),
        }
    }

    /// 手入力コードの確認（完全一致のみ）
    pub fn lookup_exact(&self, code: &str) -> Result<CatalogEntry> {
        let code = code.trim();
        match self.snapshot.catalog().get(code) {
            Some(entry) => Ok(entry.clone()),
            None => self.require_entry(&MatchResult::none(0), code),
        }
    }

    /// カタログのエントリとフォーム入力から記録を確定して送る
    pub fn submit(
        &self,
        sink: &dyn SubmissionSink,
        entry: &CatalogEntry,
        form: IntakeForm,
        manual: bool,
    ) -> Result<SubmitReceipt> {
        let request = IntakeRequest {
            code: entry.code.clone(),
            description: entry.description.clone(),
            auxiliary_flag: entry.auxiliary_flag.clone(),
            quantity: form.quantity,
            location: form.location,
            reason: form.reason,
            manual,
            submitted_by: form.submitted_by,
        };
        sink.submit(request.validate()?)
    }
}

impl<D: SymbolDecoder + 'static> IntakeContext<D> {
    /// 画像ファイルを読み取って照合する
    ///
    /// 呼び出した時点で世代番号を取る。完了前に新しい読み取りが始まった場合、
    /// この結果は `Superseded` として破棄される。
    pub fn scan_file(
        self: &Arc<Self>,
        path: PathBuf,
    ) -> impl Future<Output = Result<ScanOutcome>> + Send + 'static {
        self.scan_with(move || imaging::load_image(&path))
    }

    /// アップロードされたバイト列を読み取って照合する
    pub fn scan_bytes(
        self: &Arc<Self>,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<ScanOutcome>> + Send + 'static {
        self.scan_with(move || imaging::load_image_from_bytes(&bytes))
    }

    fn scan_with<F>(self: &Arc<Self>, load: F) -> impl Future<Output = Result<ScanOutcome>> + Send + 'static
    where
        F: FnOnce() -> Result<DynamicImage> + Send + 'static,
    {
        let ticket = self.session.begin();
        let context = Arc::clone(self);

        async move {
            let worker = Arc::clone(&context);
            let decoded = tokio::task::spawn_blocking(move || {
                let image = load()?;
                worker.orchestrator.decode_detailed(&image)
            })
            .await
            .map_err(|e| IntakeError::Io(std::io::Error::other(e)))?;

            let decode = context.session.settle(ticket, decoded)?;
            let matched = context.match_code(&decode.code);
            Ok(ScanOutcome { decode, matched })
        }
    }
}
