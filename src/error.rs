use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("バーコードを読み取れませんでした（{attempts}通り試行）。手入力で登録してください")]
    DecodeFailure { attempts: usize },

    #[error("読み取りは成功しましたが、カタログに該当する部品がありません: {0}")]
    NoCatalogMatch(String),

    #[error("部品カタログを読み込めません（照合は無効）: {0}")]
    CatalogUnavailable(String),

    #[error("新しい読み取りが開始されたため、この結果は破棄されました")]
    Superseded,

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("入庫記録が見つかりません: {0}")]
    EntryNotFound(String),

    #[error("入力エラー: {0}")]
    Validation(String),

    #[error("エクスポートする記録がありません")]
    NothingToExport,

    #[error("カタログ取り込みエラー: {0}")]
    CatalogImport(String),

    #[error("入力プロンプトエラー: {0}")]
    Prompt(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] part_intake_common::Error),
}

impl IntakeError {
    /// 手入力で回復できる読み取り失敗か
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, IntakeError::DecodeFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
