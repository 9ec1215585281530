use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "part-intake")]
#[command(about = "倉庫部品入庫ツール（バーコード読取・カタログ照合・入庫ログ）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像からバーコードを読み取る（照合なし）
    Decode {
        /// 画像ファイル
        #[arg(required = true)]
        image: PathBuf,
    },

    /// 画像を読み取り、カタログ照合して入庫登録
    Scan {
        /// 画像ファイル
        #[arg(required = true)]
        image: PathBuf,

        /// 数量（省略時は対話入力）
        #[arg(short, long)]
        quantity: Option<String>,

        /// 保管場所（省略時は対話入力）
        #[arg(short, long)]
        location: Option<String>,

        /// 理由・備考
        #[arg(long)]
        reason: Option<String>,

        /// 登録者
        #[arg(short, long)]
        user: Option<String>,

        /// 照合結果の表示だけ行い登録しない
        #[arg(long)]
        dry_run: bool,
    },

    /// 部品コードを手入力して入庫登録
    Manual {
        /// 部品コード
        #[arg(required = true)]
        code: String,

        /// 数量
        #[arg(short, long)]
        quantity: String,

        /// 保管場所
        #[arg(short, long)]
        location: String,

        /// 理由・備考
        #[arg(long)]
        reason: Option<String>,

        /// 登録者
        #[arg(short, long)]
        user: Option<String>,
    },

    /// 部品コードをカタログと照合
    Match {
        /// 部品コード
        #[arg(required = true)]
        code: String,
    },

    /// 手入力用の候補を表示（空白を含むと最も近い1件）
    Search {
        /// 検索文字列
        #[arg(required = true)]
        query: String,
    },

    /// フォルダ内の画像を一括読み取り
    Batch {
        /// 画像フォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// 入庫ログを新しい順に表示
    List {
        /// 表示件数
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// 全件表示
        #[arg(long)]
        all: bool,
    },

    /// 入庫記録を編集
    Edit {
        /// 記録ID（先頭数文字でも可）
        #[arg(required = true)]
        id: String,

        #[arg(long)]
        code: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// 補助品番
        #[arg(long)]
        aux: Option<String>,

        #[arg(short, long)]
        quantity: Option<u32>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(long)]
        reason: Option<String>,

        #[arg(short, long)]
        user: Option<String>,
    },

    /// 入庫記録を削除
    Delete {
        /// 記録ID（先頭数文字でも可）
        #[arg(required = true)]
        id: String,

        /// 確認せずに削除
        #[arg(short, long)]
        yes: bool,
    },

    /// 入庫ログをCSV/Excelで出力
    Export {
        /// 出力形式 (csv/excel/both)
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 部品カタログの表示・取り込み
    Catalog {
        /// 取り込むファイル（xlsx/json）
        #[arg(long)]
        import: Option<PathBuf>,

        /// カタログを表示
        #[arg(long)]
        show: bool,
    },

    /// 設定を表示/編集
    Config {
        /// 既定の登録者を設定
        #[arg(long)]
        set_user: Option<String>,

        /// データディレクトリを設定
        #[arg(long)]
        set_data_dir: Option<PathBuf>,

        /// あいまい一致の許容距離を設定
        #[arg(long)]
        set_tolerance: Option<usize>,

        /// 読み取り採用の誤差閾値を設定
        #[arg(long)]
        set_threshold: Option<f32>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Excel,
    Both,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use csv, excel, or both", s)),
        }
    }
}
