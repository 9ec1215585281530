//! 部品カタログの読み込み・取り込み
//!
//! カタログは `parts.json` のスナップショットとして読み込み、パイプラインからは変更しない。
//! 取り込みはExcel（先頭シート、1行目は見出し）またはJSONから行う。

use crate::error::{IntakeError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use part_intake_common::{Catalog, CatalogEntry, DEFAULT_AUXILIARY_FLAG};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const PARTS_FILE_NAME: &str = "parts.json";

/// カタログの取得元
pub trait CatalogSource {
    /// スナップショットを取得する。失敗は `CatalogUnavailable`。
    fn load(&self) -> Result<Catalog>;
}

/// JSONファイルのカタログ
#[derive(Debug, Clone)]
pub struct JsonCatalogFile {
    path: PathBuf,
}

impl JsonCatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PARTS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, catalog)?;
        Ok(())
    }
}

impl CatalogSource for JsonCatalogFile {
    fn load(&self) -> Result<Catalog> {
        let unavailable = |reason: String| {
            IntakeError::CatalogUnavailable(format!("{}: {}", self.path.display(), reason))
        };

        let content = fs::read_to_string(&self.path).map_err(|e| unavailable(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(Catalog::empty());
        }
        serde_json::from_str(&content).map_err(|e| unavailable(e.to_string()))
    }
}

/// 拡張子に応じてカタログを取り込む
pub fn import_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Err(IntakeError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => import_workbook(path),
        "json" => {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| IntakeError::CatalogImport(e.to_string()))
        }
        other => Err(IntakeError::CatalogImport(format!(
            "未対応の形式です: .{}（xlsx/json を指定してください）",
            other
        ))),
    }
}

fn cell_text(row: &[Data], index: usize) -> String {
    row.get(index)
        .map(|cell| cell.to_string().trim().to_string())
        .unwrap_or_default()
}

/// Excelの先頭シートを読む（列: コード, 説明, 補助品番）
pub fn import_workbook(path: &Path) -> Result<Catalog> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| IntakeError::CatalogImport(format!("{}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IntakeError::CatalogImport("シートがありません".into()))?
        .map_err(|e| IntakeError::CatalogImport(e.to_string()))?;

    let entries: Vec<CatalogEntry> = range
        .rows()
        .skip(1)
        .filter_map(|row| {
            let code = cell_text(row, 0);
            if code.is_empty() {
                return None;
            }
            let flag = cell_text(row, 2);
            let flag = if flag.is_empty() { DEFAULT_AUXILIARY_FLAG.to_string() } else { flag };
            Some(CatalogEntry::new(code, cell_text(row, 1)).with_auxiliary_flag(flag))
        })
        .collect();

    Catalog::from_entries(entries).map_err(|e| IntakeError::CatalogImport(e.to_string()))
}
