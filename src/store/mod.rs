//! 入庫ログストア
//!
//! `scans.json` 全体を読み込み、変更して書き戻す。ロックは取らない（同時書き込みは想定外）。
//! 記録は位置ではなくUUIDで識別する。IDの無い旧形式の記録は読み込み時にIDを振って保存し直す。

pub mod catalog;

pub use catalog::{CatalogSource, JsonCatalogFile};

use crate::error::{IntakeError, Result};
use chrono::Utc;
use part_intake_common::{EntryPatch, IntakeEntry, DEFAULT_AUXILIARY_FLAG, UNKNOWN_USER};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

pub const SCANS_FILE_NAME: &str = "scans.json";

/// 登録前の入力内容
#[derive(Debug, Clone, Default)]
pub struct IntakeRequest {
    pub code: String,
    pub description: String,
    pub auxiliary_flag: String,
    pub quantity: String,
    pub location: String,
    pub reason: String,
    pub manual: bool,
    pub submitted_by: Option<String>,
}

impl IntakeRequest {
    /// 入力を検証して記録を作る
    pub fn validate(self) -> Result<IntakeEntry> {
        let code = self.code.trim().to_string();
        if !self.manual && code.is_empty() {
            return Err(IntakeError::Validation("バーコードが検出されていません".into()));
        }

        let quantity = self.quantity.trim();
        if quantity.is_empty() {
            return Err(IntakeError::Validation("数量は必須です".into()));
        }
        let quantity: u32 = quantity.parse().map_err(|_| {
            IntakeError::Validation(format!("数量は0以上の整数で入力してください: {}", quantity))
        })?;

        let location = self.location.trim().to_string();
        if location.is_empty() {
            return Err(IntakeError::Validation("保管場所は必須です".into()));
        }

        let auxiliary_flag = match self.auxiliary_flag.trim() {
            "" => DEFAULT_AUXILIARY_FLAG.to_string(),
            flag => flag.to_string(),
        };
        let submitted_by = self
            .submitted_by
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| UNKNOWN_USER.to_string());

        Ok(IntakeEntry {
            id: Uuid::new_v4(),
            code,
            description: self.description,
            auxiliary_flag,
            quantity,
            location,
            submitted_by,
            reason: self.reason.trim().to_string(),
            manual: self.manual,
            timestamp: Utc::now(),
        })
    }
}

/// 登録結果
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub id: Uuid,
    pub message: String,
}

/// 確定した記録の送り先
pub trait SubmissionSink {
    fn submit(&self, entry: IntakeEntry) -> Result<SubmitReceipt>;
}

/// ファイルベースの入庫ログ
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// データディレクトリのログを開く（無ければ作る）
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SCANS_FILE_NAME);
        if !path.exists() {
            fs::write(&path, "[]")?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 全件読み込み（空ファイルは0件）
    pub fn load(&self) -> Result<Vec<IntakeEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        let missing_ids = values.iter().filter(|v| v.get("id").is_none()).count();
        let entries = values
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<IntakeEntry>, _>>()?;

        if missing_ids > 0 {
            info!(count = missing_ids, path = %self.path.display(), "assigned ids to legacy entries");
            self.save(&entries)?;
        }

        Ok(entries)
    }

    pub fn save(&self, entries: &[IntakeEntry]) -> Result<()> {
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, entries)?;
        Ok(())
    }

    pub fn append(&self, entry: IntakeEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.save(&entries)
    }

    /// 新しい順に返す
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<IntakeEntry>> {
        let mut entries = self.load()?;
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub fn get(&self, id: Uuid) -> Result<IntakeEntry> {
        self.load()?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| IntakeError::EntryNotFound(id.to_string()))
    }

    /// IDの先頭部分から記録を特定する
    pub fn resolve_id(&self, prefix: &str) -> Result<Uuid> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(IntakeError::Validation("IDを指定してください".into()));
        }
        if let Ok(id) = Uuid::parse_str(&prefix) {
            return Ok(id);
        }

        let candidates: Vec<Uuid> = self
            .load()?
            .iter()
            .map(|e| e.id)
            .filter(|id| id.to_string().starts_with(&prefix))
            .collect();

        match candidates.as_slice() {
            [id] => Ok(*id),
            [] => Err(IntakeError::EntryNotFound(prefix)),
            _ => Err(IntakeError::Validation(format!(
                "IDが曖昧です（{}件一致）: {}",
                candidates.len(),
                prefix
            ))),
        }
    }

    pub fn update(&self, id: Uuid, patch: &EntryPatch) -> Result<IntakeEntry> {
        let mut entries = self.load()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| IntakeError::EntryNotFound(id.to_string()))?;
        patch.apply(entry);
        let updated = entry.clone();
        self.save(&entries)?;
        Ok(updated)
    }

    pub fn delete(&self, id: Uuid) -> Result<IntakeEntry> {
        let mut entries = self.load()?;
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| IntakeError::EntryNotFound(id.to_string()))?;
        let removed = entries.remove(index);
        self.save(&entries)?;
        Ok(removed)
    }
}

impl SubmissionSink for RecordStore {
    fn submit(&self, entry: IntakeEntry) -> Result<SubmitReceipt> {
        let id = entry.id;
        let code = entry.code.clone();
        self.append(entry)?;
        info!(%id, %code, "intake entry saved");
        Ok(SubmitReceipt {
            id,
            message: format!("登録しました: {}", code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str, quantity: &str, location: &str) -> IntakeRequest {
        IntakeRequest {
            code: code.into(),
            description: "Widget".into(),
            quantity: quantity.into(),
            location: location.into(),
            submitted_by: Some("kim".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        let entry = request(" ABC123 ", "4", " A-01 ").validate().unwrap();
        assert_eq!(entry.code, "ABC123");
        assert_eq!(entry.quantity, 4);
        assert_eq!(entry.location, "A-01");
        assert_eq!(entry.auxiliary_flag, "No");
        assert_eq!(entry.submitted_by, "kim");
        assert!(!entry.manual);
    }

    #[test]
    fn test_validate_requires_code_for_scans() {
        let result = request("", "4", "A-01").validate();
        assert!(matches!(result, Err(IntakeError::Validation(_))));
    }

    #[test]
    fn test_validate_manual_allows_empty_code() {
        let mut req = request("", "4", "A-01");
        req.manual = true;
        assert!(req.validate().unwrap().manual);
    }

    #[test]
    fn test_validate_quantity_and_location() {
        assert!(matches!(request("A", "", "L").validate(), Err(IntakeError::Validation(_))));
        assert!(matches!(request("A", "-3", "L").validate(), Err(IntakeError::Validation(_))));
        assert!(matches!(request("A", "two", "L").validate(), Err(IntakeError::Validation(_))));
        assert!(matches!(request("A", "2", "  ").validate(), Err(IntakeError::Validation(_))));
    }

    #[test]
    fn test_validate_unknown_user() {
        let mut req = request("A", "1", "L");
        req.submitted_by = Some("   ".into());
        assert_eq!(req.validate().unwrap().submitted_by, "UNKNOWN");
    }
}
