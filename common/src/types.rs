//! 部品カタログと入庫記録の型定義
//!
//! CLIとブラウザクライアントで共有される型:
//! - CatalogEntry / Catalog: 部品マスタ（読み取り専用スナップショット）
//! - MatchResult: カタログ照合の戻り値
//! - IntakeEntry: 入庫ログに追記される記録

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// 補助品番が無い場合の値
pub const DEFAULT_AUXILIARY_FLAG: &str = "No";

/// 登録者不明の場合の値
pub const UNKNOWN_USER: &str = "UNKNOWN";

fn default_auxiliary_flag() -> String {
    DEFAULT_AUXILIARY_FLAG.to_string()
}

fn unknown_user() -> String {
    UNKNOWN_USER.to_string()
}

/// カタログの1部品
///
/// ディスク上の `parts.json` では補助品番を `mmpcPart` として保存する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub code: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "mmpcPart", alias = "auxiliaryFlag", default = "default_auxiliary_flag")]
    pub auxiliary_flag: String,
}

impl CatalogEntry {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            auxiliary_flag: default_auxiliary_flag(),
        }
    }

    pub fn with_auxiliary_flag(mut self, flag: impl Into<String>) -> Self {
        self.auxiliary_flag = flag.into();
        self
    }
}

/// 部品カタログのスナップショット
///
/// コードは大文字小文字を区別して一意。順序は読み込み順のまま保持し、
/// あいまい照合の同点判定に使われる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CatalogEntry>", into = "Vec<CatalogEntry>")]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// 重複コードを検査してカタログを構築
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.code.as_str()) {
                return Err(Error::DuplicateCode(entry.code.clone()));
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// 完全一致でルックアップ
    pub fn get(&self, code: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<CatalogEntry>> for Catalog {
    type Error = Error;

    fn try_from(entries: Vec<CatalogEntry>) -> Result<Self, Self::Error> {
        Self::from_entries(entries)
    }
}

impl From<Catalog> for Vec<CatalogEntry> {
    fn from(catalog: Catalog) -> Self {
        catalog.entries
    }
}

/// 照合ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    #[serde(rename = "EXACT")]
    Exact,
    #[serde(rename = "FUZZY")]
    Fuzzy,
    #[serde(rename = "NONE")]
    NoMatch,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Exact => write!(f, "EXACT"),
            MatchStatus::Fuzzy => write!(f, "FUZZY"),
            MatchStatus::NoMatch => write!(f, "NONE"),
        }
    }
}

/// 照合結果
///
/// `NoMatch` は必ずエントリを持たない。コンストラクタ経由でのみ作られる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    status: MatchStatus,
    entry: Option<CatalogEntry>,
    distance: usize,
}

impl MatchResult {
    pub fn exact(entry: CatalogEntry) -> Self {
        Self {
            status: MatchStatus::Exact,
            entry: Some(entry),
            distance: 0,
        }
    }

    pub fn fuzzy(entry: CatalogEntry, distance: usize) -> Self {
        Self {
            status: MatchStatus::Fuzzy,
            entry: Some(entry),
            distance,
        }
    }

    /// `distance` は最も近かった候補との距離（カタログが空なら0）
    pub fn none(distance: usize) -> Self {
        Self {
            status: MatchStatus::NoMatch,
            entry: None,
            distance,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn entry(&self) -> Option<&CatalogEntry> {
        self.entry.as_ref()
    }

    pub fn into_entry(self) -> Option<CatalogEntry> {
        self.entry
    }

    pub fn distance(&self) -> usize {
        self.distance
    }

    pub fn is_match(&self) -> bool {
        self.status != MatchStatus::NoMatch
    }
}

/// 入庫記録
///
/// 旧形式（`id` なし、数量が文字列）のログも読み込めるようにしている。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "mmpcPart", default = "default_auxiliary_flag")]
    pub auxiliary_flag: String,

    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantity: u32,

    #[serde(default)]
    pub location: String,

    #[serde(rename = "encodedBy", default = "unknown_user")]
    pub submitted_by: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub manual: bool,

    pub timestamp: DateTime<Utc>,
}

/// 数値・文字列どちらの数量も受け付ける（不正値は0）
fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let quantity = match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    };
    Ok(u32::try_from(quantity).unwrap_or(u32::MAX))
}

/// 入庫記録の部分更新
///
/// 指定されたフィールドだけを上書きする。ID・タイムスタンプ・手入力フラグは変更しない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryPatch {
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "mmpcPart")]
    pub auxiliary_flag: Option<String>,
    pub quantity: Option<u32>,
    pub location: Option<String>,
    #[serde(rename = "encodedBy")]
    pub submitted_by: Option<String>,
    pub reason: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, entry: &mut IntakeEntry) {
        if let Some(code) = &self.code {
            entry.code = code.clone();
        }
        if let Some(description) = &self.description {
            entry.description = description.clone();
        }
        if let Some(flag) = &self.auxiliary_flag {
            entry.auxiliary_flag = flag.clone();
        }
        if let Some(quantity) = self.quantity {
            entry.quantity = quantity;
        }
        if let Some(location) = &self.location {
            entry.location = location.clone();
        }
        if let Some(user) = &self.submitted_by {
            entry.submitted_by = user.clone();
        }
        if let Some(reason) = &self.reason {
            entry.reason = reason.clone();
        }
    }
}
