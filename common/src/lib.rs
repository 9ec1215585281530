//! Part Intake Common Library
//!
//! CLIとブラウザクライアントで共有される型と照合ロジック

pub mod types;
pub mod matcher;
pub mod error;

pub use types::{
    Catalog, CatalogEntry, EntryPatch, IntakeEntry, MatchResult, MatchStatus,
    DEFAULT_AUXILIARY_FLAG, UNKNOWN_USER,
};
pub use matcher::{levenshtein_distance, match_code, suggest, MatchOptions};
pub use error::{Error, Result};
