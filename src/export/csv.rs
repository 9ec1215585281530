//! CSV出力
//!
//! 列順は既存の集計シートに合わせて固定。

use crate::error::{IntakeError, Result};
use part_intake_common::IntakeEntry;
use std::path::Path;

pub const CSV_HEADER: &str = "code,description,quantity,location,mmpcPart,reason,timestamp,encodedBy";

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn build_csv(entries: &[IntakeEntry]) -> Result<String> {
    if entries.is_empty() {
        return Err(IntakeError::NothingToExport);
    }

    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for entry in entries {
        let fields = [
            escape_field(&entry.code),
            escape_field(&entry.description),
            entry.quantity.to_string(),
            escape_field(&entry.location),
            escape_field(&entry.auxiliary_flag),
            escape_field(&entry.reason),
            entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            escape_field(&entry.submitted_by),
        ];
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }

    Ok(csv)
}

pub fn write_csv(entries: &[IntakeEntry], output_path: &Path) -> Result<()> {
    let csv = build_csv(entries)?;
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, csv)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, description: &str) -> IntakeEntry {
        let json = format!(
            r#"{{"code":"{}","description":"{}","quantity":5,"location":"A-01","encodedBy":"kim","timestamp":"2025-11-02T08:15:00Z"}}"#,
            code, description
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_header_and_row() {
        let csv = build_csv(&[entry("ABC123", "Widget")]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("ABC123,Widget,5,A-01,No,,2025-11-02T08:15:00.000Z,kim")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let csv = build_csv(&[entry("BRK-1", "Bracket, long")]).unwrap();
        assert!(csv.contains("BRK-1,\"Bracket, long\",5"));
    }

    #[test]
    fn test_quotes_are_doubled() {
        assert_eq!(escape_field(r#"6" pipe"#), r#""6"" pipe""#);
        assert_eq!(escape_field("plain"), "plain");
    }

    #[test]
    fn test_empty_log_is_an_error() {
        assert!(matches!(build_csv(&[]), Err(IntakeError::NothingToExport)));
    }
}
