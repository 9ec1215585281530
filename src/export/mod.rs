pub mod csv;
pub mod excel;

use crate::cli::ExportFormat;
use crate::error::{IntakeError, Result};
use part_intake_common::IntakeEntry;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_STEM: &str = "scanned_parts";

fn output_path_for_format(output: &Path, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", DEFAULT_FILE_STEM, extension))
    } else {
        output.to_path_buf()
    }
}

fn output_paths_for_both(output: &Path) -> (PathBuf, PathBuf) {
    if output.is_dir() || output.extension().is_none() {
        (
            output.join(format!("{}.csv", DEFAULT_FILE_STEM)),
            output.join(format!("{}.xlsx", DEFAULT_FILE_STEM)),
        )
    } else {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let stem = output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_FILE_STEM);
        (
            parent.join(format!("{}.csv", stem)),
            parent.join(format!("{}.xlsx", stem)),
        )
    }
}

/// 入庫ログを書き出し、作成したファイルのパスを返す
pub fn export_entries(
    entries: &[IntakeEntry],
    format: &ExportFormat,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    if entries.is_empty() {
        return Err(IntakeError::NothingToExport);
    }

    let written = match format {
        ExportFormat::Csv => {
            let path = output_path_for_format(output, "csv");
            csv::write_csv(entries, &path)?;
            vec![path]
        }
        ExportFormat::Excel => {
            let path = output_path_for_format(output, "xlsx");
            excel::generate_excel(entries, &path)?;
            vec![path]
        }
        ExportFormat::Both => {
            let (csv_path, excel_path) = output_paths_for_both(output);
            csv::write_csv(entries, &csv_path)?;
            excel::generate_excel(entries, &excel_path)?;
            vec![csv_path, excel_path]
        }
    };

    Ok(written)
}
