//! Excel出力（rust_xlsxwriter）

use crate::error::{IntakeError, Result};
use part_intake_common::IntakeEntry;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;

const HEADERS: [&str; 8] = [
    "code",
    "description",
    "quantity",
    "location",
    "mmpcPart",
    "reason",
    "timestamp",
    "encodedBy",
];

const COLUMN_WIDTHS: [f64; 8] = [16.0, 32.0, 10.0, 14.0, 14.0, 20.0, 26.0, 14.0];

fn build_workbook(entries: &[IntakeEntry]) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Intake")?;

    for (col, (header, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        sheet.set_column_width(col as u16, width)?;
    }

    for (index, entry) in entries.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, &entry.code)?;
        sheet.write_string(row, 1, &entry.description)?;
        sheet.write_number(row, 2, entry.quantity as f64)?;
        sheet.write_string(row, 3, &entry.location)?;
        sheet.write_string(row, 4, &entry.auxiliary_flag)?;
        sheet.write_string(row, 5, &entry.reason)?;
        sheet.write_string(
            row,
            6,
            entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        )?;
        sheet.write_string(row, 7, &entry.submitted_by)?;
    }

    Ok(workbook)
}

pub fn generate_excel(entries: &[IntakeEntry], output_path: &Path) -> Result<()> {
    if entries.is_empty() {
        return Err(IntakeError::NothingToExport);
    }

    let mut workbook = build_workbook(entries)
        .map_err(|e| IntakeError::ExcelGeneration(e.to_string()))?;
    workbook
        .save(output_path)
        .map_err(|e| IntakeError::ExcelGeneration(format!("{}: {}", output_path.display(), e)))?;
    Ok(())
}
