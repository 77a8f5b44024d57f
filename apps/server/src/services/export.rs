//! Work order list exports: CSV and Excel.
//!
//! Both formats carry the same columns. Free-text cells that a spreadsheet
//! would read as a formula are prefixed with an apostrophe.

use std::borrow::Cow;

use rust_xlsxwriter::{Format, Workbook};

use crate::error::{AppError, AppResult};
use crate::models::work_order::WorkOrderRow;

/// Column titles, in order.
pub const HEADERS: [&str; 8] = [
    "number",
    "job_type",
    "scheduled_date",
    "status",
    "site",
    "team",
    "progress",
    "approved_at",
];

/// Neutralize cells spreadsheets would evaluate (`=`, `+`, `-`, `@`, tab, CR).
pub fn spreadsheet_safe(value: &str) -> Cow<'_, str> {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => Cow::Owned(format!("'{}", value)),
        _ => Cow::Borrowed(value),
    }
}

fn cells(row: &WorkOrderRow) -> [String; 8] {
    [
        spreadsheet_safe(&row.number).into_owned(),
        row.job_type.as_str().to_string(),
        row.scheduled_date.to_string(),
        row.status.as_str().to_string(),
        spreadsheet_safe(&row.site_name).into_owned(),
        spreadsheet_safe(row.assigned_team.as_deref().unwrap_or("")).into_owned(),
        row.progress.to_string(),
        row.approved_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
    ]
}

/// CSV with a header record and CRLF line endings.
pub fn work_orders_csv(rows: &[WorkOrderRow]) -> AppResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(HEADERS)?;
    for row in rows {
        writer.write_record(cells(row))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("Failed to finish CSV: {}", e)))
}

/// Single-sheet workbook with a bold header row.
pub fn work_orders_xlsx(rows: &[WorkOrderRow]) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Work orders")?;
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }
    for (index, row) in rows.iter().enumerate() {
        let line = (index + 1) as u32;
        for (col, value) in cells(row).iter().enumerate() {
            sheet.write_string(line, col as u16, value)?;
        }
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobType, WorkOrderProgress, WorkOrderStatus};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn row(site_name: &str, team: Option<&str>) -> WorkOrderRow {
        WorkOrderRow {
            id: Uuid::new_v4(),
            number: "WO-202610-0001".to_string(),
            job_type: JobType::Pm,
            scheduled_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            status: WorkOrderStatus::InProgress,
            site_id: Uuid::new_v4(),
            site_name: site_name.to_string(),
            assigned_team: team.map(str::to_string),
            progress: WorkOrderProgress { done: 2, total: 3 },
            approved_at: None,
        }
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let bytes = work_orders_csv(&[row("Central Plaza", None)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "number,job_type,scheduled_date,status,site,team,progress,approved_at"
        );
        assert_eq!(
            lines[1],
            "WO-202610-0001,PM,2026-10-19,IN_PROGRESS,Central Plaza,,2/3,"
        );
    }

    #[test]
    fn test_csv_quotes_commas_and_quotes() {
        let bytes = work_orders_csv(&[row("Plaza, \"East\" wing", None)]).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[4], "Plaza, \"East\" wing");
    }

    #[test]
    fn test_formula_cells_are_neutralized() {
        let bytes = work_orders_csv(&[row("=HYPERLINK(\"http://x\")", Some("@team"))]).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[4], "'=HYPERLINK(\"http://x\")");
        assert_eq!(&record[5], "'@team");
        assert_eq!(spreadsheet_safe("North wing"), "North wing");
    }

    #[test]
    fn test_xlsx_is_a_zip_package() {
        let bytes = work_orders_xlsx(&[row("Central Plaza", Some("Team A"))]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
