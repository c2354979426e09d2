//! Excel export of the inspection checklist

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use tenken_domain::service::render_state::{display_order, format_timestamp, render_state};
use tenken_types::{AggregateCounts, Error, PartitionConfig, Result, VehicleRecord};

/// One partition's worth of export data
#[derive(Debug, Clone)]
pub struct ChecklistSection {
    pub partition: PartitionConfig,
    pub records: Vec<VehicleRecord>,
    pub counts: AggregateCounts,
}

const SUMMARY_SHEET: &str = "集計";
const MAX_SHEET_NAME: usize = 31;

fn xl<T>(result: std::result::Result<T, rust_xlsxwriter::XlsxError>) -> Result<T> {
    result.map_err(|e| Error::Excel(e.to_string()))
}

/// Export a summary sheet plus one checklist sheet per partition
pub fn export_checklist(
    sections: &[ChecklistSection],
    generated_at: DateTime<Utc>,
    offset: FixedOffset,
    output_path: &Path,
) -> Result<()> {
    let mut workbook = Workbook::new();
    let today = generated_at.with_timezone(&offset).date_naive();

    let summary_sheet = workbook.add_worksheet();
    write_summary_sheet(summary_sheet, sections, &format_timestamp(generated_at, offset))?;

    for (section, name) in sections.iter().zip(sheet_names(sections)) {
        let sheet = workbook.add_worksheet();
        xl(sheet.set_name(&name))?;
        write_partition_sheet(sheet, section, today)?;
    }

    xl(workbook.save(output_path))?;
    Ok(())
}

fn write_summary_sheet(
    sheet: &mut Worksheet,
    sections: &[ChecklistSection],
    generated_label: &str,
) -> Result<()> {
    xl(sheet.set_name(SUMMARY_SHEET))?;
    let header_format = Format::new().set_bold();

    xl(sheet.write_string_with_format(0, 0, "点検集計", &header_format))?;
    xl(sheet.write_string(1, 0, "出力日時:"))?;
    xl(sheet.write_string(1, 1, generated_label))?;

    let headers = ["市", "完了", "停止", "スキップ", "総数", "残り", "進捗 %"];
    for (col, header) in headers.iter().enumerate() {
        xl(sheet.write_string_with_format(3, col as u16, *header, &header_format))?;
    }

    let mut row = 4;
    for section in sections {
        write_counts_row(sheet, row, &section.partition.name, &section.counts)?;
        row += 1;
    }
    let overall: AggregateCounts = sections.iter().map(|s| s.counts).sum();
    write_counts_row(sheet, row, "合計", &overall)?;

    xl(sheet.set_column_width(0, 14))?;
    Ok(())
}

fn write_counts_row(sheet: &mut Worksheet, row: u32, label: &str, counts: &AggregateCounts) -> Result<()> {
    xl(sheet.write_string(row, 0, label))?;
    let values = [
        counts.done,
        counts.stopped,
        counts.skipped,
        counts.total,
        counts.remaining,
    ];
    for (i, value) in values.iter().enumerate() {
        xl(sheet.write_number(row, (i + 1) as u16, *value as f64))?;
    }
    xl(sheet.write_number(row, 6, counts.progress_percent()))?;
    Ok(())
}

/// Excel-safe worksheet name: no `[]:*?/\`, no edge quotes, at most 31 chars
fn clean_sheet_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    replaced
        .trim()
        .trim_matches('\'')
        .chars()
        .take(MAX_SHEET_NAME)
        .collect()
}

/// One unique sheet name per section, tried as name, then slug, then prefix
fn sheet_names(sections: &[ChecklistSection]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::from([SUMMARY_SHEET.to_lowercase()]);
    sections
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let p = &section.partition;
            let name = [p.name.as_str(), p.slug.as_str(), p.prefix.as_str()]
                .into_iter()
                .map(clean_sheet_name)
                .find(|n| !n.is_empty() && !used.contains(&n.to_lowercase()))
                .unwrap_or_else(|| format!("Sheet{}", i + 2));
            used.insert(name.to_lowercase());
            name
        })
        .collect()
}

fn write_partition_sheet(sheet: &mut Worksheet, section: &ChecklistSection, today: NaiveDate) -> Result<()> {
    let header_format = Format::new().set_bold();

    let headers = ["No.", "状態", "ステーション", "車種", "ナンバー", "住所", "最終点検日", "担当", "備考"];
    for (col, header) in headers.iter().enumerate() {
        xl(sheet.write_string_with_format(0, col as u16, *header, &header_format))?;
    }

    for (row_idx, &pos) in display_order(&section.records).iter().enumerate() {
        let row = (row_idx + 1) as u32;
        let record = &section.records[pos];
        let cells = [
            record.display_index.as_str(),
            render_state(record, today).label(),
            record.station.as_str(),
            record.model.as_str(),
            record.plate.as_str(),
            record.address.as_str(),
            record.last_inspected_at.as_str(),
            record.operator.as_str(),
            record.note.as_str(),
        ];
        for (col, cell) in cells.iter().enumerate() {
            xl(sheet.write_string(row, col as u16, *cell))?;
        }
    }

    xl(sheet.set_column_width(2, 24))?;
    xl(sheet.set_column_width(4, 20))?;
    xl(sheet.set_column_width(5, 30))?;
    Ok(())
}
