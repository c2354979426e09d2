//! Output formatting module

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;

use tenken_app::sync::SyncReport;
use tenken_domain::service::render_state::format_timestamp;
use tenken_domain::service::{display_order, render_state, RenderState};
use tenken_types::{AggregateCounts, OutputFormat, PartitionConfig, Result, VehicleRecord};

#[derive(Serialize)]
struct ChecklistRow<'a> {
    #[serde(flatten)]
    record: &'a VehicleRecord,
    state: RenderState,
}

#[derive(Serialize)]
struct CountsRow<'a> {
    partition: &'a str,
    #[serde(flatten)]
    counts: AggregateCounts,
    progress_percent: f64,
}

pub fn output_checklist(
    output_format: OutputFormat,
    partition: &PartitionConfig,
    records: &[VehicleRecord],
    today: NaiveDate,
) -> Result<()> {
    let order = display_order(records);

    if output_format == OutputFormat::Json {
        let rows: Vec<ChecklistRow> = order
            .iter()
            .map(|&i| ChecklistRow {
                record: &records[i],
                state: render_state(&records[i], today),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} ({})", partition.name, partition.prefix);
    println!("{}", "=".repeat(40));

    if records.is_empty() {
        println!("No records. Run 'tenken-checker sync' first.");
        return Ok(());
    }

    println!(
        "{:<6} {:<8} {:<20} {:<12} {:<16} {:<10}",
        "No.", "State", "Station", "Model", "Plate", "Last"
    );
    println!("{}", "-".repeat(78));

    for &i in &order {
        let record = &records[i];
        println!(
            "{:<6} {:<8} {:<20} {:<12} {:<16} {:<10}",
            record.display_index,
            render_state(record, today).label(),
            record.station,
            record.model,
            record.plate,
            if record.last_inspected_at.is_empty() {
                "-"
            } else {
                record.last_inspected_at.as_str()
            }
        );
    }

    Ok(())
}

pub fn output_counts(output_format: OutputFormat, rows: &[(String, AggregateCounts)]) -> Result<()> {
    let overall: AggregateCounts = rows.iter().map(|(_, c)| *c).sum();

    if output_format == OutputFormat::Json {
        let mut json_rows: Vec<CountsRow> = rows
            .iter()
            .map(|(name, counts)| CountsRow {
                partition: name,
                counts: *counts,
                progress_percent: counts.progress_percent(),
            })
            .collect();
        if rows.len() > 1 {
            json_rows.push(CountsRow {
                partition: "total",
                counts: overall,
                progress_percent: overall.progress_percent(),
            });
        }
        println!("{}", serde_json::to_string_pretty(&json_rows)?);
        return Ok(());
    }

    println!(
        "{:<12} {:>6} {:>6} {:>6} {:>6} {:>6} {:>8}",
        "City", "Done", "Stop", "Skip", "Total", "Left", "Progress"
    );
    println!("{}", "-".repeat(58));
    for (name, counts) in rows {
        print_counts_line(name, counts);
    }
    if rows.len() > 1 {
        println!("{}", "-".repeat(58));
        print_counts_line("Total", &overall);
    }

    Ok(())
}

fn print_counts_line(label: &str, counts: &AggregateCounts) {
    println!(
        "{:<12} {:>6} {:>6} {:>6} {:>6} {:>6} {:>7.1}%",
        label,
        counts.done,
        counts.stopped,
        counts.skipped,
        counts.total,
        counts.remaining,
        counts.progress_percent()
    );
}

pub fn output_sync_report(output_format: OutputFormat, report: &SyncReport, offset: FixedOffset) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("\nSync Result");
    println!("===========");
    println!("Finished:   {}", format_timestamp(report.finished_at, offset));
    match report.pushed {
        Some(true) => println!("Push:       ok"),
        Some(false) => println!(
            "Push:       failed ({})",
            report.push_error.as_deref().unwrap_or("unknown")
        ),
        None => {}
    }
    if report.config_refreshed {
        println!("Config:     reloaded from endpoint");
    }
    if let Some(ref e) = report.config_error {
        println!("Config:     {}", e);
    }
    println!("Rows:       {}", report.rows_pulled);
    if report.unassigned > 0 {
        println!("Unassigned: {}", report.unassigned);
    }
    println!();

    println!(
        "{:<12} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
        "City", "Total", "Kept", "New", "Gone", "Done", "Left"
    );
    println!("{}", "-".repeat(56));
    for p in &report.partitions {
        println!(
            "{:<12} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}{}",
            p.name,
            p.counts.total,
            p.matched + p.kept,
            p.added,
            p.dropped,
            p.counts.done,
            p.counts.remaining,
            if p.reset { "  (reset)" } else { "" }
        );
    }

    for (name, error) in report.storage_errors() {
        eprintln!("Warning: {} was not saved: {}", name, error);
    }

    Ok(())
}

pub fn output_record(output_format: OutputFormat, record: &VehicleRecord, today: NaiveDate) -> Result<()> {
    if output_format == OutputFormat::Json {
        let row = ChecklistRow {
            record,
            state: render_state(record, today),
        };
        println!("{}", serde_json::to_string_pretty(&row)?);
    } else {
        println!(
            "{} {} {} [{}]",
            record.display_index,
            record.station,
            record.plate,
            render_state(record, today).label()
        );
    }
    Ok(())
}

pub fn output_partitions(output_format: OutputFormat, partitions: &[(&PartitionConfig, usize)]) -> Result<()> {
    if output_format == OutputFormat::Json {
        #[derive(Serialize)]
        struct CityRow<'a> {
            #[serde(flatten)]
            partition: &'a PartitionConfig,
            records: usize,
        }
        let rows: Vec<CityRow> = partitions
            .iter()
            .map(|&(partition, records)| CityRow { partition, records })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<12} {:<12} {:<6} {:<8} {:>7}", "City", "Slug", "Prefix", "Status", "Records");
    println!("{}", "-".repeat(50));
    for (partition, records) in partitions {
        println!(
            "{:<12} {:<12} {:<6} {:<8} {:>7}",
            partition.name,
            partition.slug,
            partition.prefix,
            if partition.is_offered() { "active" } else { "stop" },
            records
        );
    }
    Ok(())
}
