//! Command handlers

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::output::{
    output_checklist, output_counts, output_partitions, output_record, output_sync_report,
};
use tenken_app::bootstrap::App;
use tenken_app::checklist;
use tenken_app::config::Config;
use tenken_app::repository::open_sheet_client;
use tenken_app::sync::SyncOptions;
use tenken_domain::repository::PartitionRepository;
use tenken_domain::service::render_state::today_at;
use tenken_domain::service::{count_records, reset};
use tenken_infra::excel_export::{export_checklist, ChecklistSection};
use tenken_infra::paste_import;
use tenken_types::{Error, InspectionStatus, OutputFormat, Result};

/// Execute CLI command
pub fn execute(cli: Cli) -> Result<()> {
    // Config edits do not need storage
    if let Commands::Config {
        show,
        set_endpoint,
        set_sheet,
        set_timeout,
        set_output,
        set_push_before_pull,
        reset,
    } = &cli.command
    {
        return cmd_config(
            *show,
            set_endpoint.clone(),
            set_sheet.clone(),
            *set_timeout,
            *set_output,
            *set_push_before_pull,
            *reset,
        );
    }

    let config = Config::load()?;
    let output_format = cli.format.unwrap_or(config.output_format);
    let mut app = App::bootstrap(config)?;

    match &cli.command {
        Commands::Sync {
            push,
            reset,
            reset_all,
            refresh_config,
        } => {
            let options = SyncOptions {
                push: *push || app.config.push_before_pull,
                reset: reset.clone(),
                reset_all: *reset_all,
                refresh_config: *refresh_config,
            };
            cmd_sync(app, options, output_format)
        }

        Commands::List { partition } => cmd_list(&app, partition, output_format),

        Commands::Counts { partition } => cmd_counts(&app, partition.as_deref(), output_format),

        Commands::Check { partition, key } => {
            let today = today_at(app.config.offset());
            let target = app.partition(partition)?.clone();
            let record = checklist::check(&mut app.store, &target, key, today)?;
            output_record(output_format, &record, today)
        }

        Commands::Uncheck { partition, key } => {
            let target = app.partition(partition)?.clone();
            let record = checklist::uncheck(&mut app.store, &target, key)?;
            output_record(output_format, &record, today_at(app.config.offset()))
        }

        Commands::SetStatus {
            partition,
            key,
            status,
        } => {
            let target = app.partition(partition)?.clone();
            let status: InspectionStatus = (*status).into();
            let record = checklist::set_status(&mut app.store, &target, key, status)?;
            output_record(output_format, &record, today_at(app.config.offset()))
        }

        Commands::SetDate {
            partition,
            key,
            date,
            clear,
        } => {
            let today = today_at(app.config.offset());
            let target = app.partition(partition)?.clone();
            let date = match (clear, date) {
                (true, _) => String::new(),
                (false, Some(date)) => date.clone(),
                (false, None) => today.format("%Y-%m-%d").to_string(),
            };
            let record = checklist::set_last_inspected(&mut app.store, &target, key, &date)?;
            output_record(output_format, &record, today)
        }

        Commands::Reset { partition } => {
            let target = app.partition(partition)?.clone();
            reset(&mut app.store, &target)?;
            println!("Cleared local records of {}", target.name);
            Ok(())
        }

        Commands::Cities { all } => cmd_cities(&app, *all, output_format),

        Commands::Import { partition, file } => cmd_import(&mut app, partition, file.clone()),

        Commands::Export { output } => cmd_export(&app, output.clone()),

        Commands::Config { .. } => Ok(()),
    }
}

fn sync_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn cmd_sync(app: App, options: SyncOptions, output_format: OutputFormat) -> Result<()> {
    options.validate(&app.partitions)?;
    let client = open_sheet_client(&app.config)?;
    let offset = app.config.offset();
    debug!("Syncing against {}", client.endpoint());

    let (mut orchestrator, _guard) = app.into_orchestrator(client);
    let runtime = tokio::runtime::Runtime::new()?;

    let pb = sync_spinner();
    let result = runtime.block_on(async {
        let mut phases = orchestrator.subscribe();
        let spinner = pb.clone();
        let watcher = tokio::spawn(async move {
            while phases.changed().await.is_ok() {
                let phase = *phases.borrow_and_update();
                spinner.set_message(phase.label());
                if phase.is_terminal() {
                    break;
                }
            }
        });
        let result = orchestrator.sync(&options).await;
        watcher.abort();
        result
    });
    pb.finish_and_clear();

    match result {
        Ok(report) => output_sync_report(output_format, &report, offset),
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(Error::Sync(e))
        }
    }
}

fn cmd_list(app: &App, partition: &str, output_format: OutputFormat) -> Result<()> {
    let target = app.partition(partition)?;
    let records = app.store.read(&target.name);
    output_checklist(output_format, target, &records, today_at(app.config.offset()))
}

fn cmd_counts(app: &App, partition: Option<&str>, output_format: OutputFormat) -> Result<()> {
    let formula = app.config.remaining_formula;
    let rows = match partition {
        Some(name) => {
            let target = app.partition(name)?;
            vec![(
                target.name.clone(),
                count_records(&app.store.read(&target.name), formula),
            )]
        }
        None => app
            .offered_partitions()
            .into_iter()
            .map(|p| (p.name.clone(), count_records(&app.store.read(&p.name), formula)))
            .collect(),
    };
    output_counts(output_format, &rows)
}

fn cmd_cities(app: &App, all: bool, output_format: OutputFormat) -> Result<()> {
    let rows: Vec<_> = app
        .partitions
        .iter()
        .filter(|p| all || p.is_offered())
        .map(|p| (p, app.store.read(&p.name).len()))
        .collect();
    output_partitions(output_format, &rows)
}

fn cmd_import(app: &mut App, partition: &str, file: PathBuf) -> Result<()> {
    let target = app.partition(partition)?.clone();
    let records = paste_import::load_file(&file)?;
    let outcome =
        checklist::import_records(&mut app.store, &target, records, app.config.orphan_policy)?;

    println!("Imported into {}:", target.name);
    println!("  Records:  {}", outcome.records.len());
    println!("  Matched:  {}", outcome.matched);
    println!("  New:      {}", outcome.added);
    println!("  Removed:  {}", outcome.dropped);
    Ok(())
}

fn cmd_export(app: &App, output: Option<PathBuf>) -> Result<()> {
    let now = Utc::now();
    let offset = app.config.offset();
    let output_path = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "tenken-{}.xlsx",
            now.with_timezone(&offset).format("%Y%m%d")
        ))
    });

    let sections: Vec<ChecklistSection> = app
        .offered_partitions()
        .into_iter()
        .map(|p| {
            let records = app.store.read(&p.name);
            let counts = count_records(&records, app.config.remaining_formula);
            ChecklistSection {
                partition: p.clone(),
                records,
                counts,
            }
        })
        .collect();

    export_checklist(&sections, now, offset, &output_path)?;

    println!("Exported to: {}", output_path.display());
    Ok(())
}

fn cmd_config(
    show: bool,
    set_endpoint: Option<String>,
    set_sheet: Option<String>,
    set_timeout: Option<u64>,
    set_output: Option<OutputFormat>,
    set_push_before_pull: Option<bool>,
    reset: bool,
) -> Result<()> {
    if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    let mut config = Config::load()?;
    let mut modified = false;

    if let Some(endpoint) = set_endpoint {
        config.endpoint = Some(endpoint);
        modified = true;
    }

    if let Some(sheet) = set_sheet {
        config.sheet = if sheet.trim().is_empty() { None } else { Some(sheet) };
        modified = true;
    }

    if let Some(timeout) = set_timeout {
        config.timeout_secs = timeout.max(1);
        modified = true;
    }

    if let Some(output_format) = set_output {
        config.output_format = output_format;
        modified = true;
    }

    if let Some(push) = set_push_before_pull {
        config.push_before_pull = push;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration updated");
    }

    if show || !modified {
        println!("{}", config);
    }

    Ok(())
}
