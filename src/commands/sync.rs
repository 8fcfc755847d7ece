use anyhow::Result;
use colored::Colorize;
use reconcile::{
    EntityKind, NoProgress, PassReport, PermissionRegistrar, PermissionTable, SyncEngine,
    SyncProgress, SyncReport,
};
use serde_json::json;

use crate::Context;
use crate::cli::{OutputFormat, SyncArgs};
use crate::commands::{open_directory, open_store};
use crate::schema::FacsyncConfig;
use crate::ui;

pub fn run(ctx: &Context, config: &FacsyncConfig, args: SyncArgs) -> Result<()> {
    let outcome = match args.format {
        OutputFormat::Text if !ctx.quiet => execute(config, &mut StepProgress::default()),
        _ => execute(config, &mut NoProgress),
    };

    match (outcome, args.format) {
        (Ok(report), OutputFormat::Json) => {
            println!("{}", report.to_json()?);
            Ok(())
        }
        (Ok(report), OutputFormat::Text) => {
            print_report(&report, ctx.verbose > 0);
            ui::success(&completion_message(&report));
            Ok(())
        }
        (Err(err), format) => {
            if let Some(sync_err) = err.downcast_ref::<reconcile::Error>() {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&failure_body(sync_err))?);
                    }
                    OutputFormat::Text => {
                        ui::error(&sync_err.to_string());
                        if let Some(completed) = sync_err.completed()
                            && !completed.passes.is_empty()
                        {
                            ui::section("Completed passes");
                            print_report(completed, ctx.verbose > 0);
                        }
                    }
                }
            }
            Err(err)
        }
    }
}

/// Open the store and directory named by `config` and run one full sync
pub fn execute<P: SyncProgress>(config: &FacsyncConfig, progress: &mut P) -> Result<SyncReport> {
    let store = open_store(config)?;
    let directory = open_directory(config)?;
    let registrar = PermissionRegistrar::new(PermissionTable::standard());
    let report = SyncEngine::new(directory.as_ref(), &store, registrar).run(progress)?;
    Ok(report)
}

/// One-line summary of a finished run
pub fn completion_message(report: &SyncReport) -> String {
    let totals = report.totals();
    let elapsed = report
        .finished_at
        .map(|end| ui::format_duration_ms((end - report.started_at).num_milliseconds()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Synchronization complete in {elapsed}: {} created, {} updated, {} left unsynced, {} warnings",
        totals.created,
        totals.updated,
        totals.left_unsynced,
        totals.relationship_warnings + totals.anomalies
    )
}

/// JSON body describing an aborted run
pub fn failure_body(err: &reconcile::Error) -> serde_json::Value {
    json!({
        "error": err.to_string(),
        "completed": err.completed(),
    })
}

// ============================================================================
// Output
// ============================================================================

const KIND_WIDTH: usize = 22;
const COLUMNS: [&str; 6] = [
    "created", "updated", "unsynced", "deleted", "accounts", "warnings",
];

fn print_report(report: &SyncReport, detailed: bool) {
    ui::header("Synchronization Report");

    let heading: Vec<String> = COLUMNS.iter().map(|c| format!("{c:>9}")).collect();
    println!(
        "  {:<KIND_WIDTH$}{}",
        "entity".dimmed(),
        heading.join("").dimmed()
    );

    for pass in &report.passes {
        println!("  {:<KIND_WIDTH$}{}", pass.kind.label(), pass_row(pass));
    }

    let totals = report.totals();
    let cells = [
        totals.created,
        totals.updated,
        totals.left_unsynced,
        totals.deleted,
        totals.accounts_created,
        totals.relationship_warnings + totals.anomalies,
    ];
    println!(
        "  {:<KIND_WIDTH$}{}",
        "total".bold(),
        cells
            .iter()
            .map(|&n| ui::count_cell(n as u64, 9))
            .collect::<String>()
    );

    let warnings: Vec<_> = report.relationship_warnings().collect();
    let anomalies: Vec<_> = report
        .passes
        .iter()
        .flat_map(|p| p.anomalies.iter())
        .collect();

    if warnings.is_empty() && anomalies.is_empty() {
        return;
    }

    ui::section("Warnings");
    for anomaly in &anomalies {
        ui::warn(anomaly);
    }
    if detailed {
        for warning in &warnings {
            ui::warn(&warning.to_string());
        }
    } else if !warnings.is_empty() {
        ui::warn(&format!("{} unresolved relationships", warnings.len()));
        ui::dim("rerun with -v to list them");
    }
}

fn pass_row(pass: &PassReport) -> String {
    [
        pass.created,
        pass.updated,
        pass.left_unsynced,
        pass.deleted,
        pass.accounts_created,
        pass.relationship_warnings.len() + pass.anomalies.len(),
    ]
    .iter()
    .map(|&n| ui::count_cell(n as u64, 9))
    .collect()
}

// ============================================================================
// Progress
// ============================================================================

/// Prints one step line per pass
#[derive(Default)]
struct StepProgress {
    current: usize,
}

impl SyncProgress for StepProgress {
    fn on_pass_start(&mut self, kind: EntityKind) {
        self.current += 1;
        ui::step(
            self.current,
            EntityKind::SYNC_ORDER.len(),
            &format!("Synchronizing {kind}"),
        );
    }

    fn on_pass_complete(&mut self, pass: &PassReport) {
        let line = format!(
            "{} created, {} updated, {} left unsynced",
            pass.created, pass.updated, pass.left_unsynced
        );
        if pass.has_warnings() {
            ui::warn(&format!(
                "{line}, {} warnings",
                pass.relationship_warnings.len() + pass.anomalies.len()
            ));
        } else {
            ui::dim(&line);
        }
    }

    fn on_abort(&mut self, kind: EntityKind, error: &reconcile::Error) {
        ui::warn(&format!("{kind} pass failed: {error}"));
    }
}
