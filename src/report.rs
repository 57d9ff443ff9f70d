//! Console and CSV presentation of scan results
//!
//! Everything here consumes a finished [`ScanOutcome`]; nothing is printed
//! while the scan is still running except progress lines on stderr.

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use std::path::Path;

use crate::aggregate::{self, GroupBy, PlanCounts};
use crate::core::{ScanOutcome, ScanRecord};
use crate::plan::PlanLabel;
use crate::sanitize::{csv_safe, sanitize_record};

/// Default CSV output file
pub const DEFAULT_CSV_PATH: &str = "defender_servers_plans.csv";

/// Summary layout options
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryOptions {
    pub group_by: GroupBy,
    /// Break `Standard` out of the `Other` column
    pub show_standard: bool,
}

/// Sanitized copies of the records, sorted by subscription id then resource name
pub fn sorted_records(records: &[ScanRecord]) -> Vec<ScanRecord> {
    let mut sorted: Vec<ScanRecord> = records.iter().map(sanitize_record).collect();
    sorted.sort_by(|a, b| {
        a.subscription_id
            .cmp(&b.subscription_id)
            .then_with(|| a.resource_name.cmp(&b.resource_name))
            .then_with(|| a.resource_id.cmp(&b.resource_id))
    });
    sorted
}

fn table_color(plan: &PlanLabel) -> Option<Color> {
    match plan {
        PlanLabel::P2 => Some(Color::Green),
        PlanLabel::P1 => Some(Color::Cyan),
        PlanLabel::Free => Some(Color::Red),
        PlanLabel::Standard => Some(Color::Yellow),
        PlanLabel::Error => Some(Color::Magenta),
        _ => None,
    }
}

/// Colors a plan label for line-oriented output
pub fn colorize_plan(plan: &PlanLabel) -> ColoredString {
    let text = plan.as_str();
    match plan {
        PlanLabel::P2 => text.green(),
        PlanLabel::P1 => text.cyan(),
        PlanLabel::Free => text.red(),
        PlanLabel::Standard => text.yellow(),
        PlanLabel::Error => text.magenta(),
        _ => text.normal(),
    }
}

/// Builds the per-resource result table
pub fn results_table(records: &[ScanRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("SUBSCRIPTION").fg(Color::Cyan),
        Cell::new("RESOURCE").fg(Color::Cyan),
        Cell::new("PLAN").fg(Color::Cyan),
        Cell::new("SCOPE").fg(Color::Cyan),
        Cell::new("ERROR").fg(Color::Cyan),
    ]);

    for record in sorted_records(records) {
        let mut plan_cell = Cell::new(record.plan.as_str());
        if let Some(color) = table_color(&record.plan) {
            plan_cell = plan_cell.fg(color);
        }

        table.add_row(vec![
            Cell::new(&record.subscription_id),
            Cell::new(&record.resource_name),
            plan_cell,
            Cell::new(record.scope.as_str()),
            Cell::new(record.error_message.as_deref().unwrap_or("")),
        ]);
    }

    table
}

/// Prints the result table, or a notice when nothing was scanned
pub fn print_results(outcome: &ScanOutcome) {
    if outcome.records.is_empty() {
        println!("{}", "No resources were scanned.".yellow());
        return;
    }

    println!("{}", results_table(&outcome.records));
}

fn counts_line(counts: &PlanCounts, show_standard: bool) -> String {
    if show_standard {
        let other = counts.other - counts.standard;
        format!(
            "P1: {}  P2: {}  Free: {}  Standard: {}  Other: {}  Total: {}",
            counts.p1, counts.p2, counts.free, counts.standard, other, counts.total
        )
    } else {
        format!(
            "P1: {}  P2: {}  Free: {}  Other: {}  Total: {}",
            counts.p1, counts.p2, counts.free, counts.other, counts.total
        )
    }
}

/// Renders the overall and per-partition summary lines
pub fn summary_lines(records: &[ScanRecord], options: SummaryOptions) -> Vec<String> {
    let mut lines = vec![format!(
        "Overall  {}",
        counts_line(&aggregate::overall(records), options.show_standard)
    )];

    for (key, counts) in aggregate::aggregate(records, options.group_by.key()) {
        lines.push(format!(
            "{} {}  {}",
            options.group_by.heading(),
            key,
            counts_line(&counts, options.show_standard)
        ));
    }

    lines
}

/// Prints the plan summary
pub fn print_summary(outcome: &ScanOutcome, options: SummaryOptions) {
    println!();
    println!("{}", "Summary:".bold());
    for line in summary_lines(&outcome.records, options) {
        println!("  {}", line);
    }

    if !outcome.skipped.is_empty() {
        println!();
        println!("{}", "Skipped subscriptions:".bold());
        for skipped in &outcome.skipped {
            println!("  {} ({})", skipped.subscription_id.yellow(), skipped.reason);
        }
    }
}

/// Prints resources whose plan diverges from their subscription default
pub fn print_overrides(outcome: &ScanOutcome) {
    let overrides = outcome.overrides();
    if overrides.is_empty() {
        return;
    }

    println!();
    println!("{}", "Resource-level overrides:".bold());
    for record in overrides {
        let record = sanitize_record(record);
        let default = outcome
            .subscription_defaults
            .get(&record.subscription_id)
            .map(PlanLabel::as_str)
            .unwrap_or("-");
        println!(
            "  {} {} → {} ({})",
            record.resource_name,
            default.dimmed(),
            colorize_plan(&record.plan),
            record.subscription_id
        );
    }
}

/// Prints one progress line to stderr
pub fn print_progress(processed: usize, limit: Option<usize>, record: &ScanRecord) {
    let position = match limit {
        Some(limit) => format!("[{}/{}]", processed, limit),
        None => format!("[{}]", processed),
    };
    eprintln!(
        "{} {} {}",
        position.dimmed(),
        crate::sanitize::sanitize_string(&record.resource_name),
        colorize_plan(&record.plan)
    );
}

#[derive(Serialize)]
struct CsvRow {
    #[serde(rename = "SubscriptionId")]
    subscription_id: String,
    #[serde(rename = "ResourceName")]
    resource_name: String,
    #[serde(rename = "ResourceId")]
    resource_id: String,
    #[serde(rename = "Plan")]
    plan: String,
    #[serde(rename = "Scope")]
    scope: String,
    #[serde(rename = "Error")]
    error: String,
}

impl From<&ScanRecord> for CsvRow {
    fn from(record: &ScanRecord) -> Self {
        Self {
            subscription_id: csv_safe(&record.subscription_id),
            resource_name: csv_safe(&record.resource_name),
            resource_id: csv_safe(&record.resource_id),
            plan: csv_safe(record.plan.as_str()),
            scope: record.scope.to_string(),
            error: csv_safe(record.error_message.as_deref().unwrap_or("")),
        }
    }
}

/// Writes the records to a UTF-8 CSV file with a header row
///
/// Rows are sorted the same way as the console table.
///
/// # Arguments
/// * `path` - Output file, created or truncated
/// * `records` - Scan records to export
pub fn write_csv(path: &Path, records: &[ScanRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    for record in sorted_records(records) {
        writer
            .serialize(CsvRow::from(&record))
            .with_context(|| format!("Failed to write CSV row to {}", path.display()))?;
    }

    // An empty export still carries the header
    if records.is_empty() {
        writer
            .write_record(["SubscriptionId", "ResourceName", "ResourceId", "Plan", "Scope", "Error"])
            .with_context(|| format!("Failed to write CSV header to {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush CSV file: {}", path.display()))?;
    Ok(())
}
