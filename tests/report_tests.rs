use anyhow::Result;
use tierscout::aggregate::GroupBy;
use tierscout::core::ScanRecord;
use tierscout::plan::PlanLabel;
use tierscout::report::{results_table, sorted_records, summary_lines, write_csv, SummaryOptions};
use tierscout::resource::ResourceScope;

fn record(subscription_id: &str, name: &str, plan: PlanLabel, error: Option<&str>) -> ScanRecord {
    ScanRecord {
        subscription_id: subscription_id.to_string(),
        resource_name: name.to_string(),
        resource_id: format!(
            "/subscriptions/{}/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/{}",
            subscription_id, name
        ),
        plan,
        scope: ResourceScope::Vm,
        error_message: error.map(String::from),
    }
}

fn sample() -> Vec<ScanRecord> {
    vec![
        record("sub-b", "web-02", PlanLabel::P2, None),
        record("sub-a", "db-01", PlanLabel::Standard, None),
        record("sub-b", "app-01", PlanLabel::Error, Some("HTTP 403 Forbidden")),
        record("sub-a", "cache-01", PlanLabel::Free, None),
    ]
}

#[test]
fn test_records_sorted_by_subscription_then_name() {
    let sorted = sorted_records(&sample());

    let order: Vec<(&str, &str)> = sorted
        .iter()
        .map(|r| (r.subscription_id.as_str(), r.resource_name.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("sub-a", "cache-01"),
            ("sub-a", "db-01"),
            ("sub-b", "app-01"),
            ("sub-b", "web-02"),
        ]
    );
}

#[test]
fn test_results_table_lists_every_record() {
    let mut table = results_table(&sample());
    table.force_no_tty().set_width(240);
    let rendered = table.to_string();

    assert!(rendered.contains("SUBSCRIPTION"));
    for name in ["web-02", "db-01", "app-01", "cache-01"] {
        assert!(rendered.contains(name), "missing {} in table", name);
    }
    assert!(rendered.contains("HTTP 403 Forbidden"));
}

#[test]
fn test_summary_lines_by_subscription() {
    let lines = summary_lines(&sample(), SummaryOptions::default());

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Overall  P1: 0  P2: 1  Free: 1  Other: 2  Total: 4");
    assert_eq!(
        lines[1],
        "Subscription sub-a  P1: 0  P2: 0  Free: 1  Other: 1  Total: 2"
    );
    assert_eq!(
        lines[2],
        "Subscription sub-b  P1: 0  P2: 1  Free: 0  Other: 1  Total: 2"
    );
}

#[test]
fn test_summary_lines_with_standard_by_scope() {
    let lines = summary_lines(
        &sample(),
        SummaryOptions {
            group_by: GroupBy::Scope,
            show_standard: true,
        },
    );

    assert_eq!(
        lines,
        vec![
            "Overall  P1: 0  P2: 1  Free: 1  Standard: 1  Other: 1  Total: 4".to_string(),
            "Scope VM  P1: 0  P2: 1  Free: 1  Standard: 1  Other: 1  Total: 4".to_string(),
        ]
    );
}

#[test]
fn test_write_csv() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("plans.csv");

    let mut records = sample();
    records.push(record("sub-c", "=cmd", PlanLabel::P1, None));
    write_csv(&path, &records)?;

    let contents = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = contents.lines().collect();

    assert_eq!(lines[0], "SubscriptionId,ResourceName,ResourceId,Plan,Scope,Error");
    assert_eq!(lines.len(), 6);
    assert!(lines[1].starts_with("sub-a,cache-01,"));
    assert!(lines[1].ends_with(",Free,VM,"));
    assert!(lines[3].starts_with("sub-b,app-01,"));
    assert!(lines[3].ends_with(",Error,VM,HTTP 403 Forbidden"));
    // Formula-looking names are neutralized
    assert!(lines[5].starts_with("sub-c,'=cmd,"));
    Ok(())
}

#[test]
fn test_write_csv_empty_has_header() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.csv");

    write_csv(&path, &[])?;

    let contents = std::fs::read_to_string(&path)?;
    assert_eq!(
        contents.trim_end(),
        "SubscriptionId,ResourceName,ResourceId,Plan,Scope,Error"
    );
    Ok(())
}

#[test]
fn test_write_csv_to_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("plans.csv");

    let err = write_csv(&path, &sample()).unwrap_err();
    assert!(err.to_string().contains("Failed to create CSV file"));
}
