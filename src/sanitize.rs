// src/sanitize.rs
//
// Output sanitization for console and CSV rendering

use regex::Regex;
use std::sync::OnceLock;

use crate::core::ScanRecord;

/// Sanitizes a scan record before output to prevent information leaks
///
/// This function sanitizes the free-text fields of a ScanRecord so that:
/// - No terminal control sequences from API-supplied names reach the console
/// - No bearer tokens or JWTs embedded in error messages are printed
///
/// # Arguments
/// * `record` - The record to sanitize
///
/// # Returns
/// * `ScanRecord` - A sanitized copy of the input record
pub fn sanitize_record(record: &ScanRecord) -> ScanRecord {
    ScanRecord {
        subscription_id: sanitize_string(&record.subscription_id),
        resource_name: sanitize_string(&record.resource_name),
        resource_id: sanitize_string(&record.resource_id),

        // Labels and scopes are closed sets apart from raw pass-through tiers
        plan: record.plan.clone(),
        scope: record.scope,

        error_message: record.error_message.as_deref().map(sanitize_error),
    }
}

/// Strips control characters and surrounding whitespace
pub fn sanitize_string(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Sanitizes error messages, redacting credentials
///
/// # Arguments
/// * `error` - Error message to sanitize
///
/// # Returns
/// * `String` - Single-line message with secrets replaced by `[REDACTED]`
pub fn sanitize_error(error: &str) -> String {
    let single_line = error.replace(['\r', '\n'], " ");
    let filtered = sanitize_string(&single_line);

    let redacted = bearer_pattern().replace_all(&filtered, "Bearer [REDACTED]");
    jwt_pattern()
        .replace_all(&redacted, "[REDACTED]")
        .to_string()
}

/// Neutralizes spreadsheet formula injection in a CSV cell
///
/// Cells starting with `=`, `+`, `-`, `@`, tab or carriage return are
/// prefixed with a single quote so spreadsheet applications treat them as text.
pub fn csv_safe(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{}", value),
        _ => value.to_string(),
    }
}

fn bearer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("bearer pattern is valid")
    })
}

fn jwt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]*")
            .expect("jwt pattern is valid")
    })
}
