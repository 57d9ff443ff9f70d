//! Command-line interface for the tierscout pricing audit
//!
//! This module defines the clap surface of the tool:
//!
//! - Subscription selection, repeatable or prompted for interactively
//! - A global resource limit shared across all subscriptions
//! - Resource-type coverage and summary grouping
//! - CSV export
//! - Credential and endpoint overrides, also read from the environment
//!
//! Configuration is entirely flags and environment variables; there is no
//! configuration file.

use clap::Parser;
use std::path::PathBuf;

use crate::aggregate::GroupBy;
use crate::auth::TOKEN_ENV_VAR;
use crate::http::DEFAULT_ENDPOINT;
use crate::report::DEFAULT_CSV_PATH;
use crate::resource::Coverage;

/// Main command-line interface structure for tierscout
///
/// # Examples
///
/// ```
/// use tierscout::cli::Cli;
/// use clap::Parser;
///
/// let cli = Cli::try_parse_from([
///     "tierscout",
///     "--subscription-id",
///     "00000000-0000-0000-0000-000000000001",
///     "--limit",
///     "25",
/// ])
/// .unwrap();
///
/// assert_eq!(cli.limit, Some(25));
/// assert!(!cli.export_csv);
/// ```
#[derive(Parser, Debug)]
#[command(
    name = "tierscout",
    about = "Audit Microsoft Defender for Servers pricing tiers across Azure subscriptions",
    long_about = None,
    version
)]
pub struct Cli {
    /// Subscription IDs to scan; prompted for when omitted
    ///
    /// Accepts several values, and comma- or semicolon-separated lists
    #[arg(short = 's', long = "subscription-id", num_args = 1..)]
    pub subscription_ids: Vec<String>,

    /// Maximum number of resources to scan across all subscriptions
    ///
    /// Zero or a negative value scans everything
    #[arg(short, long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Write results to a CSV file
    #[arg(long)]
    pub export_csv: bool,

    /// CSV output path used with --export-csv
    #[arg(long, default_value = DEFAULT_CSV_PATH)]
    pub csv_path: PathBuf,

    /// Resource types to audit
    #[arg(long, value_enum, default_value_t = Coverage::Compute)]
    pub coverage: Coverage,

    /// Summary grouping
    #[arg(long, value_enum, default_value_t = GroupBy::Subscription)]
    pub group_by: GroupBy,

    /// Show Standard as its own summary column instead of folding it into Other
    #[arg(long)]
    pub show_standard: bool,

    /// ARM bearer token; the Azure CLI session is used when absent
    ///
    /// The CLI token is requested for the audience of --endpoint.
    #[arg(long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Azure Resource Manager endpoint
    #[arg(long, env = "AZURE_RESOURCE_MANAGER_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Request timeout in milliseconds for HTTP operations
    #[arg(short = 't', long, default_value = "30000")]
    pub timeout_ms: u64,
}
