use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Builder;
use tracing::{debug, info, warn};

use tierscout::aggregate::label_histogram;
use tierscout::auth::{ChainCredential, CredentialProvider};
use tierscout::cli::Cli;
use tierscout::core::Scanner;
use tierscout::http::ArmClient;
use tierscout::report::{self, SummaryOptions};
use tierscout::validation::{
    effective_limit, parse_subscription_list, validate_subscription_id, SubscriptionValidator,
};

fn main() -> Result<()> {
    // The scan is strictly sequential; a small runtime covers the HTTP client
    let worker_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .min(4);

    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> Result<()> {
    // Diagnostics go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("Tokio runtime running {} worker threads", worker_threads);

    let cli = Cli::parse();

    let credential = ChainCredential::default_chain(cli.access_token.clone(), &cli.endpoint);
    let token = match credential.token().await {
        Ok(token) => token,
        Err(e) => {
            eprintln!(
                "{} {:#}",
                "Not signed in to Azure:".red().bold(),
                e
            );
            eprintln!("Run `az login` or set AZURE_ACCESS_TOKEN, then try again.");
            bail!("no Azure credential available");
        }
    };

    let subscription_ids = resolve_subscriptions(&cli.subscription_ids).await?;
    if subscription_ids.is_empty() {
        bail!("No subscription IDs provided");
    }

    let limit = effective_limit(cli.limit);
    info!(
        "Scanning {} subscriptions (limit: {})",
        subscription_ids.len(),
        limit.map_or_else(|| "none".to_string(), |l| l.to_string())
    );

    let client = ArmClient::new(&cli.endpoint, token, Duration::from_millis(cli.timeout_ms))?;
    let scanner = Scanner::new(client, cli.coverage).with_progress(Box::new(report::print_progress));

    let outcome = scanner.scan(&subscription_ids, limit).await;
    for (key, labels) in label_histogram(&outcome.records, cli.group_by.key()) {
        debug!("Plan labels for {}: {:?}", key, labels);
    }

    report::print_results(&outcome);
    report::print_summary(
        &outcome,
        SummaryOptions {
            group_by: cli.group_by,
            show_standard: cli.show_standard,
        },
    );
    report::print_overrides(&outcome);

    if cli.export_csv {
        if let Err(e) = report::write_csv(&cli.csv_path, &outcome.records) {
            eprintln!("{} {:#}", "CSV export failed:".red().bold(), e);
            return Err(e);
        }
        println!();
        println!(
            "{} {}",
            "Results exported to".green(),
            cli.csv_path.display()
        );
    }

    Ok(())
}

/// Uses the ids given on the command line, or prompts for a list on stdin
async fn resolve_subscriptions(from_args: &[String]) -> Result<Vec<String>> {
    let raw = if from_args.is_empty() {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(b"Enter subscription IDs (separated by comma, semicolon or space): ")
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("Failed to read subscription IDs from stdin")?;
        parse_subscription_list(&line)
    } else {
        from_args
            .iter()
            .flat_map(|arg| parse_subscription_list(arg))
            .collect()
    };

    let validator = SubscriptionValidator::new();
    let mut subscription_ids = Vec::with_capacity(raw.len());
    for id in raw {
        if let Err(e) = validate_subscription_id(&id) {
            warn!("Skipping subscription: {}", e);
            continue;
        }
        if !validator.is_guid(&id) {
            warn!("Subscription ID {} is not a GUID; scanning it anyway", id);
        }
        subscription_ids.push(id);
    }

    Ok(subscription_ids)
}
