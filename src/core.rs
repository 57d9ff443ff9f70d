//! Core scanning functionality for Defender for Servers pricing audits
//!
//! This module provides the bounded multi-subscription scanner:
//! - Sequential iteration over subscriptions and their compute resources
//! - One global resource budget shared by every subscription
//! - Per-resource pricing lookups whose failures become result rows
//! - Per-subscription failures (binding, enumeration) that skip only that subscription
//!
//! The scanner talks to Azure exclusively through the [`DefenderApi`] trait,
//! so the same loop drives the live ARM client and in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::pin;
use tracing::{debug, info, warn};

use crate::plan::{PlanLabel, PricingRecord};
use crate::resource::{Coverage, ResourceDescriptor, ResourceScope};

/// Subscription metadata returned when binding the working context
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Operations the scanner needs from Azure
///
/// Every call is a single round-trip with no retry. Implementations report
/// failures as errors; the scanner decides whether they skip a subscription
/// or become an `Error` row.
#[async_trait]
pub trait DefenderApi: Send + Sync {
    /// Binds the working context to a subscription, failing if it is not accessible
    async fn bind_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo>;

    /// Reads the subscription-level `VirtualMachines` pricing
    async fn subscription_pricing(&self, subscription_id: &str) -> Result<PricingRecord>;

    /// Lists the subscription's resources of the covered types, in listing order
    async fn list_resources(
        &self,
        subscription_id: &str,
        coverage: Coverage,
    ) -> Result<Vec<ResourceDescriptor>>;

    /// Reads the resource-level `virtualMachines` pricing
    async fn resource_pricing(&self, resource_id: &str) -> Result<PricingRecord>;
}

/// One row of audit output
///
/// Created exactly once per processed resource, whether its pricing lookup
/// succeeded or not.
///
/// # Examples
///
/// ```
/// use tierscout::core::ScanRecord;
/// use tierscout::plan::PlanLabel;
/// use tierscout::resource::ResourceScope;
///
/// let record = ScanRecord {
///     subscription_id: "00000000-0000-0000-0000-000000000001".to_string(),
///     resource_name: "web-01".to_string(),
///     resource_id: "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/web-01".to_string(),
///     plan: PlanLabel::P2,
///     scope: ResourceScope::Vm,
///     error_message: None,
/// };
/// assert!(record.error_message.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRecord {
    pub subscription_id: String,
    pub resource_name: String,
    pub resource_id: String,
    pub plan: PlanLabel,
    pub scope: ResourceScope,
    pub error_message: Option<String>,
}

impl ScanRecord {
    /// Converts the outcome of one pricing lookup into its record
    pub fn from_lookup(
        subscription_id: &str,
        resource: &ResourceDescriptor,
        lookup: Result<PlanLabel>,
    ) -> Self {
        let (plan, error_message) = match lookup {
            Ok(plan) => (plan, None),
            Err(e) => {
                let description = format!("{:#}", e);
                let description = if description.trim().is_empty() {
                    "pricing lookup failed".to_string()
                } else {
                    description
                };
                (PlanLabel::Error, Some(description))
            }
        };

        Self {
            subscription_id: subscription_id.to_string(),
            resource_name: resource.name.clone(),
            resource_id: resource.resource_id.clone(),
            plan,
            scope: resource.scope(),
            error_message,
        }
    }
}

/// Global resource budget shared by every subscription in a scan
///
/// `None` means unbounded. The count only ever decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    remaining: Option<usize>,
}

impl Budget {
    /// Creates a budget; a missing or zero limit is unbounded
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            remaining: limit.filter(|&l| l > 0),
        }
    }

    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Charges one processed resource against the budget
    pub fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

/// Why a subscription contributed no records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSubscription {
    pub subscription_id: String,
    pub reason: String,
}

/// Everything a scan produced
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Records in processing order
    pub records: Vec<ScanRecord>,
    /// Subscription-level default plans that were read successfully
    pub subscription_defaults: BTreeMap<String, PlanLabel>,
    pub skipped: Vec<SkippedSubscription>,
}

impl ScanOutcome {
    /// Records whose plan differs from their subscription's default
    ///
    /// Subscriptions whose default could not be read are left out.
    pub fn overrides(&self) -> Vec<&ScanRecord> {
        self.records
            .iter()
            .filter(|r| r.plan != PlanLabel::Error)
            .filter(|r| {
                self.subscription_defaults
                    .get(&r.subscription_id)
                    .is_some_and(|default| *default != r.plan)
            })
            .collect()
    }
}

/// Progress callback: records processed so far, configured limit, latest record
pub type ProgressFn = Box<dyn Fn(usize, Option<usize>, &ScanRecord) + Send + Sync>;

/// A subscription after binding and enumeration
struct PreparedSubscription {
    subscription_id: String,
    default_plan: Option<PlanLabel>,
    resources: Result<Vec<ResourceDescriptor>, String>,
}

/// One element of the flattened scan
enum ScanStep {
    Subscription {
        subscription_id: String,
        default_plan: Option<PlanLabel>,
        skipped: Option<String>,
    },
    Resource {
        subscription_id: String,
        resource: ResourceDescriptor,
    },
}

impl PreparedSubscription {
    fn into_steps(self) -> Vec<ScanStep> {
        let (resources, skipped) = match self.resources {
            Ok(resources) => (resources, None),
            Err(reason) => (Vec::new(), Some(reason)),
        };

        let mut steps = Vec::with_capacity(resources.len() + 1);
        steps.push(ScanStep::Subscription {
            subscription_id: self.subscription_id.clone(),
            default_plan: self.default_plan,
            skipped,
        });
        steps.extend(resources.into_iter().map(|resource| ScanStep::Resource {
            subscription_id: self.subscription_id.clone(),
            resource,
        }));
        steps
    }
}

/// Bounded multi-subscription pricing scanner
///
/// The scanner walks subscriptions in the given order and their resources
/// in listing order, one pricing lookup at a time, until either the input
/// or the global budget runs out.
///
/// # Examples
///
/// ```no_run
/// use tierscout::core::Scanner;
/// use tierscout::http::ArmClient;
/// use tierscout::auth::AccessToken;
/// use tierscout::resource::Coverage;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = ArmClient::new(
///     "https://management.azure.com",
///     AccessToken::new("eyJ0eXAi..."),
///     Duration::from_secs(30),
/// )?;
/// let scanner = Scanner::new(client, Coverage::Compute);
///
/// let subscriptions = vec!["00000000-0000-0000-0000-000000000001".to_string()];
/// let outcome = scanner.scan(&subscriptions, Some(50)).await;
/// println!("Scanned {} resources", outcome.records.len());
/// # Ok(())
/// # }
/// ```
pub struct Scanner<A> {
    api: A,
    coverage: Coverage,
    progress: Option<ProgressFn>,
}

impl<A: DefenderApi> Scanner<A> {
    pub fn new(api: A, coverage: Coverage) -> Self {
        Self {
            api,
            coverage,
            progress: None,
        }
    }

    /// Registers a callback invoked after every processed resource
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Scans subscriptions in order until input or budget is exhausted
    ///
    /// Subscriptions and resources are modelled as one lazily flattened
    /// stream of steps. The budget is checked before every pull, so once it
    /// reaches zero no further subscription is bound or enumerated and no
    /// further pricing lookup is issued.
    ///
    /// # Arguments
    /// * `subscription_ids` - Subscriptions to scan, in order
    /// * `limit` - Global cap on resources across all subscriptions; `None` or `Some(0)` is unbounded
    ///
    /// # Returns
    /// * `ScanOutcome` - Records in processing order plus per-subscription context
    pub async fn scan(&self, subscription_ids: &[String], limit: Option<usize>) -> ScanOutcome {
        let mut budget = Budget::new(limit);
        let cap = budget.remaining();
        let mut outcome = ScanOutcome::default();

        let steps = stream::iter(subscription_ids)
            .then(|subscription_id| self.prepare_subscription(subscription_id))
            .flat_map(|prepared| stream::iter(prepared.into_steps()));
        let mut steps = pin!(steps);

        while !budget.is_exhausted() {
            let Some(step) = steps.next().await else {
                break;
            };

            match step {
                ScanStep::Subscription {
                    subscription_id,
                    default_plan,
                    skipped,
                } => {
                    if let Some(plan) = default_plan {
                        outcome
                            .subscription_defaults
                            .insert(subscription_id.clone(), plan);
                    }
                    if let Some(reason) = skipped {
                        outcome.skipped.push(SkippedSubscription {
                            subscription_id,
                            reason,
                        });
                    }
                }
                ScanStep::Resource {
                    subscription_id,
                    resource,
                } => {
                    let record = self.scan_resource(&subscription_id, &resource).await;
                    outcome.records.push(record);
                    budget.consume();

                    if let Some(progress) = &self.progress {
                        if let Some(record) = outcome.records.last() {
                            progress(outcome.records.len(), cap, record);
                        }
                    }
                }
            }
        }

        if budget.is_exhausted() {
            info!(
                "Resource limit reached after {} resources, stopping scan",
                outcome.records.len()
            );
        }
        info!(
            "Scan completed: {} resources across {} subscriptions ({} skipped)",
            outcome.records.len(),
            subscription_ids.len(),
            outcome.skipped.len()
        );

        outcome
    }

    /// Binds, reads the default plan and enumerates one subscription
    async fn prepare_subscription(&self, subscription_id: &str) -> PreparedSubscription {
        let mut prepared = PreparedSubscription {
            subscription_id: subscription_id.to_string(),
            default_plan: None,
            resources: Ok(Vec::new()),
        };

        match self.api.bind_subscription(subscription_id).await {
            Ok(info) => {
                info!(
                    "Processing subscription {} ({})",
                    subscription_id,
                    info.display_name.as_deref().unwrap_or("unnamed")
                );
            }
            Err(e) => {
                warn!("Failed to set context to subscription {}: {:#}", subscription_id, e);
                prepared.resources = Err(format!("context binding failed: {:#}", e));
                return prepared;
            }
        }

        match self.api.subscription_pricing(subscription_id).await {
            Ok(pricing) => {
                let plan = pricing.label();
                info!(
                    "Subscription {} default plan: {} (tier: {}, sub-plan: {}, {})",
                    subscription_id,
                    plan,
                    pricing.pricing_tier.as_deref().unwrap_or("-"),
                    pricing.sub_plan.as_deref().unwrap_or("-"),
                    pricing.provenance()
                );
                prepared.default_plan = Some(plan);
            }
            Err(e) => {
                warn!(
                    "Could not read default plan for subscription {}: {:#}",
                    subscription_id, e
                );
            }
        }

        prepared.resources = match self.api.list_resources(subscription_id, self.coverage).await {
            Ok(resources) if resources.is_empty() => {
                warn!("No eligible resources found in subscription {}", subscription_id);
                Err("no eligible resources".to_string())
            }
            Ok(resources) => {
                info!(
                    "Found {} eligible resources in subscription {}",
                    resources.len(),
                    subscription_id
                );
                Ok(resources)
            }
            Err(e) => {
                warn!(
                    "Failed to enumerate resources in subscription {}: {:#}",
                    subscription_id, e
                );
                Err(format!("resource enumeration failed: {:#}", e))
            }
        };

        prepared
    }

    /// Looks up one resource's pricing and converts the outcome to a record
    async fn scan_resource(
        &self,
        subscription_id: &str,
        resource: &ResourceDescriptor,
    ) -> ScanRecord {
        debug!("Querying pricing for {}", resource.resource_id);

        let lookup = self
            .api
            .resource_pricing(&resource.resource_id)
            .await
            .map(|pricing| {
                let plan = pricing.label();
                debug!(
                    "{} is on {} ({})",
                    resource.resource_id,
                    plan,
                    pricing.provenance()
                );
                plan
            });

        if let Err(e) = &lookup {
            warn!("Pricing lookup failed for {}: {:#}", resource.resource_id, e);
        }

        ScanRecord::from_lookup(subscription_id, resource, lookup)
    }
}
