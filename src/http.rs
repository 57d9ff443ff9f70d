//! HTTP client for Azure Resource Manager
//!
//! This module provides the live [`DefenderApi`] implementation:
//! - Subscription lookup to bind the working context
//! - `Microsoft.Security/pricings` reads at subscription and resource scope
//! - Paged listing of virtual machines, scale sets and Arc machines
//! - ARM error bodies folded into error messages
//!
//! Requests are issued one at a time with no retries; the client's timeout
//! is the only bound on a slow call.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::AccessToken;
use crate::core::{DefenderApi, SubscriptionInfo};
use crate::plan::PricingRecord;
use crate::resource::{Coverage, ResourceDescriptor};

/// Public-cloud ARM endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const PRICINGS_API_VERSION: &str = "2024-01-01";

/// Envelope of a `Microsoft.Security/pricings` response
#[derive(Debug, Deserialize)]
struct PricingEnvelope {
    #[serde(default)]
    properties: PricingRecord,
}

/// One page of an ARM list response
#[derive(Debug, Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Azure Resource Manager client authenticated with a bearer token
///
/// # Examples
///
/// ```
/// use tierscout::auth::AccessToken;
/// use tierscout::http::ArmClient;
/// use std::time::Duration;
///
/// # fn example() -> anyhow::Result<()> {
/// let client = ArmClient::new(
///     "https://management.azure.com",
///     AccessToken::new("token"),
///     Duration::from_secs(30),
/// )?;
/// assert_eq!(client.endpoint(), "https://management.azure.com");
/// # Ok(())
/// # }
/// ```
pub struct ArmClient {
    client: Client,
    endpoint: String,
    token: AccessToken,
}

impl ArmClient {
    /// Creates a client for the given ARM endpoint
    ///
    /// # Arguments
    /// * `endpoint` - Base URL, e.g. `https://management.azure.com`
    /// * `token` - Bearer token for every request
    /// * `timeout` - Per-request timeout
    pub fn new(endpoint: &str, token: AccessToken, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("tierscout/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        let separator = if path.starts_with('/') { "" } else { "/" };
        format!(
            "{}{}{}?api-version={}",
            self.endpoint, separator, path, api_version
        )
    }

    /// Sends an authenticated GET and decodes the JSON body
    ///
    /// Non-success responses become errors carrying the status and, when
    /// the body is an ARM error envelope, its code and message.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.secret())
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => bail!(
                    "HTTP {}: {}: {}",
                    status,
                    envelope.error.code,
                    envelope.error.message
                ),
                Err(_) => bail!("HTTP request failed with status: {}", status),
            }
        }

        response
            .json::<T>()
            .await
            .context("Failed to decode response body")
    }

    /// Follows `nextLink` until every page of a listing is read
    async fn list_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next {
            let page: ListPage<T> = self.get_json(&url).await?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        Ok(items)
    }
}

#[async_trait]
impl DefenderApi for ArmClient {
    async fn bind_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo> {
        let url = self.url(
            &format!("/subscriptions/{}", subscription_id),
            SUBSCRIPTIONS_API_VERSION,
        );
        self.get_json(&url)
            .await
            .with_context(|| format!("subscription {} is not accessible", subscription_id))
    }

    async fn subscription_pricing(&self, subscription_id: &str) -> Result<PricingRecord> {
        let url = self.url(
            &format!(
                "/subscriptions/{}/providers/Microsoft.Security/pricings/VirtualMachines",
                subscription_id
            ),
            PRICINGS_API_VERSION,
        );
        let envelope: PricingEnvelope = self.get_json(&url).await?;
        Ok(envelope.properties)
    }

    async fn list_resources(
        &self,
        subscription_id: &str,
        coverage: Coverage,
    ) -> Result<Vec<ResourceDescriptor>> {
        let mut resources = Vec::new();
        let mut failures = Vec::new();

        // A provider that is not registered fails its own listing only
        for kind in coverage.kinds() {
            let url = self.url(
                &format!(
                    "/subscriptions/{}/providers/{}",
                    subscription_id, kind.resource_type
                ),
                kind.api_version,
            );
            match self.list_all::<ResourceDescriptor>(url).await {
                Ok(listed) => {
                    debug!(
                        "Listed {} {} in subscription {}",
                        listed.len(),
                        kind.resource_type,
                        subscription_id
                    );
                    resources.extend(listed);
                }
                Err(e) => {
                    warn!(
                        "Failed to list {} in subscription {}: {:#}",
                        kind.resource_type, subscription_id, e
                    );
                    failures.push(format!("{}: {:#}", kind.resource_type, e));
                }
            }
        }

        if resources.is_empty() && !failures.is_empty() {
            bail!("failed to list resources ({})", failures.join("; "));
        }

        Ok(resources)
    }

    async fn resource_pricing(&self, resource_id: &str) -> Result<PricingRecord> {
        let url = self.url(
            &format!(
                "{}/providers/Microsoft.Security/pricings/virtualMachines",
                resource_id.trim_end_matches('/')
            ),
            PRICINGS_API_VERSION,
        );
        let envelope: PricingEnvelope = self.get_json(&url).await?;
        Ok(envelope.properties)
    }
}
