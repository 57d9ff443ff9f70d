//! Bearer-token acquisition for Azure Resource Manager
//!
//! Credentials are resolved once, before any scanning starts. A missing
//! credential is a precondition failure: the run aborts without touching the
//! network.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Resource (audience) the ARM token is requested for
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Token audience for an ARM endpoint
///
/// Sovereign clouds use their own endpoint and audience, e.g.
/// `https://management.usgovcloudapi.net/`.
///
/// # Examples
///
/// ```
/// use tierscout::auth::arm_resource_for;
///
/// assert_eq!(
///     arm_resource_for("https://management.usgovcloudapi.net"),
///     "https://management.usgovcloudapi.net/"
/// );
/// ```
pub fn arm_resource_for(endpoint: &str) -> String {
    format!("{}/", endpoint.trim().trim_end_matches('/'))
}

/// Environment variable holding a pre-acquired token
pub const TOKEN_ENV_VAR: &str = "AZURE_ACCESS_TOKEN";

/// An ARM bearer token; never printed by `Debug`
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

/// Source of an ARM bearer token
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn token(&self) -> Result<AccessToken>;
}

/// Token supplied on the command line or through the environment
pub struct StaticCredential {
    token: Option<String>,
}

impl StaticCredential {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    fn name(&self) -> &str {
        "explicit token"
    }

    async fn token(&self) -> Result<AccessToken> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => bail!("no token supplied via --access-token or {}", TOKEN_ENV_VAR),
        }
    }
}

/// Token from the signed-in Azure CLI session
pub struct AzureCliCredential {
    program: String,
    resource: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::with_program("az")
    }

    /// Uses a different executable in place of `az`
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            resource: ARM_RESOURCE.to_string(),
        }
    }

    /// Requests the token for another audience
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for AzureCliCredential {
    fn name(&self) -> &str {
        "Azure CLI"
    }

    async fn token(&self) -> Result<AccessToken> {
        debug!("Requesting ARM token from {}", self.program);

        let output = Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--resource",
                &self.resource,
                "--query",
                "accessToken",
                "--output",
                "tsv",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run `{}`", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("`{} account get-access-token` failed: {}", self.program, stderr.trim());
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            bail!("`{} account get-access-token` returned an empty token", self.program);
        }

        Ok(AccessToken::new(token))
    }
}

/// Tries providers in order and returns the first token obtained
pub struct ChainCredential {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainCredential {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Explicit token first, then the Azure CLI session for `endpoint`
    pub fn default_chain(explicit_token: Option<String>, endpoint: &str) -> Self {
        Self::new(vec![
            Box::new(StaticCredential::new(explicit_token)),
            Box::new(AzureCliCredential::new().with_resource(arm_resource_for(endpoint))),
        ])
    }
}

#[async_trait]
impl CredentialProvider for ChainCredential {
    fn name(&self) -> &str {
        "credential chain"
    }

    async fn token(&self) -> Result<AccessToken> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.token().await {
                Ok(token) => {
                    debug!("Using credential from {}", provider.name());
                    return Ok(token);
                }
                Err(e) => failures.push(format!("{}: {:#}", provider.name(), e)),
            }
        }

        Err(anyhow!(
            "no Azure credential available ({})",
            failures.join("; ")
        ))
    }
}
