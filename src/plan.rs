//! Plan normalization for Defender for Servers pricing records
//!
//! The pricing API reports two independent fields: a broad `pricingTier`
//! (`Free` or `Standard`) and an optional `subPlan` (`P1`, `P2`). This module
//! folds them into the single [`PlanLabel`] every report works with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical classification of a resource's pricing state
///
/// `Other` carries any raw string that is neither a known sub-plan nor a
/// recognized tier, passed through trimmed so nothing the API returns is
/// silently discarded.
///
/// # Examples
///
/// ```
/// use tierscout::plan::PlanLabel;
///
/// assert_eq!(PlanLabel::P2.to_string(), "P2");
/// assert_eq!(PlanLabel::Other("Premium".to_string()).as_str(), "Premium");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlanLabel {
    P1,
    P2,
    Free,
    Standard,
    Unknown,
    Error,
    Other(String),
}

impl PlanLabel {
    /// Returns the display text of the label
    pub fn as_str(&self) -> &str {
        match self {
            PlanLabel::P1 => "P1",
            PlanLabel::P2 => "P2",
            PlanLabel::Free => "Free",
            PlanLabel::Standard => "Standard",
            PlanLabel::Unknown => "Unknown",
            PlanLabel::Error => "Error",
            PlanLabel::Other(raw) => raw,
        }
    }

    /// Maps a sub-plan string onto a label, keeping its case.
    fn from_sub_plan(sub_plan: &str) -> Self {
        match sub_plan {
            "P1" => PlanLabel::P1,
            "P2" => PlanLabel::P2,
            other => PlanLabel::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PlanLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlanLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Pricing state of a subscription or a single resource
///
/// Deserialized from the `properties` object of a
/// `Microsoft.Security/pricings` response. Only `pricingTier` and `subPlan`
/// feed the normalizer; `enforce` and the inheritance fields only show up
/// in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRecord {
    #[serde(default)]
    pub pricing_tier: Option<String>,
    #[serde(default)]
    pub sub_plan: Option<String>,
    #[serde(default)]
    pub enforce: Option<String>,
    #[serde(default)]
    pub inherited: Option<String>,
    #[serde(default)]
    pub inherited_from: Option<String>,
}

impl PricingRecord {
    /// Normalizes this record into a [`PlanLabel`]
    pub fn label(&self) -> PlanLabel {
        normalize(self.sub_plan.as_deref(), self.pricing_tier.as_deref())
    }

    /// One-line description of where this pricing comes from, for logs
    pub fn provenance(&self) -> String {
        format!(
            "enforce: {}, inherited: {}, inherited from: {}",
            self.enforce.as_deref().unwrap_or("-"),
            self.inherited.as_deref().unwrap_or("-"),
            self.inherited_from.as_deref().unwrap_or("-")
        )
    }
}

/// Folds a sub-plan and a pricing tier into one canonical label
///
/// Precedence:
/// 1. A non-blank sub-plan wins, trimmed with its case preserved.
/// 2. Otherwise a non-blank tier is compared case-insensitively against
///    `Free` and `Standard`; any other tier passes through trimmed.
/// 3. Otherwise the plan is `Unknown`.
///
/// The function is total and never fails.
///
/// # Examples
///
/// ```
/// use tierscout::plan::{normalize, PlanLabel};
///
/// assert_eq!(normalize(Some("P2"), Some("Free")), PlanLabel::P2);
/// assert_eq!(normalize(Some(""), Some("free")), PlanLabel::Free);
/// assert_eq!(normalize(None, None), PlanLabel::Unknown);
/// ```
pub fn normalize(sub_plan: Option<&str>, pricing_tier: Option<&str>) -> PlanLabel {
    if let Some(sub_plan) = non_blank(sub_plan) {
        return PlanLabel::from_sub_plan(sub_plan);
    }

    match non_blank(pricing_tier) {
        Some(tier) if tier.eq_ignore_ascii_case("free") => PlanLabel::Free,
        Some(tier) if tier.eq_ignore_ascii_case("standard") => PlanLabel::Standard,
        Some(tier) => PlanLabel::Other(tier.to_string()),
        None => PlanLabel::Unknown,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
