//! Compute resources covered by the Defender for Servers plan
//!
//! Three ARM resource types can carry a resource-level pricing override:
//! virtual machines, virtual machine scale sets and Arc-connected machines.
//! This module classifies type strings into a [`ResourceScope`] and defines
//! which types a scan covers through [`Coverage`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

const VM_TYPE: &str = "Microsoft.Compute/virtualMachines";
const VMSS_TYPE: &str = "Microsoft.Compute/virtualMachineScaleSets";
const ARC_TYPE: &str = "Microsoft.HybridCompute/machines";

/// One enumerated resource, as returned by the ARM listing APIs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    #[serde(rename = "id")]
    pub resource_id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl ResourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn scope(&self) -> ResourceScope {
        ResourceScope::classify(&self.resource_type)
    }
}

/// Resource-type classification of a scanned item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceScope {
    Vm,
    Vmss,
    Arc,
    Unknown,
}

impl ResourceScope {
    /// Classifies an ARM resource-type string by suffix
    ///
    /// Resource providers report types with inconsistent casing
    /// (`microsoft.compute/virtualmachines` from Resource Graph, camel case
    /// from the provider APIs), so the comparison ignores ASCII case.
    ///
    /// # Examples
    ///
    /// ```
    /// use tierscout::resource::ResourceScope;
    ///
    /// assert_eq!(ResourceScope::classify("Microsoft.Compute/virtualMachines"), ResourceScope::Vm);
    /// assert_eq!(ResourceScope::classify("Microsoft.Web/sites"), ResourceScope::Unknown);
    /// ```
    pub fn classify(resource_type: &str) -> Self {
        let resource_type = resource_type.trim();
        if ends_with_ignore_case(resource_type, VM_TYPE) {
            ResourceScope::Vm
        } else if ends_with_ignore_case(resource_type, "virtualMachineScaleSets") {
            ResourceScope::Vmss
        } else if ends_with_ignore_case(resource_type, ARC_TYPE) {
            ResourceScope::Arc
        } else {
            ResourceScope::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceScope::Vm => "VM",
            ResourceScope::Vmss => "VMSS",
            ResourceScope::Arc => "Arc",
            ResourceScope::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn ends_with_ignore_case(value: &str, suffix: &str) -> bool {
    value.len() >= suffix.len()
        && value.is_char_boundary(value.len() - suffix.len())
        && value[value.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// A listable compute resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    /// Fully-qualified ARM type, also the listing path under a subscription
    pub resource_type: &'static str,
    pub api_version: &'static str,
}

pub const VIRTUAL_MACHINES: ResourceKind = ResourceKind {
    resource_type: VM_TYPE,
    api_version: "2024-03-01",
};

pub const SCALE_SETS: ResourceKind = ResourceKind {
    resource_type: VMSS_TYPE,
    api_version: "2024-03-01",
};

pub const ARC_MACHINES: ResourceKind = ResourceKind {
    resource_type: ARC_TYPE,
    api_version: "2022-12-27",
};

/// Which resource types a scan audits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Coverage {
    /// Virtual machines only
    Vm,
    /// Virtual machines, scale sets and Arc-connected machines
    #[default]
    Compute,
}

impl Coverage {
    /// Resource kinds to enumerate, in listing order
    pub fn kinds(&self) -> &'static [ResourceKind] {
        match self {
            Coverage::Vm => &[VIRTUAL_MACHINES],
            Coverage::Compute => &[VIRTUAL_MACHINES, SCALE_SETS, ARC_MACHINES],
        }
    }
}
