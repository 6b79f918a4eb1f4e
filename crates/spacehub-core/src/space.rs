// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Space domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hardware class that the quota ledger accounts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeType {
    /// General purpose CPU.
    Cpu,
    /// NPU accelerator slot.
    Npu,
}

impl ComputeType {
    /// Returns the string representation of the compute type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Npu => "npu",
        }
    }
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota a piece of hardware costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCost {
    /// Ledger row to charge. `None` for hardware the ledger does not know.
    pub compute_type: Option<ComputeType>,
    /// Units to consume.
    pub count: u32,
}

impl QuotaCost {
    /// No ledger interaction at all.
    pub const NONE: QuotaCost = QuotaCost {
        compute_type: None,
        count: 0,
    };
}

/// Hardware flavour selected for a Space, keeping the original label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "lowercase")]
pub enum Hardware {
    /// CPU flavour (e.g. "CPU basic 2 vCPU · 16GB").
    Cpu(String),
    /// NPU flavour (e.g. "NPU basic 8 vCPU · 32GB · 1 Ascend").
    Npu(String),
    /// Anything else.
    Unknown(String),
}

impl Hardware {
    /// Parse a hardware label by case-insensitive prefix.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("npu") {
            Self::Npu(trimmed.to_string())
        } else if lower.starts_with("cpu") {
            Self::Cpu(trimmed.to_string())
        } else {
            Self::Unknown(trimmed.to_string())
        }
    }

    /// The original label.
    pub fn label(&self) -> &str {
        match self {
            Self::Cpu(label) | Self::Npu(label) | Self::Unknown(label) => label,
        }
    }

    /// Whether this hardware is an NPU flavour.
    pub fn is_npu(&self) -> bool {
        matches!(self, Self::Npu(_))
    }

    /// Quota this hardware costs on the ledger.
    pub fn quota_cost(&self) -> QuotaCost {
        match self {
            Self::Npu(_) => QuotaCost {
                compute_type: Some(ComputeType::Npu),
                count: 1,
            },
            Self::Cpu(_) => QuotaCost {
                compute_type: Some(ComputeType::Cpu),
                count: 0,
            },
            Self::Unknown(_) => QuotaCost::NONE,
        }
    }
}

/// Visibility of the backing repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone can read.
    #[default]
    Public,
    /// Owner only.
    Private,
}

impl Visibility {
    /// Returns the string representation of the visibility.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// Parse a visibility from a string. Unknown values are private.
    pub fn parse(s: &str) -> Self {
        match s {
            "public" => Self::Public,
            _ => Self::Private,
        }
    }
}

/// Store key of a Space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceIndex {
    /// Owner account.
    pub owner: String,
    /// Local Space id.
    pub id: String,
}

impl SpaceIndex {
    /// Create an index.
    pub fn new(owner: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for SpaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.id)
    }
}

/// A compute workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    /// Local id.
    pub id: String,
    /// Owner account.
    pub owner: String,
    /// Space name, unique per owner.
    pub name: String,
    /// Id of the backing repository at the repo provider.
    pub repo_id: String,
    /// Selected hardware.
    pub hardware: Hardware,
    /// Base image of the serving container.
    pub base_image: String,
    /// Repository visibility.
    pub visibility: Visibility,
    /// Free-form description.
    pub description: Option<String>,
    /// Latest known commit of the backing repository.
    pub commit_id: Option<String>,
    /// Set when the repository has no application file.
    pub no_application_file: bool,
    /// Free-form fault tag.
    pub exception: Option<String>,
    /// True once quota has been durably tied to this Space.
    pub comp_power_allocated: bool,
    /// Optimistic concurrency counter.
    pub version: u64,
    /// When the Space was created.
    pub created_at: DateTime<Utc>,
}

impl Space {
    /// Store key of this Space.
    pub fn index(&self) -> SpaceIndex {
        SpaceIndex::new(&self.owner, &self.id)
    }
}

/// Request to create a Space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpaceRequest {
    /// Owner account.
    pub owner: String,
    /// Space name.
    pub name: String,
    /// Hardware label, parsed with [`Hardware::parse`].
    pub hardware: String,
    /// Base image.
    pub base_image: String,
    /// Repository visibility. Falls back to the configured default.
    pub visibility: Option<Visibility>,
    /// Free-form description.
    pub description: Option<String>,
}
