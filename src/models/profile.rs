// Data Profile Manager - Profile Data Model
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Profile data model.
//!
//! A DataProfile describes one way the device may establish a data
//! connection. It contains:
//! - An access point descriptor (name, traffic types, addressing mode)
//! - An optional traffic descriptor
//! - Runtime-only selection marks (`preferred`, `last_used`)
//!
//! Equality is structural over the descriptor fields only: two profiles
//! with identical descriptors are the same logical profile even when their
//! runtime marks differ. The marks may be updated in place without creating
//! a new logical profile.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::{ApnType, NetCapability, NetworkType};

/// IP addressing mode of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    /// IPv4 only.
    Ipv4,
    /// IPv6 only.
    Ipv6,
    /// Dual stack.
    #[default]
    Ipv4v6,
}

impl IpProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Ipv4v6 => "ipv4v6",
        }
    }

    /// Parse a protocol name as stored in profile rows.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ip" | "ipv4" => Some(Self::Ipv4),
            "ipv6" => Some(Self::Ipv6),
            "ipv4v6" => Some(Self::Ipv4v6),
            _ => None,
        }
    }
}

/// An access point: the named network connection point a profile describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPoint {
    /// Human-readable entry name.
    pub entry_name: String,
    /// Access point name sent to the network.
    pub apn_name: String,
    /// Traffic types this access point carries ([`ApnType`] bitmask).
    pub apn_types: u32,
    /// Radio technologies this access point may be used on
    /// ([`NetworkType`] bitmask). Zero means no restriction.
    #[serde(default)]
    pub network_type_bitmask: u32,
    /// Addressing mode on the home network.
    #[serde(default)]
    pub protocol: IpProtocol,
    /// Addressing mode while roaming.
    #[serde(default)]
    pub roaming_protocol: IpProtocol,
    /// Grouping tag; profiles activate and deactivate as a set.
    #[serde(default)]
    pub profile_set_id: i32,
    /// Store row backing this access point. None for synthesized profiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<i64>,
    /// Whether the carrier allows this access point to be used.
    #[serde(default = "default_true")]
    pub carrier_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl AccessPoint {
    /// Check whether this access point carries the given traffic type.
    pub fn supports_apn_type(&self, apn_type: ApnType) -> bool {
        self.apn_types & apn_type.bit() != 0
    }

    /// Check whether this access point may be used on the given radio
    /// technology. An empty bitmask places no restriction.
    pub fn can_support_network_type(&self, network_type: NetworkType) -> bool {
        self.network_type_bitmask == 0 || self.network_type_bitmask & network_type.bit() != 0
    }
}

/// Additional routing information for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TrafficDescriptor {
    /// Data network name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnn: Option<String>,
    /// OS application id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

/// A complete data profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProfile {
    /// Access point descriptor.
    pub access_point: AccessPoint,

    /// Optional traffic descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_descriptor: Option<TrafficDescriptor>,

    /// Whether this is the preferred internet profile (runtime only).
    #[serde(skip)]
    pub preferred: bool,

    /// When a connection last used this profile (runtime only).
    #[serde(skip)]
    pub last_used: Option<DateTime<Utc>>,
}

impl DataProfile {
    /// Create a profile for the given access point, without a traffic
    /// descriptor.
    pub fn new(access_point: AccessPoint) -> Self {
        Self {
            access_point,
            traffic_descriptor: None,
            preferred: false,
            last_used: None,
        }
    }

    /// Create a profile whose traffic descriptor carries the access point
    /// name as the data network name.
    pub fn with_dnn_descriptor(access_point: AccessPoint) -> Self {
        let descriptor = TrafficDescriptor {
            dnn: Some(access_point.apn_name.clone()),
            app_id: None,
        };
        Self {
            access_point,
            traffic_descriptor: Some(descriptor),
            preferred: false,
            last_used: None,
        }
    }

    /// Get the access point name.
    pub fn apn_name(&self) -> &str {
        &self.access_point.apn_name
    }

    /// Get the backing store row id, if any.
    pub fn row_id(&self) -> Option<i64> {
        self.access_point.row_id
    }

    /// Check whether this profile can serve the given capability.
    pub fn can_satisfy(&self, capability: NetCapability) -> bool {
        self.access_point.supports_apn_type(capability.apn_type())
    }

    /// Check whether this profile can serve every capability in the set.
    pub fn can_satisfy_all(&self, capabilities: &[NetCapability]) -> bool {
        capabilities.iter().all(|c| self.can_satisfy(*c))
    }

    /// Stamp the last-used mark with the current time.
    pub fn mark_used(&mut self) {
        self.last_used = Some(Utc::now());
    }
}

// Structural equality over the immutable descriptor fields only. The
// runtime marks are deliberately excluded: a rebuilt profile with fresh
// marks is still the same logical profile.
impl PartialEq for DataProfile {
    fn eq(&self, other: &Self) -> bool {
        self.access_point == other.access_point
            && self.traffic_descriptor == other.traffic_descriptor
    }
}

impl Eq for DataProfile {}

impl Hash for DataProfile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.access_point.hash(state);
        self.traffic_descriptor.hash(state);
    }
}

impl fmt::Display for DataProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} types=[{}] set={}",
            self.access_point.entry_name,
            self.access_point.apn_name,
            ApnType::list_from_mask(self.access_point.apn_types),
            self.access_point.profile_set_id,
        )?;
        if let Some(id) = self.access_point.row_id {
            write!(f, " row={}", id)?;
        }
        Ok(())
    }
}
