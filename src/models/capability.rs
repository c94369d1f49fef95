// Data Profile Manager - Capability Model
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! APN types, network capabilities, and radio network types.
//!
//! Profiles advertise the traffic they can carry as a bitmask of APN types.
//! Network requests arrive as capability sets; the mapping between the two
//! lives here, together with the profile-set grouping constants.

use serde::{Deserialize, Serialize};

/// Profile set id of a row that was never assigned to a set.
pub const NO_PROFILE_SET_ID: i32 = 0;

/// Profile set id that matches any preferred set.
pub const MATCH_ALL_PROFILE_SET_ID: i32 = -1;

/// Traffic types an access point can carry. Each type is one bit in the
/// access point's type bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApnType {
    /// General internet traffic.
    Default,
    /// Multimedia messaging.
    Mms,
    /// Secure user-plane location.
    Supl,
    /// Tethered (dial-up networking) traffic.
    Dun,
    /// Firmware-over-the-air updates.
    Fota,
    /// IP multimedia subsystem registration.
    Ims,
    /// Carrier broadcast services.
    Cbs,
    /// Initial attach.
    Ia,
    /// Emergency calling.
    Emergency,
    /// XCAP provisioning (supplementary services).
    Xcap,
}

impl ApnType {
    /// All known types, in bit order.
    pub const ALL: [ApnType; 10] = [
        ApnType::Default,
        ApnType::Mms,
        ApnType::Supl,
        ApnType::Dun,
        ApnType::Fota,
        ApnType::Ims,
        ApnType::Cbs,
        ApnType::Ia,
        ApnType::Emergency,
        ApnType::Xcap,
    ];

    /// This type's position in the type bitmask.
    pub const fn bit(self) -> u32 {
        match self {
            Self::Default => 1 << 0,
            Self::Mms => 1 << 1,
            Self::Supl => 1 << 2,
            Self::Dun => 1 << 3,
            Self::Fota => 1 << 4,
            Self::Ims => 1 << 5,
            Self::Cbs => 1 << 6,
            Self::Ia => 1 << 7,
            Self::Emergency => 1 << 8,
            Self::Xcap => 1 << 9,
        }
    }

    /// Bitmask covering every known type.
    pub fn all_types_mask() -> u32 {
        Self::ALL.iter().fold(0, |mask, t| mask | t.bit())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Mms => "mms",
            Self::Supl => "supl",
            Self::Dun => "dun",
            Self::Fota => "fota",
            Self::Ims => "ims",
            Self::Cbs => "cbs",
            Self::Ia => "ia",
            Self::Emergency => "emergency",
            Self::Xcap => "xcap",
        }
    }

    /// Parse a single type name as stored in profile rows.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "mms" => Some(Self::Mms),
            "supl" => Some(Self::Supl),
            "dun" => Some(Self::Dun),
            "fota" => Some(Self::Fota),
            "ims" => Some(Self::Ims),
            "cbs" => Some(Self::Cbs),
            "ia" => Some(Self::Ia),
            "emergency" => Some(Self::Emergency),
            "xcap" => Some(Self::Xcap),
            _ => None,
        }
    }

    /// Parse a comma-separated type list ("default,supl") into a bitmask.
    /// A lone "*" covers every type. Returns `None` for an empty list or
    /// any unknown token, so callers can treat the row as malformed.
    pub fn mask_from_list(list: &str) -> Option<u32> {
        if list.trim() == "*" {
            return Some(Self::all_types_mask());
        }
        let mut mask = 0u32;
        let mut any = false;
        for token in list.split(',') {
            if token.trim().is_empty() {
                continue;
            }
            mask |= Self::from_name(token)?.bit();
            any = true;
        }
        if any {
            Some(mask)
        } else {
            None
        }
    }

    /// Render a bitmask back into a comma-separated type list.
    pub fn list_from_mask(mask: u32) -> String {
        Self::ALL
            .iter()
            .filter(|t| mask & t.bit() != 0)
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The network capability this traffic type serves.
    pub fn net_capability(self) -> NetCapability {
        match self {
            Self::Default => NetCapability::Internet,
            Self::Mms => NetCapability::Mms,
            Self::Supl => NetCapability::Supl,
            Self::Dun => NetCapability::Dun,
            Self::Fota => NetCapability::Fota,
            Self::Ims => NetCapability::Ims,
            Self::Cbs => NetCapability::Cbs,
            Self::Ia => NetCapability::Ia,
            Self::Emergency => NetCapability::Eims,
            Self::Xcap => NetCapability::Xcap,
        }
    }
}

/// A requirement a network request places on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetCapability {
    Internet,
    Mms,
    Supl,
    Dun,
    Fota,
    Ims,
    Cbs,
    /// Initial attach.
    Ia,
    /// Emergency calling.
    Eims,
    Xcap,
}

impl NetCapability {
    /// The traffic type a profile must advertise to satisfy this capability.
    pub fn apn_type(self) -> ApnType {
        match self {
            Self::Internet => ApnType::Default,
            Self::Mms => ApnType::Mms,
            Self::Supl => ApnType::Supl,
            Self::Dun => ApnType::Dun,
            Self::Fota => ApnType::Fota,
            Self::Ims => ApnType::Ims,
            Self::Cbs => ApnType::Cbs,
            Self::Ia => ApnType::Ia,
            Self::Eims => ApnType::Emergency,
            Self::Xcap => ApnType::Xcap,
        }
    }
}

/// Radio access technologies a profile may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Gprs,
    Edge,
    Umts,
    Hspa,
    Lte,
    Nr,
    Iwlan,
}

impl NetworkType {
    /// This technology's position in the network type bitmask.
    pub const fn bit(self) -> u32 {
        match self {
            Self::Gprs => 1 << 0,
            Self::Edge => 1 << 1,
            Self::Umts => 1 << 2,
            Self::Hspa => 1 << 3,
            Self::Lte => 1 << 4,
            Self::Nr => 1 << 5,
            Self::Iwlan => 1 << 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gprs => "gprs",
            Self::Edge => "edge",
            Self::Umts => "umts",
            Self::Hspa => "hspa",
            Self::Lte => "lte",
            Self::Nr => "nr",
            Self::Iwlan => "iwlan",
        }
    }
}
