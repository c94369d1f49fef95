// Data Profile Manager - Carrier Configuration
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Carrier configuration model.

use serde::{Deserialize, Serialize};

use super::capability::ApnType;

/// Carrier-specific policy driving profile reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// Whether the loaded configuration is specific to the inserted
    /// carrier. When false, the store is not consulted and only the
    /// synthesized default profiles exist.
    #[serde(default)]
    pub carrier_specific: bool,

    /// Access point name preferred for internet when the store records no
    /// explicit override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_preferred_apn: Option<String>,

    /// Traffic types allowed for initial attach, in search order.
    #[serde(default = "default_attach_types")]
    pub allowed_initial_attach_types: Vec<ApnType>,
}

fn default_attach_types() -> Vec<ApnType> {
    vec![ApnType::Ia, ApnType::Default]
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            carrier_specific: false,
            default_preferred_apn: None,
            allowed_initial_attach_types: default_attach_types(),
        }
    }
}

impl CarrierConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), super::Error> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }
}
