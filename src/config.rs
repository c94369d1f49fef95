// Data Profile Manager - Configuration Source
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Configuration source boundary.
//!
//! Carrier policy arrives from an external configuration service; the
//! reconciler only sees the three queries below. [`StaticConfigSource`]
//! holds a [`CarrierConfig`] snapshot and is the implementation used for
//! embedding and tests — the host swaps the snapshot and queues a
//! config-updated event.

use std::sync::RwLock;

use tracing::{info, warn};

use crate::models::{ApnType, CarrierConfig};

/// Carrier policy queries the reconciler depends on.
pub trait ConfigSource: Send + Sync {
    /// Whether the loaded configuration is specific to the inserted
    /// carrier. When false, the profile store is not consulted.
    fn is_carrier_specific(&self) -> bool;

    /// Access point name preferred for internet when the store records no
    /// explicit override.
    fn default_preferred_apn(&self) -> Option<String>;

    /// Traffic types allowed for initial attach, in search order.
    fn allowed_initial_attach_types(&self) -> Vec<ApnType>;
}

/// Config source serving a held [`CarrierConfig`] snapshot.
#[derive(Debug)]
pub struct StaticConfigSource {
    config: RwLock<CarrierConfig>,
}

impl StaticConfigSource {
    pub fn new(config: CarrierConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the held snapshot. The caller is responsible for queueing a
    /// config-updated event afterwards.
    pub fn update(&self, config: CarrierConfig) {
        info!("Carrier config updated");
        match self.config.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => {
                warn!("RwLock poisoned writing carrier config, recovering");
                *poisoned.into_inner() = config;
            }
        }
    }

    fn snapshot(&self) -> CarrierConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn!("RwLock poisoned reading carrier config, recovering");
                poisoned.into_inner().clone()
            }
        }
    }
}

impl Default for StaticConfigSource {
    fn default() -> Self {
        Self::new(CarrierConfig::default())
    }
}

impl ConfigSource for StaticConfigSource {
    fn is_carrier_specific(&self) -> bool {
        self.snapshot().carrier_specific
    }

    fn default_preferred_apn(&self) -> Option<String> {
        self.snapshot()
            .default_preferred_apn
            .filter(|apn| !apn.is_empty())
    }

    fn allowed_initial_attach_types(&self) -> Vec<ApnType> {
        self.snapshot().allowed_initial_attach_types
    }
}
