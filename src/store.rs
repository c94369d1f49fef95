// Data Profile Manager - Profile Store
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Profile store boundary and a local reference implementation.
//!
//! The reconciler only sees the narrow [`ProfileStore`] interface: raw
//! profile rows for a subscription, the explicit preferred override, and
//! the preferred set id derived from the override row. The real store is
//! external; [`LocalProfileStore`] is an in-memory implementation with
//! optional JSON file persistence, used for embedding and tests.
//!
//! This module uses RwLock for thread-safe access. Lock poisoning is
//! handled gracefully by recovering the inner value, as poison indicates a
//! panic in another thread but the data itself may still be valid.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::models::{
    AccessPoint, ApnType, DataProfile, Error, IpProtocol, Result, NO_PROFILE_SET_ID,
};

/// A raw profile row as recorded in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    /// Row identifier, unique per store.
    pub id: i64,
    /// Human-readable entry name.
    pub entry_name: String,
    /// Access point name.
    pub apn_name: String,
    /// Comma-separated traffic type list ("default,supl"), "*" for all.
    pub apn_types: String,
    /// Radio technology bitmask. Zero means no restriction.
    #[serde(default)]
    pub network_type_bitmask: u32,
    /// Home addressing mode name.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Roaming addressing mode name.
    #[serde(default = "default_protocol")]
    pub roaming_protocol: String,
    /// Grouping tag for set-based activation.
    #[serde(default)]
    pub profile_set_id: i32,
    /// Whether the carrier allows this row to be used.
    #[serde(default = "default_true")]
    pub carrier_enabled: bool,
}

fn default_protocol() -> String {
    "ipv4v6".to_string()
}

fn default_true() -> bool {
    true
}

impl ProfileRow {
    /// Parse this row into a profile. Rows with an empty APN name, an
    /// unknown traffic type token, or an unknown protocol are malformed;
    /// the reconciler skips them and continues.
    pub fn parse(&self) -> Result<DataProfile> {
        if self.apn_name.trim().is_empty() {
            return Err(Error::malformed_row(self.id, "empty apn name"));
        }
        let apn_types = ApnType::mask_from_list(&self.apn_types).ok_or_else(|| {
            Error::malformed_row(self.id, format!("unparseable type list '{}'", self.apn_types))
        })?;
        let protocol = IpProtocol::from_name(&self.protocol).ok_or_else(|| {
            Error::malformed_row(self.id, format!("unknown protocol '{}'", self.protocol))
        })?;
        let roaming_protocol = IpProtocol::from_name(&self.roaming_protocol).ok_or_else(|| {
            Error::malformed_row(
                self.id,
                format!("unknown roaming protocol '{}'", self.roaming_protocol),
            )
        })?;

        Ok(DataProfile::with_dnn_descriptor(AccessPoint {
            entry_name: self.entry_name.clone(),
            apn_name: self.apn_name.trim().to_string(),
            apn_types,
            network_type_bitmask: self.network_type_bitmask,
            protocol,
            roaming_protocol,
            profile_set_id: self.profile_set_id,
            row_id: Some(self.id),
            carrier_enabled: self.carrier_enabled,
        }))
    }
}

/// Read/write interface over the external profile store.
pub trait ProfileStore: Send + Sync {
    /// All rows for the subscription, ordered by row id.
    fn query_profiles(&self, subscription_id: i32) -> Result<Vec<ProfileRow>>;

    /// Row id of the explicit preferred override, if any.
    fn query_preferred_override(&self, subscription_id: i32) -> Option<i64>;

    /// Set id of the override row. [`NO_PROFILE_SET_ID`] when no override
    /// exists or the override points at a vanished row.
    fn query_preferred_set_id(&self, subscription_id: i32) -> i32;

    /// Replace the preferred override. Delete-then-insert semantics: any
    /// existing override is cleared first, then `row_id` (if some) is
    /// recorded.
    fn write_preferred_override(&self, subscription_id: i32, row_id: Option<i64>);
}

/// Persisted store content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    rows: Vec<ProfileRow>,
    preferred_override: Option<i64>,
}

/// In-memory profile store with optional JSON file persistence.
///
/// Keeps rows sorted by id. All mutations save through to the backing file
/// when one is configured.
#[derive(Debug)]
pub struct LocalProfileStore {
    path: Option<PathBuf>,
    data: RwLock<StoreData>,
}

impl LocalProfileStore {
    /// Create an empty in-memory store.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(StoreData::default()),
        }
    }

    /// Create a store backed by a JSON file, loading existing content.
    pub fn with_path(path: PathBuf) -> Self {
        let store = Self {
            path: Some(path),
            data: RwLock::new(StoreData::default()),
        };
        store.load();
        store
    }

    // ========================================================================
    // RwLock Helper Methods (handle poisoning gracefully)
    // ========================================================================

    fn read_data<R>(&self, reader: impl FnOnce(&StoreData) -> R) -> R {
        match self.data.read() {
            Ok(guard) => reader(&guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading store data, recovering");
                reader(&poisoned.into_inner())
            }
        }
    }

    fn write_data<R>(&self, writer: impl FnOnce(&mut StoreData) -> R) -> R {
        match self.data.write() {
            Ok(mut guard) => writer(&mut guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing store data, recovering");
                writer(&mut poisoned.into_inner())
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Load store content from disk.
    fn load(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if !path.exists() {
            return;
        }

        match File::open(path) {
            Ok(file) => {
                let reader = BufReader::new(file);
                match serde_json::from_reader::<_, StoreData>(reader) {
                    Ok(mut data) => {
                        data.rows.sort_by_key(|r| r.id);
                        let row_count = data.rows.len();
                        self.write_data(|d| *d = data);
                        info!("Loaded {} profile rows from {:?}", row_count, path);
                    }
                    Err(e) => {
                        error!("Failed to parse profile store file: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Failed to open profile store file: {}", e);
            }
        }
    }

    /// Save store content to disk.
    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };

        let data = self.read_data(|d| d.clone());
        match File::create(path) {
            Ok(file) => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
                }
                let writer = BufWriter::new(file);
                if let Err(e) = serde_json::to_writer_pretty(writer, &data) {
                    error!("Failed to write profile store file: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to create profile store file: {}", e);
            }
        }
    }

    // ========================================================================
    // Row Maintenance
    // ========================================================================

    /// Insert or replace a row, keeping id order.
    pub fn insert_row(&self, row: ProfileRow) {
        self.write_data(|d| {
            d.rows.retain(|r| r.id != row.id);
            d.rows.push(row);
            d.rows.sort_by_key(|r| r.id);
        });
        self.save();
    }

    /// Remove a row by id. An override pointing at the removed row is left
    /// in place; queries then resolve it to no profile, matching a store
    /// whose override outlives its row.
    pub fn remove_row(&self, row_id: i64) {
        self.write_data(|d| d.rows.retain(|r| r.id != row_id));
        self.save();
    }

    /// Number of rows currently held.
    pub fn row_count(&self) -> usize {
        self.read_data(|d| d.rows.len())
    }
}

impl ProfileStore for LocalProfileStore {
    fn query_profiles(&self, _subscription_id: i32) -> Result<Vec<ProfileRow>> {
        // Single-subscription store: every row belongs to the active
        // subscription.
        Ok(self.read_data(|d| d.rows.clone()))
    }

    fn query_preferred_override(&self, _subscription_id: i32) -> Option<i64> {
        self.read_data(|d| d.preferred_override)
    }

    fn query_preferred_set_id(&self, _subscription_id: i32) -> i32 {
        self.read_data(|d| {
            d.preferred_override
                .and_then(|id| d.rows.iter().find(|r| r.id == id))
                .map(|r| r.profile_set_id)
                .unwrap_or(NO_PROFILE_SET_ID)
        })
    }

    fn write_preferred_override(&self, _subscription_id: i32, row_id: Option<i64>) {
        self.write_data(|d| {
            d.preferred_override = None;
            if let Some(id) = row_id {
                d.preferred_override = Some(id);
            }
        });
        self.save();
    }
}
