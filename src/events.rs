// Data Profile Manager - Event Loop
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Inbound change events and the serializing rebuild loop.
//!
//! The host transport delivers upstream change signals here; one task
//! drains the queue in order and runs a full rebuild per event, so no two
//! rebuilds ever overlap. Queueing an event never blocks the sender.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::services::manager::ProfileManager;

/// Upstream change signals that trigger a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEvent {
    /// Carrier configuration was updated.
    ConfigUpdated,
    /// The external profile store changed.
    StoreChanged,
    /// The SIM was refreshed or swapped.
    SimRefreshed,
}

impl ProfileEvent {
    fn describe(&self) -> &'static str {
        match self {
            Self::ConfigUpdated => "config updated",
            Self::StoreChanged => "profile store changed",
            Self::SimRefreshed => "SIM refreshed",
        }
    }
}

/// Handle for queueing events into the rebuild loop.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ProfileEvent>,
}

impl EventSender {
    /// Queue an event. Silently drops the event once the loop has
    /// stopped.
    pub fn send(&self, event: ProfileEvent) {
        if self.tx.send(event).is_err() {
            debug!("Profile event loop stopped, dropping {:?}", event);
        }
    }
}

/// Spawn the serializing event loop for the given manager. The loop ends
/// when every [`EventSender`] clone is dropped.
pub fn spawn_event_loop(manager: Arc<ProfileManager>) -> (EventSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProfileEvent>();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!("Updating data profiles: {}", event.describe());
            manager.rebuild();
        }
        debug!("Profile event loop finished");
    });
    (EventSender { tx }, handle)
}
