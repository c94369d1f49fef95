//! Modem service boundary used by the reconciler to sync profile state.

use tracing::debug;

use crate::models::DataProfile;

/// Downstream modem service.
///
/// Both pushes are fire-and-forget: implementations must not block the
/// caller and keep their own retry/ack semantics. Failures never surface
/// here — telemetry at most.
pub trait ModemService: Send + Sync {
    /// Push the full profile set.
    fn set_data_profiles(&self, profiles: Vec<DataProfile>, roaming: bool);

    /// Push the profile used for initial network attach.
    fn set_initial_attach_profile(&self, profile: DataProfile, roaming: bool);
}

/// Modem sink that logs every push and drops it. Useful when no modem is
/// connected yet or in host environments without radio hardware.
#[derive(Debug, Default)]
pub struct NullModem;

impl ModemService for NullModem {
    fn set_data_profiles(&self, profiles: Vec<DataProfile>, roaming: bool) {
        debug!(
            "NullModem: dropping push of {} profiles (roaming={})",
            profiles.len(),
            roaming
        );
    }

    fn set_initial_attach_profile(&self, profile: DataProfile, roaming: bool) {
        debug!(
            "NullModem: dropping initial attach push of {} (roaming={})",
            profile, roaming
        );
    }
}
