// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power state tracking and power control
//!
//! The compute service is authoritative for the instance's power state but
//! takes a while to converge after a transition. Management clients tend to
//! poll the power state in a tight loop right after asking for a transition,
//! so when caching is enabled we skip the remote query whenever the last
//! status we observed matches the last transition we requested.
//!
//! Note that the observation may predate the request: if we saw the instance
//! off, then asked for it to go off again, the stale observation is trusted
//! until the next transition request changes the target.

use crate::compute::ComputeClient;
use crate::compute::ServerStatus;
use crate::error::ComputeError;
use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Power state last observed from the compute service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObservedPower {
    /// Nothing observed yet, or the service reported a status that is
    /// neither running nor shut off.
    #[default]
    Unknown,
    On,
    Off,
}

impl From<&ServerStatus> for ObservedPower {
    fn from(status: &ServerStatus) -> Self {
        match status {
            ServerStatus::Active => ObservedPower::On,
            ServerStatus::Shutoff => ObservedPower::Off,
            ServerStatus::Other(_) => ObservedPower::Unknown,
        }
    }
}

/// The transition this BMC most recently requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TargetPower {
    #[default]
    None,
    On,
    Off,
}

/// What the BMC believes about the instance's power state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PowerBelief {
    pub cached: ObservedPower,
    pub target: TargetPower,
}

impl PowerBelief {
    /// Returns the cached power state if it can be trusted without asking
    /// the compute service, i.e. caching is enabled and the last observation
    /// agrees with the last requested transition.
    pub fn trusted(&self, cache_enabled: bool) -> Option<bool> {
        if !cache_enabled {
            return None;
        }
        match (self.cached, self.target) {
            (ObservedPower::On, TargetPower::On) => Some(true),
            (ObservedPower::Off, TargetPower::Off) => Some(false),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transition {
    On,
    Off,
}

impl Transition {
    fn wants_active(self) -> bool {
        self == Transition::On
    }

    fn target(self) -> TargetPower {
        match self {
            Transition::On => TargetPower::On,
            Transition::Off => TargetPower::Off,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::On => f.write_str("on"),
            Transition::Off => f.write_str("off"),
        }
    }
}

pub struct PowerStateTracker {
    compute: Arc<dyn ComputeClient>,
    instance_id: String,
    cache_enabled: bool,
    /// Held for the whole of each operation so that a status check and the
    /// transition that depends on it cannot interleave with another request.
    belief: Mutex<PowerBelief>,
    log: Logger,
}

impl PowerStateTracker {
    pub fn new(
        compute: Arc<dyn ComputeClient>,
        instance_id: &str,
        cache_enabled: bool,
        log: &Logger,
    ) -> Self {
        let log = log.new(o!("component" => "PowerStateTracker"));
        PowerStateTracker {
            compute,
            instance_id: instance_id.to_string(),
            cache_enabled,
            belief: Mutex::new(PowerBelief::default()),
            log,
        }
    }

    /// Snapshot of the current belief.
    pub async fn belief(&self) -> PowerBelief {
        *self.belief.lock().await
    }

    /// Whether the instance is powered on.
    pub async fn power_state(&self) -> Result<bool, ComputeError> {
        let mut belief = self.belief.lock().await;
        self.is_active(&mut belief).await
    }

    pub async fn power_on(&self) -> Result<(), ComputeError> {
        self.transition(Transition::On).await
    }

    pub async fn power_off(&self) -> Result<(), ComputeError> {
        self.transition(Transition::Off).await
    }

    async fn is_active(
        &self,
        belief: &mut PowerBelief,
    ) -> Result<bool, ComputeError> {
        if let Some(active) = belief.trusted(self.cache_enabled) {
            debug!(self.log, "using cached power state"; "active" => active);
            return Ok(active);
        }

        let record = self.compute.get_by_id(&self.instance_id).await?;
        belief.cached = ObservedPower::from(&record.status);
        debug!(self.log, "observed power state"; "status" => %record.status);
        Ok(record.status.is_active())
    }

    async fn transition(&self, to: Transition) -> Result<(), ComputeError> {
        let mut belief = self.belief.lock().await;
        if self.is_active(&mut belief).await? == to.wants_active() {
            info!(self.log, "{} is already {}.", self.instance_id, to);
            return Ok(());
        }

        let result = match to {
            Transition::On => self.compute.start(&self.instance_id).await,
            Transition::Off => self.compute.stop(&self.instance_id).await,
        };
        match result {
            Ok(()) => (),
            Err(err) if err.is_conflict() => {
                info!(self.log, "Ignoring exception: \"{}\"", err);
            }
            Err(err) => return Err(err),
        }

        belief.target = to.target();
        Ok(())
    }
}
