// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The virtual BMC bound to one resolved instance

use crate::boot::BootDevice;
use crate::boot::BootDeviceAdapter;
use crate::compute::ComputeClient;
use crate::error::ComputeError;
use crate::power::PowerStateTracker;
use crate::resolver::ResolvedInstance;
use async_trait::async_trait;
use slog::debug;
use slog::o;
use slog::Logger;
use std::sync::Arc;

/// Operations a management protocol front end invokes on a BMC.
///
/// Each call either completes or returns the fault to be reported to the
/// protocol client; nothing is retried behind the caller's back.
#[async_trait]
pub trait BmcHandler: Send + Sync {
    /// Returns `true` if the instance is powered on.
    async fn power_state(&self) -> Result<bool, ComputeError>;
    async fn power_on(&self) -> Result<(), ComputeError>;
    async fn power_off(&self) -> Result<(), ComputeError>;
    async fn boot_device(&self) -> Result<BootDevice, ComputeError>;
    async fn set_boot_device(
        &self,
        device: BootDevice,
    ) -> Result<(), ComputeError>;
}

pub struct VirtualBmc {
    instance: ResolvedInstance,
    power: PowerStateTracker,
    boot: BootDeviceAdapter,
    log: Logger,
}

impl VirtualBmc {
    pub fn new(
        compute: Arc<dyn ComputeClient>,
        instance: ResolvedInstance,
        cache_enabled: bool,
        log: &Logger,
    ) -> Self {
        let log = log.new(o!("instance" => instance.id.clone()));
        let power = PowerStateTracker::new(
            Arc::clone(&compute),
            &instance.id,
            cache_enabled,
            &log,
        );
        let boot = BootDeviceAdapter::new(compute, &instance.id, &log);
        VirtualBmc { instance, power, boot, log }
    }

    pub fn instance(&self) -> &ResolvedInstance {
        &self.instance
    }

    pub fn power(&self) -> &PowerStateTracker {
        &self.power
    }
}

#[async_trait]
impl BmcHandler for VirtualBmc {
    async fn power_state(&self) -> Result<bool, ComputeError> {
        let on = self.power.power_state().await?;
        debug!(self.log, "power state"; "on" => on);
        Ok(on)
    }

    async fn power_on(&self) -> Result<(), ComputeError> {
        debug!(self.log, "power on requested");
        self.power.power_on().await
    }

    async fn power_off(&self) -> Result<(), ComputeError> {
        debug!(self.log, "power off requested");
        self.power.power_off().await
    }

    async fn boot_device(&self) -> Result<BootDevice, ComputeError> {
        self.boot.boot_device().await
    }

    async fn set_boot_device(
        &self,
        device: BootDevice,
    ) -> Result<(), ComputeError> {
        debug!(self.log, "boot device change requested"; "device" => %device);
        self.boot.set_boot_device(device).await
    }
}
