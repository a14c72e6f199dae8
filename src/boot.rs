// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot device selection, stored as a metadata flag on the instance.

use crate::compute::ComputeClient;
use crate::error::ComputeError;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::info;
use slog::o;
use slog::Logger;
use std::fmt;
use std::sync::Arc;

/// Metadata key read by the hypervisor to decide whether to PXE boot first.
pub const BOOT_FLAG_KEY: &str = "libvirt:pxe-first";

const NETWORK_BOOT_MARKER: &str = "1";

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum BootDevice {
    /// Boot from the local disk.
    Hd,
    /// PXE boot.
    Network,
}

impl BootDevice {
    /// Interpret the boot flag as read from instance metadata.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(value) if !value.is_empty() => BootDevice::Network,
            _ => BootDevice::Hd,
        }
    }

    /// The boot flag value that selects this device.
    pub fn flag(self) -> &'static str {
        match self {
            BootDevice::Hd => "",
            BootDevice::Network => NETWORK_BOOT_MARKER,
        }
    }
}

impl fmt::Display for BootDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootDevice::Hd => f.write_str("hd"),
            BootDevice::Network => f.write_str("network"),
        }
    }
}

/// Reads and writes the boot flag of one instance.
///
/// Nothing is cached: every query goes to the compute service.
pub struct BootDeviceAdapter {
    compute: Arc<dyn ComputeClient>,
    instance_id: String,
    log: Logger,
}

impl BootDeviceAdapter {
    pub fn new(
        compute: Arc<dyn ComputeClient>,
        instance_id: &str,
        log: &Logger,
    ) -> Self {
        let log = log.new(o!("component" => "BootDeviceAdapter"));
        BootDeviceAdapter { compute, instance_id: instance_id.to_string(), log }
    }

    pub async fn boot_device(&self) -> Result<BootDevice, ComputeError> {
        let metadata = self.compute.get_metadata(&self.instance_id).await?;
        Ok(BootDevice::from_flag(
            metadata.get(BOOT_FLAG_KEY).map(String::as_str),
        ))
    }

    pub async fn set_boot_device(
        &self,
        device: BootDevice,
    ) -> Result<(), ComputeError> {
        self.compute
            .set_metadata_item(&self.instance_id, BOOT_FLAG_KEY, device.flag())
            .await?;
        info!(self.log, "boot device set"; "device" => %device);
        Ok(())
    }
}
