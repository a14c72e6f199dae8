// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the remote compute service that owns the managed instance.

use crate::error::ComputeError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod nova;

pub use nova::NovaClient;

/// Status string reported by the compute service for a server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerStatus {
    Active,
    Shutoff,
    /// Any other status (BUILD, REBOOT, ERROR, ...), kept verbatim.
    Other(String),
}

impl ServerStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ServerStatus::Active)
    }
}

impl From<String> for ServerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ACTIVE" => ServerStatus::Active,
            "SHUTOFF" => ServerStatus::Shutoff,
            _ => ServerStatus::Other(s),
        }
    }
}

impl From<ServerStatus> for String {
    fn from(status: ServerStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Active => f.write_str("ACTIVE"),
            ServerStatus::Shutoff => f.write_str("SHUTOFF"),
            ServerStatus::Other(s) => f.write_str(s),
        }
    }
}

/// The subset of a compute server's representation that the BMC cares about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Operations against the compute service's instance-management API.
///
/// Implementations must preserve the distinction between the variants of
/// [`ComputeError`]; callers rely on it to decide between retrying, falling
/// back to a name lookup, swallowing a conflict, or reporting a fault.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Fetch a server by its stable id.
    async fn get_by_id(&self, id: &str) -> Result<ServerRecord, ComputeError>;

    /// List every server whose name is exactly `name`.
    async fn list_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<ServerRecord>, ComputeError>;

    /// Request a stop transition.
    async fn stop(&self, id: &str) -> Result<(), ComputeError>;

    /// Request a start transition.
    async fn start(&self, id: &str) -> Result<(), ComputeError>;

    async fn get_metadata(
        &self,
        id: &str,
    ) -> Result<BTreeMap<String, String>, ComputeError>;

    async fn set_metadata_item(
        &self,
        id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ComputeError>;
}
