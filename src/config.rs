// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files and working with a virtual BMC
//! configuration

use crate::sim::SimConfig;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use dropshot::ConfigLogging;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Configuration for a virtual BMC server
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// Server-wide logging configuration.
    pub log: ConfigLogging,
    /// Credentials management clients must present, keyed by user name.
    pub auth_data: BTreeMap<String, String>,
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Compute services we know how to reach, keyed by profile name.
    pub clouds: BTreeMap<String, CloudConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ResolverConfig {
    /// Delay between attempts to look up the managed instance at startup.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

fn default_retry_interval_secs() -> u64 {
    1
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig { retry_interval_secs: default_retry_interval_secs() }
    }
}

impl ResolverConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CloudConfig {
    /// A Nova compute endpoint and an already-issued token for it.
    Nova { compute_endpoint: String, token: String },
    /// An in-process simulated compute service.
    Simulated(SimConfig),
}

impl Config {
    /// Load a `Config` from the given TOML file
    ///
    /// This config object can then be used to create a new BMC server.
    pub fn from_file<P: AsRef<Utf8Path>>(path: P) -> Result<Config, LoadError> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config_parsed: Config = toml::from_str(&file_contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config_parsed)
    }

    /// Check the BMC credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_data.is_empty() {
            return Err(ConfigError::NoCredentials);
        }
        if let Some((user, _)) = self
            .auth_data
            .iter()
            .find(|(user, password)| user.is_empty() || password.is_empty())
        {
            return Err(ConfigError::EmptyCredential { user: user.clone() });
        }
        Ok(())
    }

    /// Pick the cloud profile to use.
    ///
    /// With no selector, the configuration must contain exactly one profile.
    pub fn cloud(
        &self,
        selector: Option<&str>,
    ) -> Result<(&str, &CloudConfig), ConfigError> {
        let (name, cloud) = match selector {
            Some(name) => self
                .clouds
                .get_key_value(name)
                .ok_or_else(|| ConfigError::UnknownCloud(name.to_string()))?,
            None => {
                let mut clouds = self.clouds.iter();
                match (clouds.next(), clouds.next()) {
                    (Some(only), None) => only,
                    (None, _) => return Err(ConfigError::NoClouds),
                    (Some(_), Some(_)) => {
                        return Err(ConfigError::AmbiguousCloud(
                            self.clouds.len(),
                        ))
                    }
                }
            }
        };

        if let CloudConfig::Nova { compute_endpoint, token } = cloud {
            for (field, value) in
                [("compute_endpoint", compute_endpoint), ("token", token)]
            {
                if value.is_empty() {
                    return Err(ConfigError::MissingField {
                        cloud: name.clone(),
                        field,
                    });
                }
            }
        }
        Ok((name.as_str(), cloud))
    }
}

/// Settings for one run of the BMC, fixed at process start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub auth_data: BTreeMap<String, String>,
    pub listen_address: IpAddr,
    pub listen_port: u16,
    /// Name or id of the managed instance, as given by the operator.
    pub instance_ref: String,
    pub cloud_selector: Option<String>,
    pub cache_enabled: bool,
}

impl Session {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\": {err}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\": {err}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no BMC credentials configured (auth_data is empty)")]
    NoCredentials,
    #[error("BMC credential for user \"{user}\" is incomplete")]
    EmptyCredential { user: String },
    #[error("no clouds configured")]
    NoClouds,
    #[error("cloud \"{0}\" is not configured")]
    UnknownCloud(String),
    #[error("{0} clouds are configured; select one with --os-cloud")]
    AmbiguousCloud(usize),
    #[error("cloud \"{cloud}\" is missing required field \"{field}\"")]
    MissingField { cloud: String, field: &'static str },
}
