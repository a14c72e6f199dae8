// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated compute service
//!
//! Power transitions do not land immediately: a requested start or stop stays
//! pending for a configurable number of status polls, and further transition
//! requests against a pending or already-settled server fail with a conflict,
//! the way a real compute service behaves. Every operation is counted and can
//! have failures queued ahead of it, which is what the test suites use to
//! observe how often (and whether) the remote service is consulted.

use crate::compute::ComputeClient;
use crate::compute::ServerRecord;
use crate::compute::ServerStatus;
use crate::error::ComputeError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Configuration of a simulated cloud profile.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SimConfig {
    /// Number of status polls that still observe the old power state after
    /// a transition was requested.
    #[serde(default = "default_settle_after_polls")]
    pub settle_after_polls: u32,
    pub servers: Vec<ServerRecord>,
}

fn default_settle_after_polls() -> u32 {
    1
}

/// Compute operations, for fault injection and call accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimOp {
    GetById,
    ListByName,
    Stop,
    Start,
    GetMetadata,
    SetMetadataItem,
}

#[derive(Debug)]
struct PendingTransition {
    target: ServerStatus,
    polls_remaining: u32,
}

#[derive(Debug)]
struct SimServer {
    record: ServerRecord,
    pending: Option<PendingTransition>,
}

#[derive(Debug, Default)]
struct SimState {
    servers: BTreeMap<String, SimServer>,
    faults: BTreeMap<SimOp, VecDeque<ComputeError>>,
    calls: BTreeMap<SimOp, usize>,
}

impl SimState {
    /// Record a call to `op`, returning the next injected failure if any.
    fn begin(&mut self, op: SimOp) -> Result<(), ComputeError> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn server_mut(&mut self, id: &str) -> Result<&mut SimServer, ComputeError> {
        self.servers.get_mut(id).ok_or_else(|| {
            ComputeError::NotFound(format!("no server with id {id}"))
        })
    }
}

#[derive(Debug)]
pub struct SimCompute {
    log: Logger,
    settle_after_polls: u32,
    state: Mutex<SimState>,
}

impl SimCompute {
    pub fn new(config: &SimConfig, log: &Logger) -> Self {
        let servers = config
            .servers
            .iter()
            .map(|record| {
                (
                    record.id.clone(),
                    SimServer { record: record.clone(), pending: None },
                )
            })
            .collect();
        let log = log.new(o!("component" => "SimCompute"));
        info!(log, "simulated compute service";
            "servers" => config.servers.len(),
            "settle_after_polls" => config.settle_after_polls,
        );
        SimCompute {
            log,
            settle_after_polls: config.settle_after_polls,
            state: Mutex::new(SimState { servers, ..Default::default() }),
        }
    }

    /// Make the next call to `op` fail with `err`. Failures queue up in
    /// the order they were injected.
    pub fn inject_fault(&self, op: SimOp, err: ComputeError) {
        let mut state = self.state.lock().unwrap();
        state.faults.entry(op).or_default().push_back(err);
    }

    /// Number of calls made to `op` so far, including failed ones.
    pub fn call_count(&self, op: SimOp) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.values().sum()
    }

    /// Current state of a server, without settling pending transitions or
    /// counting as a call.
    pub fn server(&self, id: &str) -> Option<ServerRecord> {
        let state = self.state.lock().unwrap();
        state.servers.get(id).map(|s| s.record.clone())
    }

    fn transition(
        &self,
        op: SimOp,
        id: &str,
        target: ServerStatus,
    ) -> Result<(), ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.begin(op)?;
        let server = state.server_mut(id)?;
        if let Some(pending) = &server.pending {
            return Err(ComputeError::Conflict(format!(
                "server {id} is already transitioning to {}",
                pending.target
            )));
        }
        if server.record.status == target {
            return Err(ComputeError::Conflict(format!(
                "server {id} is already {target}"
            )));
        }
        debug!(self.log, "transition requested";
            "id" => id,
            "target" => %target,
        );
        server.pending = Some(PendingTransition {
            target,
            polls_remaining: self.settle_after_polls,
        });
        Ok(())
    }
}

#[async_trait]
impl ComputeClient for SimCompute {
    async fn get_by_id(&self, id: &str) -> Result<ServerRecord, ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.begin(SimOp::GetById)?;
        let server = state.server_mut(id)?;
        let landed = match &mut server.pending {
            Some(pending) if pending.polls_remaining == 0 => true,
            Some(pending) => {
                pending.polls_remaining -= 1;
                false
            }
            None => false,
        };
        if landed {
            if let Some(pending) = server.pending.take() {
                server.record.status = pending.target;
                debug!(self.log, "transition landed";
                    "id" => id,
                    "status" => %server.record.status,
                );
            }
        }
        Ok(server.record.clone())
    }

    async fn list_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<ServerRecord>, ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.begin(SimOp::ListByName)?;
        Ok(state
            .servers
            .values()
            .filter(|s| s.record.name == name)
            .map(|s| s.record.clone())
            .collect())
    }

    async fn stop(&self, id: &str) -> Result<(), ComputeError> {
        self.transition(SimOp::Stop, id, ServerStatus::Shutoff)
    }

    async fn start(&self, id: &str) -> Result<(), ComputeError> {
        self.transition(SimOp::Start, id, ServerStatus::Active)
    }

    async fn get_metadata(
        &self,
        id: &str,
    ) -> Result<BTreeMap<String, String>, ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.begin(SimOp::GetMetadata)?;
        Ok(state.server_mut(id)?.record.metadata.clone())
    }

    async fn set_metadata_item(
        &self,
        id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.begin(SimOp::SetMetadataItem)?;
        state
            .server_mut(id)?
            .record
            .metadata
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
