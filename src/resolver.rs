// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of the configured instance reference to a stable id
//!
//! The operator may name the managed instance either by id or by name. We
//! try the id interpretation first, fall back to an exact name lookup when the
//! compute service says no such id exists, and refuse to start at all when
//! the name matches nothing or more than one instance. Any other lookup
//! failure is assumed to be the compute service not being reachable yet and
//! is retried at a fixed interval until it goes away.

use crate::backoff::retry_notify;
use crate::backoff::startup_lookup_policy;
use crate::backoff::BackoffError;
use crate::compute::ComputeClient;
use crate::error::ResolveError;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;

/// The instance this BMC is bound to for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedInstance {
    pub id: String,
    pub name: String,
}

pub struct InstanceResolver {
    compute: Arc<dyn ComputeClient>,
    retry_interval: Duration,
    log: Logger,
}

impl InstanceResolver {
    pub fn new(
        compute: Arc<dyn ComputeClient>,
        retry_interval: Duration,
        log: &Logger,
    ) -> Self {
        let log = log.new(o!("component" => "InstanceResolver"));
        InstanceResolver { compute, retry_interval, log }
    }

    /// Resolve `reference` to an instance id.
    ///
    /// Only returns an error for references that cannot be resolved no matter
    /// how often we ask: no match, or an ambiguous name. Those are meant to
    /// stop the process before it starts serving.
    pub async fn resolve(
        &self,
        reference: &str,
    ) -> Result<ResolvedInstance, ResolveError> {
        let policy = startup_lookup_policy(self.retry_interval);
        let notify = |err: ResolveError, delay: Duration| {
            let err = match err {
                ResolveError::Lookup { err, .. } => err.to_string(),
                other => other.to_string(),
            };
            warn!(
                self.log,
                "Exception finding instance \"{}\": {}", reference, err;
                "retry_in" => ?delay,
            );
        };

        match retry_notify(policy, || self.attempt(reference), notify).await {
            Ok(instance) => {
                info!(
                    self.log,
                    "Managing instance: {} UUID: {}", instance.name, instance.id
                );
                Ok(instance)
            }
            Err(err) => {
                error!(self.log, "cannot resolve instance"; "error" => %err);
                Err(err)
            }
        }
    }

    async fn attempt(
        &self,
        reference: &str,
    ) -> Result<ResolvedInstance, BackoffError<ResolveError>> {
        let lookup_failed = |err| {
            BackoffError::transient(ResolveError::Lookup {
                reference: reference.to_string(),
                err,
            })
        };

        match self.compute.get_by_id(reference).await {
            Ok(record) => {
                return Ok(ResolvedInstance {
                    id: reference.to_string(),
                    name: record.name,
                });
            }
            Err(err) if err.is_not_found() => (),
            Err(err) => return Err(lookup_failed(err)),
        }

        let mut matches =
            self.compute.list_by_name(reference).await.map_err(lookup_failed)?;
        match matches.len() {
            0 => Err(BackoffError::permanent(ResolveError::Absent {
                reference: reference.to_string(),
            })),
            1 => {
                let record = matches.remove(0);
                Ok(ResolvedInstance { id: record.id, name: record.name })
            }
            count => Err(BackoffError::permanent(ResolveError::Ambiguous {
                reference: reference.to_string(),
                count,
            })),
        }
    }
}
