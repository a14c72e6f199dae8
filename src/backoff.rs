// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Module providing utilities for retrying operations with backoff.

use std::time::Duration;

pub use ::backoff::backoff::Constant;
pub use ::backoff::future::retry_notify;
pub use ::backoff::Error as BackoffError;

/// Return a backoff policy for startup lookups against a compute service that
/// may not be reachable yet: retry at a fixed interval, indefinitely.
pub fn startup_lookup_policy(interval: Duration) -> Constant {
    Constant::new(interval)
}
