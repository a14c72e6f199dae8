// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::bmc::BmcHandler;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared state used by API request handlers
pub struct ServerContext {
    pub bmc: Arc<dyn BmcHandler>,
    /// Credentials clients must present, keyed by user name.
    auth_data: BTreeMap<String, String>,
    pub log: Logger,
}

impl ServerContext {
    pub fn new(
        bmc: Arc<dyn BmcHandler>,
        auth_data: BTreeMap<String, String>,
        log: &Logger,
    ) -> Arc<Self> {
        Arc::new(ServerContext { bmc, auth_data, log: log.clone() })
    }

    pub fn credentials_match(&self, user: &str, password: &str) -> bool {
        self.auth_data.get(user).is_some_and(|expected| expected == password)
    }
}
