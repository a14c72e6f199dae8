// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use camino::Utf8Path;
use cloud_vbmc::bind_instance;
use cloud_vbmc::resolver::ResolvedInstance;
use cloud_vbmc::sim::SimCompute;
use cloud_vbmc::CloudConfig;
use cloud_vbmc::Config;
use cloud_vbmc::Server;
use cloud_vbmc::Session;
use slog::o;
use slog::Logger;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "password";

pub const SHUTOFF_ID: &str = "0f4e7c1a-3b59-4c8e-9a51-6d2b8f0e9c11";
pub const SHUTOFF_NAME: &str = "baremetal-0";
pub const ACTIVE_ID: &str = "7d1b2e60-54a3-4f2b-8c3d-1e9a0b7c5f22";

pub struct TestContext {
    pub client: reqwest::Client,
    pub server: Server,
    pub sim: Arc<SimCompute>,
    pub instance: ResolvedInstance,
}

impl TestContext {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.server.local_addr(), path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).basic_auth(USER, Some(PASSWORD))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).basic_auth(USER, Some(PASSWORD))
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).basic_auth(USER, Some(PASSWORD))
    }

    pub async fn teardown(self) {
        self.server.close().await.unwrap();
    }
}

pub fn load_test_config() -> Config {
    let path = Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("configs/config.test.toml");
    Config::from_file(&path).unwrap()
}

/// Start a BMC for `instance_ref` on an ephemeral localhost port, backed by
/// the simulated cloud from the test config.
pub async fn test_setup(
    instance_ref: &str,
    cache_enabled: bool,
) -> TestContext {
    let config = load_test_config();
    let log = Logger::root(slog::Discard, o!());

    let (_, cloud) = config.cloud(None).unwrap();
    let CloudConfig::Simulated(sim_config) = cloud else {
        panic!("test config must use a simulated cloud");
    };
    let sim = Arc::new(SimCompute::new(sim_config, &log));

    let session = Session {
        auth_data: config.auth_data.clone(),
        listen_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        listen_port: 0,
        instance_ref: instance_ref.to_string(),
        cloud_selector: None,
        cache_enabled,
    };
    let bmc =
        bind_instance(&config, &session, sim.clone(), &log).await.unwrap();
    let instance = bmc.instance().clone();
    let server = Server::start(&session, Arc::new(bmc), &log).await.unwrap();

    TestContext { client: reqwest::Client::new(), server, sim, instance }
}
