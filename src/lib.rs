// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Virtual BMC exposing power and boot-device control of one cloud compute
//! instance.

mod backoff;
mod config;
mod context;

pub mod bmc;
pub mod boot;
pub mod cmd;
pub mod compute;
pub mod error;
pub mod http_entrypoints;
pub mod power;
pub mod resolver;
pub mod sim;

pub use config::CloudConfig;
pub use config::Config;
pub use config::ConfigError;
pub use config::LoadError;
pub use config::ResolverConfig;
pub use config::Session;
pub use context::ServerContext;

use bmc::BmcHandler;
use bmc::VirtualBmc;
use compute::ComputeClient;
use compute::NovaClient;
use dropshot::ConfigDropshot;
use error::ComputeError;
use error::StartupError;
use resolver::InstanceResolver;
use sim::SimCompute;
use slog::error;
use slog::info;
use slog::o;
use slog::Logger;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Run the OpenAPI generator for the API; which emits the OpenAPI spec
/// to stdout.
pub fn run_openapi() -> Result<(), String> {
    http_entrypoints::api()
        .openapi("Virtual BMC API", "0.1.0")
        .description(
            "Power and boot-device control of a single cloud compute instance",
        )
        .write(&mut std::io::stdout())
        .map_err(|e| e.to_string())
}

type HttpServer = dropshot::HttpServer<Arc<ServerContext>>;

pub struct Server {
    http_server: HttpServer,
}

impl Server {
    /// Start serving `bmc` on the session's listen address.
    pub async fn start(
        session: &Session,
        bmc: Arc<dyn BmcHandler>,
        log: &Logger,
    ) -> Result<Server, String> {
        let apictx = ServerContext::new(bmc, session.auth_data.clone(), log);
        let dropshot = ConfigDropshot {
            bind_address: session.bind_address(),
            ..Default::default()
        };
        let http_server_starter = dropshot::HttpServerStarter::new(
            &dropshot,
            http_entrypoints::api(),
            apictx,
            &log.new(o!("component" => "dropshot")),
        )
        .map_err(|error| format!("initializing http server: {}", error))?;

        let http_server = http_server_starter.start();
        info!(log, "listening"; "address" => %http_server.local_addr());
        Ok(Server { http_server })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.http_server.local_addr()
    }

    /// Wait for the server to shut down
    ///
    /// Note that this doesn't initiate a graceful shutdown, so if you call this
    /// immediately after calling `start()`, the program will block indefinitely
    /// or until something else initiates a graceful shutdown.
    pub async fn wait_for_finish(&self) -> Result<(), String> {
        self.http_server.wait_for_shutdown().await
    }

    /// Serve until the server stops on its own, or shut it down gracefully
    /// once `interrupt` resolves successfully.
    ///
    /// If `interrupt` fails (e.g., no signal handler could be installed), we
    /// keep serving.
    pub async fn run_until<F>(
        self,
        interrupt: F,
        log: &Logger,
    ) -> Result<(), String>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::select! {
            result = self.wait_for_finish() => return result,
            signal = interrupt => match signal {
                Ok(()) => info!(log, "received interrupt, shutting down"),
                Err(err) => {
                    error!(log, "cannot listen for interrupts";
                        "error" => %err,
                    );
                    return self.wait_for_finish().await;
                }
            },
        }
        self.close().await
    }

    /// Initiate a graceful shutdown and wait for it to complete.
    pub async fn close(self) -> Result<(), String> {
        self.http_server.close().await
    }
}

/// Construct the compute client for a cloud profile.
pub fn compute_client(
    cloud: &CloudConfig,
    log: &Logger,
) -> Result<Arc<dyn ComputeClient>, ComputeError> {
    let client: Arc<dyn ComputeClient> = match cloud {
        CloudConfig::Nova { compute_endpoint, token } => {
            Arc::new(NovaClient::new(compute_endpoint, token, log)?)
        }
        CloudConfig::Simulated(sim) => Arc::new(SimCompute::new(sim, log)),
    };
    Ok(client)
}

/// Resolve the session's instance and build the BMC for it.
///
/// Blocks until the instance reference resolves; fails only if it never can.
pub async fn bind_instance(
    config: &Config,
    session: &Session,
    compute: Arc<dyn ComputeClient>,
    log: &Logger,
) -> Result<VirtualBmc, StartupError> {
    let resolver = InstanceResolver::new(
        Arc::clone(&compute),
        config.resolver.retry_interval(),
        log,
    );
    let instance = resolver.resolve(&session.instance_ref).await?;
    Ok(VirtualBmc::new(compute, instance, session.cache_enabled, log))
}

/// Run an instance of the [Server].
pub async fn run_server(
    config: Config,
    session: Session,
) -> Result<(), StartupError> {
    let log =
        config.log.to_logger("cloud-vbmc").map_err(StartupError::Logger)?;

    config.validate()?;
    let (cloud_name, cloud) =
        config.cloud(session.cloud_selector.as_deref())?;
    let log = log.new(o!("cloud" => cloud_name.to_string()));
    info!(log, "starting virtual BMC";
        "instance_ref" => &session.instance_ref,
        "cache_status" => session.cache_enabled,
    );

    let compute = compute_client(cloud, &log)?;
    let bmc = bind_instance(&config, &session, compute, &log).await?;
    let server = Server::start(&session, Arc::new(bmc), &log)
        .await
        .map_err(StartupError::Server)?;

    server
        .run_until(tokio::signal::ctrl_c(), &log)
        .await
        .map_err(StartupError::Server)
}
