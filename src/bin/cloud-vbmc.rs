// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Executable program to run a virtual BMC for one cloud compute instance

use anyhow::anyhow;
use camino::Utf8PathBuf;
use clap::Parser;
use cloud_vbmc::cmd::fatal;
use cloud_vbmc::cmd::CmdError;
use cloud_vbmc::run_openapi;
use cloud_vbmc::run_server;
use cloud_vbmc::Config;
use cloud_vbmc::Session;
use std::net::IpAddr;

#[derive(Debug, Parser)]
#[clap(
    name = "cloud-vbmc",
    about = "Virtual BMC for power and boot-device control of a cloud instance"
)]
struct Args {
    #[clap(
        short = 'O',
        long = "openapi",
        help = "Print the external OpenAPI Spec document and exit",
        action
    )]
    openapi: bool,

    #[clap(
        name = "CONFIG_FILE_PATH",
        action,
        required_unless_present = "openapi"
    )]
    config_file_path: Option<Utf8PathBuf>,

    /// Port to listen on
    #[clap(long, default_value_t = 623)]
    port: u16,

    /// Address to listen on
    #[clap(long, default_value = "::")]
    address: IpAddr,

    /// Name or id of the instance to manage
    #[clap(long, required_unless_present = "openapi")]
    instance: Option<String>,

    /// Cloud profile from the config file to use
    #[clap(long = "os-cloud", env = "OS_CLOUD")]
    os_cloud: Option<String>,

    /// Trust the last observed power state once it matches the last
    /// requested one, instead of querying the compute service every time
    #[clap(long = "cache-status", action)]
    cache_status: bool,
}

#[tokio::main]
async fn main() {
    if let Err(cmd_error) = do_run().await {
        fatal(cmd_error);
    }
}

async fn do_run() -> Result<(), CmdError> {
    let args = Args::parse();

    if args.openapi {
        return run_openapi().map_err(|e| CmdError::Failure(anyhow!(e)));
    }

    let (Some(config_file_path), Some(instance_ref)) =
        (args.config_file_path, args.instance)
    else {
        return Err(CmdError::Usage(
            "CONFIG_FILE_PATH and --instance are required".to_string(),
        ));
    };
    let config = Config::from_file(&config_file_path)
        .map_err(|e| CmdError::Failure(e.into()))?;

    let session = Session {
        auth_data: config.auth_data.clone(),
        listen_address: args.address,
        listen_port: args.port,
        instance_ref,
        cloud_selector: args.os_cloud,
        cache_enabled: args.cache_status,
    };
    run_server(config, session).await.map_err(|e| CmdError::Failure(e.into()))
}
