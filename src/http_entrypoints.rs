// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP entrypoint functions for the virtual BMC
//!
//! Each endpoint authenticates the caller against the configured BMC
//! credentials and then invokes exactly one [`crate::bmc::BmcHandler`]
//! operation.

use crate::boot::BootDevice;
use crate::ServerContext;
use base64::Engine;
use dropshot::endpoint;
use dropshot::ApiDescription;
use dropshot::HttpError;
use dropshot::HttpResponseOk;
use dropshot::HttpResponseUpdatedNoContent;
use dropshot::RequestContext;
use dropshot::TypedBody;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::warn;
use std::sync::Arc;

type BmcApiDescription = ApiDescription<Arc<ServerContext>>;

/// Returns a description of the BMC API
pub fn api() -> BmcApiDescription {
    fn register_endpoints(api: &mut BmcApiDescription) -> Result<(), String> {
        api.register(bmc_power_get).map_err(|e| e.to_string())?;
        api.register(bmc_power_on).map_err(|e| e.to_string())?;
        api.register(bmc_power_off).map_err(|e| e.to_string())?;
        api.register(bmc_boot_device_get).map_err(|e| e.to_string())?;
        api.register(bmc_boot_device_put).map_err(|e| e.to_string())?;
        Ok(())
    }

    let mut api = BmcApiDescription::new();
    if let Err(err) = register_endpoints(&mut api) {
        panic!("failed to register entrypoints: {}", err);
    }
    api
}

/// Power state of the managed instance
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema)]
pub struct PowerState {
    pub powered_on: bool,
}

/// Boot device selection of the managed instance
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema)]
pub struct BootDeviceSelection {
    pub device: BootDevice,
}

/// Parse an `Authorization: Basic ...` header value into user and password.
fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded =
        base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn authorize(
    rqctx: &RequestContext<Arc<ServerContext>>,
) -> Result<(), HttpError> {
    let apictx = rqctx.context();
    let credentials = rqctx
        .request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth);

    match credentials {
        Some((user, password))
            if apictx.credentials_match(&user, &password) =>
        {
            Ok(())
        }
        Some((user, _)) => {
            warn!(apictx.log, "rejected credentials"; "user" => user);
            Err(unauthorized())
        }
        None => Err(unauthorized()),
    }
}

fn unauthorized() -> HttpError {
    HttpError::for_client_error(
        Some("Unauthorized".to_string()),
        http::StatusCode::UNAUTHORIZED,
        "missing or invalid BMC credentials".to_string(),
    )
}

/// Fetch the power state
#[endpoint {
    method = GET,
    path = "/power",
}]
async fn bmc_power_get(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseOk<PowerState>, HttpError> {
    authorize(&rqctx)?;
    let apictx = rqctx.context();
    let powered_on = apictx.bmc.power_state().await?;
    Ok(HttpResponseOk(PowerState { powered_on }))
}

/// Power on the instance
///
/// Succeeds without doing anything if the instance is already on, or if a
/// transition is already in progress.
#[endpoint {
    method = POST,
    path = "/power/on",
}]
async fn bmc_power_on(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseUpdatedNoContent, HttpError> {
    authorize(&rqctx)?;
    rqctx.context().bmc.power_on().await?;
    Ok(HttpResponseUpdatedNoContent())
}

/// Power off the instance
#[endpoint {
    method = POST,
    path = "/power/off",
}]
async fn bmc_power_off(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseUpdatedNoContent, HttpError> {
    authorize(&rqctx)?;
    rqctx.context().bmc.power_off().await?;
    Ok(HttpResponseUpdatedNoContent())
}

/// Fetch the boot device
#[endpoint {
    method = GET,
    path = "/boot-device",
}]
async fn bmc_boot_device_get(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseOk<BootDeviceSelection>, HttpError> {
    authorize(&rqctx)?;
    let device = rqctx.context().bmc.boot_device().await?;
    Ok(HttpResponseOk(BootDeviceSelection { device }))
}

/// Select the boot device used on the next boot
#[endpoint {
    method = PUT,
    path = "/boot-device",
}]
async fn bmc_boot_device_put(
    rqctx: RequestContext<Arc<ServerContext>>,
    body: TypedBody<BootDeviceSelection>,
) -> Result<HttpResponseUpdatedNoContent, HttpError> {
    authorize(&rqctx)?;
    let BootDeviceSelection { device } = body.into_inner();
    rqctx.context().bmc.set_boot_device(device).await?;
    Ok(HttpResponseUpdatedNoContent())
}
