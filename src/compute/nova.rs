// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`ComputeClient`] backed by an OpenStack Nova compute endpoint.

use super::ComputeClient;
use super::ServerRecord;
use crate::error::ComputeError;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::o;
use slog::Logger;
use std::collections::BTreeMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Nova client authenticating with a pre-issued token.
///
/// Acquiring the token is somebody else's job; we only present it on every
/// request in the `X-Auth-Token` header.
#[derive(Debug)]
pub struct NovaClient {
    base_url: Url,
    token: String,
    client: reqwest::Client,
    log: Logger,
}

#[derive(Deserialize)]
struct ServerBody {
    server: ServerRecord,
}

#[derive(Deserialize)]
struct ServersBody {
    servers: Vec<ServerRecord>,
}

#[derive(Deserialize)]
struct MetadataBody {
    metadata: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct MetaItemBody<'a> {
    meta: BTreeMap<&'a str, &'a str>,
}

#[derive(Clone, Copy, Debug)]
enum ServerAction {
    Start,
    Stop,
}

impl ServerAction {
    fn body(self) -> serde_json::Value {
        let key = match self {
            ServerAction::Start => "os-start",
            ServerAction::Stop => "os-stop",
        };
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), serde_json::Value::Null);
        serde_json::Value::Object(body)
    }
}

impl NovaClient {
    pub fn new(
        endpoint: &str,
        token: &str,
        log: &Logger,
    ) -> Result<Self, ComputeError> {
        let base_url = Url::parse(endpoint).map_err(|err| {
            ComputeError::Other(format!(
                "invalid compute endpoint \"{endpoint}\": {err}"
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ComputeError::Other(format!(
                "compute endpoint \"{endpoint}\" cannot be used as a base URL"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                ComputeError::Other(format!("building HTTP client: {err}"))
            })?;
        let log = log.new(o!(
            "component" => "NovaClient",
            "endpoint" => base_url.to_string(),
        ));
        Ok(NovaClient { base_url, token: token.to_string(), client, log })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, ComputeError> {
        debug!(self.log, "client request"; "op" => what);
        let response = request
            .header("X-Auth-Token", &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| classify_transport(what, &err))?;

        let status = response.status();
        debug!(self.log, "client response"; "op" => what, "status" => %status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, format!("{what}: {status}: {body}")))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ComputeError> {
        response.json::<T>().await.map_err(|err| {
            ComputeError::Other(format!("{what}: parsing response: {err}"))
        })
    }

    async fn action(
        &self,
        id: &str,
        action: ServerAction,
    ) -> Result<(), ComputeError> {
        let url = self.url(&["servers", id, "action"]);
        let what = format!("{action:?} server {id}");
        self.send(self.client.post(url).json(&action.body()), &what).await?;
        Ok(())
    }
}

/// Sort an HTTP error status into the compute error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    message: String,
) -> ComputeError {
    match status {
        StatusCode::NOT_FOUND => ComputeError::NotFound(message),
        StatusCode::CONFLICT => ComputeError::Conflict(message),
        StatusCode::UNAUTHORIZED
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => ComputeError::Transient(message),
        s if s.is_server_error() => ComputeError::Transient(message),
        _ => ComputeError::Other(message),
    }
}

fn classify_transport(what: &str, err: &reqwest::Error) -> ComputeError {
    let message = format!("{what}: {err}");
    if err.is_builder() {
        ComputeError::Other(message)
    } else {
        ComputeError::Transient(message)
    }
}

#[async_trait]
impl ComputeClient for NovaClient {
    async fn get_by_id(&self, id: &str) -> Result<ServerRecord, ComputeError> {
        let what = format!("get server {id}");
        let request = self.client.get(self.url(&["servers", id]));
        let response = self.send(request, &what).await?;
        let body: ServerBody = Self::read_json(response, &what).await?;
        Ok(body.server)
    }

    async fn list_by_name(
        &self,
        name: &str,
    ) -> Result<Vec<ServerRecord>, ComputeError> {
        let what = format!("list servers named {name}");
        let request = self
            .client
            .get(self.url(&["servers", "detail"]))
            .query(&[("name", name)]);
        let response = self.send(request, &what).await?;
        let body: ServersBody = Self::read_json(response, &what).await?;
        // Nova treats the name filter as a pattern; only exact names count.
        Ok(body.servers.into_iter().filter(|s| s.name == name).collect())
    }

    async fn stop(&self, id: &str) -> Result<(), ComputeError> {
        self.action(id, ServerAction::Stop).await
    }

    async fn start(&self, id: &str) -> Result<(), ComputeError> {
        self.action(id, ServerAction::Start).await
    }

    async fn get_metadata(
        &self,
        id: &str,
    ) -> Result<BTreeMap<String, String>, ComputeError> {
        let what = format!("get metadata of server {id}");
        let request = self.client.get(self.url(&["servers", id, "metadata"]));
        let response = self.send(request, &what).await?;
        let body: MetadataBody = Self::read_json(response, &what).await?;
        Ok(body.metadata)
    }

    async fn set_metadata_item(
        &self,
        id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ComputeError> {
        let what = format!("set metadata {key} of server {id}");
        let body = MetaItemBody { meta: BTreeMap::from([(key, value)]) };
        let request = self
            .client
            .put(self.url(&["servers", id, "metadata", key]))
            .json(&body);
        self.send(request, &what).await?;
        Ok(())
    }
}
