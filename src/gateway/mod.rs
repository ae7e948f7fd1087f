use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::ApiOptions;
use crate::note::{ModalMode, Note};

#[cfg(test)]
pub(crate) mod memory;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("cannot {mode} a note without an id")]
    MissingId { mode: ModalMode },
    #[error("cannot build a request url from {base}")]
    InvalidUrl { base: String },
}

/// Boundary to the notes API. Every call answers with the full collection.
pub trait NoteGateway {
    fn execute(&self, mode: Option<ModalMode>, payload: Option<&Note>)
        -> Result<Vec<Note>, GatewayError>;

    fn list(&self) -> Result<Vec<Note>, GatewayError> {
        self.execute(None, None)
    }
}

/// Unencoded path segments; the HTTP gateway percent-encodes each one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub segments: Vec<String>,
    pub send_body: bool,
}

impl Route {
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Maps a mode to the verb and path under the tenant's note collection.
pub fn route_for(
    company_id: &str,
    mode: Option<ModalMode>,
    payload: Option<&Note>,
) -> Result<Route, GatewayError> {
    let collection = || {
        vec![
            "api".to_string(),
            "company".to_string(),
            company_id.to_string(),
            "note".to_string(),
        ]
    };
    let route = match mode {
        None => Route {
            method: Method::GET,
            segments: collection(),
            send_body: false,
        },
        Some(ModalMode::Create) => Route {
            method: Method::POST,
            segments: collection(),
            send_body: true,
        },
        Some(ModalMode::Edit) => Route {
            method: Method::PATCH,
            segments: member_segments(collection(), ModalMode::Edit, payload)?,
            send_body: true,
        },
        Some(ModalMode::Delete) => Route {
            method: Method::DELETE,
            segments: member_segments(collection(), ModalMode::Delete, payload)?,
            send_body: false,
        },
    };
    Ok(route)
}

fn member_segments(
    mut segments: Vec<String>,
    mode: ModalMode,
    payload: Option<&Note>,
) -> Result<Vec<String>, GatewayError> {
    let id = payload
        .and_then(Note::id)
        .ok_or(GatewayError::MissingId { mode })?;
    segments.push(id.to_string());
    Ok(segments)
}

pub struct HttpGateway {
    client: Client,
    base_url: Url,
    company_id: String,
}

impl HttpGateway {
    pub fn new(options: &ApiOptions) -> Result<Self> {
        let base_url = Url::parse(&options.base_url)
            .with_context(|| format!("parsing api base url {}", options.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("api base url {} cannot carry a path", options.base_url);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .user_agent(concat!("company-notes/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            base_url,
            company_id: options.company_id.clone(),
        })
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    fn endpoint(&self, route: &Route) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl {
                base: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(&route.segments);
        Ok(url)
    }
}

impl NoteGateway for HttpGateway {
    fn execute(
        &self,
        mode: Option<ModalMode>,
        payload: Option<&Note>,
    ) -> Result<Vec<Note>, GatewayError> {
        let route = route_for(&self.company_id, mode, payload)?;
        let url = self.endpoint(&route)?;
        tracing::debug!(method = %route.method, %url, "notes api request");

        let mut request = self.client.request(route.method.clone(), url);
        if route.send_body {
            if let Some(note) = payload {
                request = request.json(note);
            }
        }
        let response = request.send()?;
        decode_collection(response)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn decode_collection(response: Response) -> Result<Vec<Note>, GatewayError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }
    Ok(serde_json::from_str(&body)?)
}

fn status_error(status: StatusCode, body: &str) -> GatewayError {
    let server_message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message.or(parsed.error))
        .filter(|message| !message.trim().is_empty());
    let message = server_message
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
    GatewayError::Status {
        status: status.as_u16(),
        message,
    }
}
