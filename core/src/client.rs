//! Request dispatch and the endpoint catalogue for the pack service.
//!
//! # Design
//! `PackClient` holds an immutable `ClientConfig` and an injected
//! `Transport`. Every operation goes through the same three steps:
//! `build_request` produces an `HttpRequest`, the transport executes it once,
//! and `interpret` turns the `HttpResponse` into an `ApiResponse` envelope.
//! `build_request` and `interpret` are pure, so hosts that want to own the
//! I/O can call them directly and skip `dispatch`.
//!
//! Response interpretation order:
//! 1. an undecodable body is a `Deserialization` error;
//! 2. `401` with the service's invalid-key message is logged, then returned;
//! 3. `429` becomes `RateLimited` unless force-run is set; with force-run an
//!    undecodable 429 body is a plain `Service` error;
//! 4. anything else, including error envelopes, is returned as-is.

use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::codec::{read_upload, save_response, PayloadCodec, Saved};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{ApiResponse, DownloadKind, PackVisibility, PlayerList};

/// Sent as `User-Agent` on every request.
pub const USER_AGENT: &str = "rust/pack-api-client";
pub const API_KEY_HEADER: &str = "API-KEY";
/// The exact message the service uses when it rejects a key.
pub const INVALID_API_KEY_MESSAGE: &str = "API key missing or invalid!";

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Client for the pack distribution API.
#[derive(Debug, Clone)]
pub struct PackClient<T> {
    config: ClientConfig,
    transport: T,
}

#[cfg(feature = "ureq")]
impl PackClient<crate::transport::UreqTransport> {
    /// Build a client that talks to the network through ureq.
    pub fn with_ureq(config: ClientConfig) -> Self {
        Self::new(config, crate::transport::UreqTransport::new())
    }
}

impl<T> PackClient<T> {
    pub fn new(mut config: ClientConfig, transport: T) -> Self {
        let trimmed = config.base_url.trim_end_matches('/').len();
        config.base_url.truncate(trimmed);
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `{base_url}/{api_version}/{segments...}` with each segment escaped.
    pub fn api_url(&self, segments: &[&str]) -> String {
        let path = segments
            .iter()
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{path}", self.config.base_url, self.config.api_version)
    }

    /// Build the request envelope for one call.
    ///
    /// Fails with `MissingApiKey` when `requires_auth` is set and no key is
    /// configured. A payload is only attached to POST, PUT and DELETE.
    pub fn build_request(
        &self,
        requires_auth: bool,
        url: String,
        method: HttpMethod,
        payload: Option<&Value>,
    ) -> Result<HttpRequest, ApiError> {
        if requires_auth && !self.config.has_api_key() {
            error!(%method, %url, "An API key must be set in order to make this request!");
            return Err(ApiError::MissingApiKey);
        }

        let mut headers = vec![
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }

        let body = match payload {
            Some(payload) if method.carries_body() => {
                Some(serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?)
            }
            Some(_) => {
                trace!(%method, %url, "dropping payload on a request without body");
                None
            }
            None => None,
        };
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Decode a response envelope and apply the auth and rate-limit rules.
    pub fn interpret(&self, response: HttpResponse) -> Result<ApiResponse, ApiError> {
        let envelope: ApiResponse = match serde_json::from_str(&response.body) {
            Ok(envelope) => envelope,
            Err(e) if response.status == 429 => {
                return self.rate_limited(format!("HTTP 429 with undecodable body: {e}"), None)
            }
            Err(e) => {
                return Err(ApiError::Deserialization(format!("HTTP {}: {e}", response.status)));
            }
        };

        if envelope.error
            && envelope.code == Some(401)
            && envelope.message.as_deref() == Some(INVALID_API_KEY_MESSAGE)
        {
            error!("The API key provided was not valid!");
        }

        if envelope.code == Some(429) {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| "API request limit exceeded".to_string());
            return self.rate_limited(message, Some(envelope));
        }

        Ok(envelope)
    }

    fn rate_limited(&self, message: String, envelope: Option<ApiResponse>) -> Result<ApiResponse, ApiError> {
        if !self.config.force_run {
            error!(%message, "API request limit exceeded, stopping");
            return Err(ApiError::RateLimited { message });
        }
        warn!(%message, "API request limit exceeded, continuing because force-run is set");
        match envelope {
            Some(envelope) => Ok(envelope),
            // Nothing to forward, so report it like any other service error.
            None => Err(ApiError::Service {
                code: Some(429),
                message,
            }),
        }
    }
}

impl<T: Transport> PackClient<T> {
    /// Build, send and interpret one request. The transport is called at
    /// most once and never when the request cannot be built.
    pub fn dispatch(
        &self,
        requires_auth: bool,
        url: String,
        method: HttpMethod,
        payload: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request = self.build_request(requires_auth, url, method, payload)?;
        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.send(&request)?;
        debug!(status = response.status, "response received");
        self.interpret(response)
    }

    fn get(&self, requires_auth: bool, segments: &[&str]) -> Result<ApiResponse, ApiError> {
        self.dispatch(requires_auth, self.api_url(segments), HttpMethod::Get, None)
    }

    fn admin(&self, method: HttpMethod, segments: &[&str], payload: Option<&Value>) -> Result<ApiResponse, ApiError> {
        self.dispatch(true, self.api_url(segments), method, payload)
    }

    fn upload(&self, segments: &[&str], source: &Path, codec: PayloadCodec) -> Result<ApiResponse, ApiError> {
        let upload = read_upload(source, codec)?;
        let payload = serde_json::to_value(upload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.admin(HttpMethod::Put, segments, Some(&payload))
    }

    // -----------------------------------------------------------------------
    // Public endpoints
    // -----------------------------------------------------------------------

    /// Ping the service root. This is the only call without a version segment.
    pub fn heartbeat(&self) -> Result<ApiResponse, ApiError> {
        self.dispatch(false, format!("{}/", self.config.base_url), HttpMethod::Get, None)
    }

    /// Pack details, or a single version's details when `version` is given.
    pub fn pack(&self, name: &str, version: Option<&str>) -> Result<ApiResponse, ApiError> {
        match version {
            Some(version) => self.get(false, &["pack", name, version]),
            None => self.get(false, &["pack", name]),
        }
    }

    pub fn packs_simple(&self) -> Result<ApiResponse, ApiError> {
        self.get(false, &["packs", "simple"])
    }

    pub fn packs_full(&self, visibility: PackVisibility) -> Result<ApiResponse, ApiError> {
        self.get(false, &["packs", "full", visibility.as_segment()])
    }

    pub fn download_stats(&self, kind: DownloadKind) -> Result<ApiResponse, ApiError> {
        self.get(false, &["stats", "downloads", kind.as_segment()])
    }

    // -----------------------------------------------------------------------
    // Admin: packs and files
    // -----------------------------------------------------------------------

    pub fn admin_packs(&self) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "packs"])
    }

    pub fn admin_pack_info(&self, pack: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack])
    }

    /// Fetch a pack file; `data` holds the base64 encoded contents.
    pub fn pack_file(&self, pack: &str, folder: &str, filename: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "file", folder, filename])
    }

    pub fn save_pack_file(&self, pack: &str, folder: &str, filename: &str, dest: &Path) -> Result<Saved, ApiError> {
        save_response(self.pack_file(pack, folder, filename)?, dest, PayloadCodec::Base64)
    }

    /// Replace a pack file with the contents of `source`.
    pub fn put_pack_file(&self, pack: &str, folder: &str, filename: &str, source: &Path) -> Result<ApiResponse, ApiError> {
        self.upload(&["admin", "pack", pack, "file", folder, filename], source, PayloadCodec::Base64)
    }

    pub fn delete_pack_file(&self, pack: &str, folder: &str, filename: &str) -> Result<ApiResponse, ApiError> {
        self.admin(HttpMethod::Delete, &["admin", "pack", pack, "file", folder, filename], None)
    }

    pub fn pack_files(&self, pack: &str, folder: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "files", folder])
    }

    // -----------------------------------------------------------------------
    // Admin: versions
    // -----------------------------------------------------------------------

    pub fn version_info(&self, pack: &str, version: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "versions", version])
    }

    pub fn version_xml(&self, pack: &str, version: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "versions", version, "xml"])
    }

    pub fn save_version_xml(&self, pack: &str, version: &str, dest: &Path) -> Result<Saved, ApiError> {
        save_response(self.version_xml(pack, version)?, dest, PayloadCodec::Raw)
    }

    pub fn put_version_xml(&self, pack: &str, version: &str, source: &Path) -> Result<ApiResponse, ApiError> {
        self.upload(&["admin", "pack", pack, "versions", version, "xml"], source, PayloadCodec::Raw)
    }

    pub fn version_json(&self, pack: &str, version: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "versions", version, "json"])
    }

    pub fn save_version_json(&self, pack: &str, version: &str, dest: &Path) -> Result<Saved, ApiError> {
        save_response(self.version_json(pack, version)?, dest, PayloadCodec::Raw)
    }

    /// Fetch the configs archive; `data` holds the base64 encoded zip.
    pub fn version_configs(&self, pack: &str, version: &str) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "versions", version, "configs"])
    }

    pub fn save_version_configs(&self, pack: &str, version: &str, dest: &Path) -> Result<Saved, ApiError> {
        save_response(self.version_configs(pack, version)?, dest, PayloadCodec::Base64)
    }

    pub fn put_version_configs(&self, pack: &str, version: &str, source: &Path) -> Result<ApiResponse, ApiError> {
        self.upload(&["admin", "pack", pack, "versions", version, "configs"], source, PayloadCodec::Base64)
    }

    // -----------------------------------------------------------------------
    // Admin: allowed players and testers
    // -----------------------------------------------------------------------

    pub fn players(&self, pack: &str, list: PlayerList) -> Result<ApiResponse, ApiError> {
        self.get(true, &["admin", "pack", pack, "settings", list.as_segment()])
    }

    pub fn add_players(&self, pack: &str, list: PlayerList, usernames: &[impl AsRef<str>]) -> Result<ApiResponse, ApiError> {
        let payload = usernames_payload(usernames);
        self.admin(HttpMethod::Post, &["admin", "pack", pack, "settings", list.as_segment()], Some(&payload))
    }

    /// Remove usernames from a list. An empty slice is still sent as `[]`.
    pub fn remove_players(&self, pack: &str, list: PlayerList, usernames: &[impl AsRef<str>]) -> Result<ApiResponse, ApiError> {
        let payload = usernames_payload(usernames);
        self.admin(HttpMethod::Delete, &["admin", "pack", pack, "settings", list.as_segment()], Some(&payload))
    }
}

fn usernames_payload(usernames: &[impl AsRef<str>]) -> Value {
    Value::Array(
        usernames
            .iter()
            .map(|name| Value::String(name.as_ref().to_string()))
            .collect(),
    )
}
