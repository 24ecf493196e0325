//! Blocking client for the pack distribution API.
//!
//! # Overview
//! Exposes the service's public endpoints (pack details, pack listings,
//! download statistics) and its admin endpoints (pack files, version
//! XML/JSON/configs, allowed players and testers) as methods on
//! `PackClient`. Each method issues exactly one request through an injected
//! `Transport` and returns the decoded response envelope.
//!
//! # Design
//! - `PackClient` holds an immutable `ClientConfig` (API key, force-run flag,
//!   base URL). Build several clients to talk with different keys.
//! - `build_request` / `interpret` are pure; `dispatch` glues them to the
//!   transport. Hosts that own their I/O can use the pure halves directly.
//! - A `429` from the service is `ApiError::RateLimited`, the one error for
//!   which `is_fatal()` holds, unless force-run is enabled.
//! - File payloads go through `PayloadCodec`: base64 for binary fields, raw
//!   text for XML and JSON.
//!
//! Any `Transport` works; with the default `ureq` feature,
//! `PackClient::with_ureq(ClientConfig::from_env())` talks to the live service.
//!
//! ```
//! use pack_api::{ClientConfig, HttpRequest, HttpResponse, PackClient, Transport, TransportError};
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
//!         Ok(HttpResponse::new(200, r#"{"error":false,"code":200,"data":{"name":"Foo"}}"#))
//!     }
//! }
//!
//! # fn main() -> Result<(), pack_api::ApiError> {
//! let client = PackClient::new(ClientConfig::new().with_api_key("ABC"), Canned);
//! let pack = client.pack("Foo", None)?.into_data()?;
//! assert_eq!(pack["name"], "Foo");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use client::{PackClient, API_KEY_HEADER, INVALID_API_KEY_MESSAGE, USER_AGENT};
pub use codec::{read_upload, save_response, PayloadCodec, Saved};
pub use config::ClientConfig;
pub use error::{ApiError, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{ApiResponse, DownloadKind, FileUpload, PackVisibility, PlayerList};
