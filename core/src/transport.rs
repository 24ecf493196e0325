//! The seam between `PackClient` and the network.
//!
//! # Design
//! `Transport` is the only collaborator the dispatcher talks to. It moves one
//! request and hands back one response, or a `TransportError` when nothing
//! came back. HTTP status codes are data here: the service reports failures
//! inside the envelope, so a 4xx/5xx response must still reach `interpret`.

use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes a single HTTP request.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

#[cfg(feature = "ureq")]
pub use self::ureq_transport::UreqTransport;

#[cfg(feature = "ureq")]
mod ureq_transport {
    use std::time::Duration;

    use tracing::trace;
    use ureq::typestate::WithBody;
    use ureq::{Agent, Body, RequestBuilder};

    use super::Transport;
    use crate::error::TransportError;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// Blocking transport backed by a shared `ureq::Agent`.
    #[derive(Debug, Clone)]
    pub struct UreqTransport {
        agent: Agent,
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UreqTransport {
        pub fn new() -> Self {
            Self::with_timeout(None)
        }

        /// Bound the whole round-trip, connect through body read.
        pub fn with_timeout(timeout: Option<Duration>) -> Self {
            let agent = Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(timeout)
                .build()
                .new_agent();
            Self { agent }
        }
    }

    fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    fn send_body(
        builder: RequestBuilder<WithBody>,
        body: Option<&str>,
    ) -> Result<ureq::http::Response<Body>, ureq::Error> {
        match body {
            Some(body) => builder.send(body.as_bytes()),
            None => builder.send_empty(),
        }
    }

    impl Transport for UreqTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            let url = request.url.as_str();
            let headers = request.headers.as_slice();
            let body = request.body.as_deref();

            let result = match request.method {
                HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
                HttpMethod::Post => send_body(with_headers(self.agent.post(url), headers), body),
                HttpMethod::Put => send_body(with_headers(self.agent.put(url), headers), body),
                HttpMethod::Delete => match body {
                    Some(_) => send_body(
                        with_headers(self.agent.delete(url).force_send_body(), headers),
                        body,
                    ),
                    None => with_headers(self.agent.delete(url), headers).call(),
                },
            };

            let mut response = result
                .map_err(|e| TransportError::with_source(format!("{} {url} failed", request.method), e))?;

            let status = response.status().as_u16();
            let response_headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| TransportError::with_source(format!("reading body of {url} failed"), e))?;

            trace!(status, bytes = body.len(), "response received");

            Ok(HttpResponse {
                status,
                headers: response_headers,
                body,
            })
        }
    }
}
