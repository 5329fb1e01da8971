// HTTP transport.
// Sends a built request with a blocking reqwest client and returns the raw response.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{EconopsError, Result};

use super::types::{ApiRequest, ApiResponse};

/// Something that can deliver an [`ApiRequest`].
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Blocking HTTP transport. Timeouts and redirects follow reqwest defaults.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the transport. `insecure` disables TLS certificate verification.
    pub fn new(insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(EconopsError::Transport)?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| EconopsError::InvalidHeader(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| EconopsError::InvalidHeader(e.to_string()))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(ApiResponse::new(status, body))
    }
}
