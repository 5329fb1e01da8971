// EconOps API client.
// Handles authentication, request signing, response caching and dispatch to a transport.

use std::path::PathBuf;
use std::time::Instant;

use reqwest::header::HeaderValue;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cache::{CacheWrite, ResponseCache};
use crate::error::{EconopsError, Result};
use crate::signature::{self, SignatureScheme};

use super::transport::{HttpTransport, Transport};
use super::types::{
    ApiRequest, ApiResponse, Method, SIGNATURE_FIELD, SIGNATURE_HEADER, SignaturePlacement,
};

pub const DEFAULT_BASE_URL: &str = "https://api.econops.com";

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV: &str = "econops_token";

/// Token used when neither the configuration nor the environment provides one.
pub const DEMO_TOKEN: &str = "demo";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API token. Falls back to `econops_token`, then to `demo`.
    pub token: Option<String>,
    pub base_url: String,
    /// Consult and fill the response cache.
    pub use_cache: bool,
    /// Cache location. `None` selects the per-user cache directory.
    pub cache_dir: Option<PathBuf>,
    pub placement: SignaturePlacement,
    pub scheme: SignatureScheme,
    /// Skip TLS certificate verification.
    pub insecure: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            use_cache: true,
            cache_dir: None,
            placement: SignaturePlacement::default(),
            scheme: SignatureScheme::default(),
            insecure: false,
        }
    }
}

/// What the cache did for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Caching is turned off for this client.
    Disabled,
    /// The response came from the cache; no request was sent.
    Hit,
    /// The response was fetched and written to the cache.
    Stored,
    /// The response was fetched but the cache write failed.
    WriteFailed(String),
    /// The response was fetched and not cacheable (status other than 200).
    Skipped,
    /// The method is not safe to replay, so the cache was not consulted.
    Bypassed,
}

/// Result of a dispatched call.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub response: ApiResponse,
    pub signature: String,
    pub cache: CacheOutcome,
}

/// EconOps API client with bearer authentication and request signing.
pub struct Client<T: Transport = HttpTransport> {
    token: String,
    base_url: String,
    headers: Vec<(String, String)>,
    cache: Option<ResponseCache>,
    placement: SignaturePlacement,
    scheme: SignatureScheme,
    transport: T,
}

impl Client<HttpTransport> {
    /// Create a client that talks HTTP.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.insecure)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Client<T> {
    /// Create a client on top of an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        let token = config
            .token
            .filter(|token| !token.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|token| !token.is_empty()))
            .unwrap_or_else(|| DEMO_TOKEN.to_string());

        let authorization = format!("Bearer {}", token);
        HeaderValue::from_str(&authorization)
            .map_err(|e| EconopsError::InvalidHeader(e.to_string()))?;

        let headers = vec![
            ("Authorization".to_string(), authorization),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];

        let cache = if config.use_cache {
            match config.cache_dir.or_else(ResponseCache::default_dir) {
                Some(dir) => Some(ResponseCache::new(dir)),
                None => {
                    warn!("No cache directory available, response caching disabled");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers,
            cache,
            placement: config.placement,
            scheme: config.scheme,
            transport,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default headers sent with every request.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Make a request and return the raw response.
    pub fn request(
        &self,
        method: Method,
        route: &str,
        data: Option<&Value>,
    ) -> Result<ApiResponse> {
        Ok(self.dispatch(method, route, data, None)?.response)
    }

    pub fn get(&self, route: &str) -> Result<ApiResponse> {
        self.request(Method::Get, route, None)
    }

    pub fn post(&self, route: &str, data: Option<&Value>) -> Result<ApiResponse> {
        self.request(Method::Post, route, data)
    }

    pub fn put(&self, route: &str, data: Option<&Value>) -> Result<ApiResponse> {
        self.request(Method::Put, route, data)
    }

    pub fn patch(&self, route: &str, data: Option<&Value>) -> Result<ApiResponse> {
        self.request(Method::Patch, route, data)
    }

    pub fn delete(&self, route: &str) -> Result<ApiResponse> {
        self.request(Method::Delete, route, None)
    }

    /// Sign, look up the cache, send and cache a call.
    ///
    /// Only GET and POST calls are served from or written to the cache.
    /// `pregiven` replaces the computed signature. Transport errors propagate;
    /// cache failures only show up in [`Dispatched::cache`].
    pub fn dispatch(
        &self,
        method: Method,
        route: &str,
        data: Option<&Value>,
        pregiven: Option<&str>,
    ) -> Result<Dispatched> {
        let empty = Value::Object(Map::new());
        let signature = signature::sign(self.scheme, route, data.unwrap_or(&empty), pregiven)?;

        let request = self.build_request(method, route, data, &signature)?;

        let cache = self
            .cache
            .as_ref()
            .filter(|_| request.method.is_replayable());

        if let Some(cache) = cache {
            if let Some(mut response) = cache.get::<ApiResponse>(&signature) {
                info!(%method, route, status = response.status, "Served from cache");
                response.from_cache = true;
                return Ok(Dispatched {
                    response,
                    signature,
                    cache: CacheOutcome::Hit,
                });
            }
        }

        let started = Instant::now();
        let response = self.transport.send(&request)?;
        info!(
            method = %request.method,
            route,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        let cache = match cache {
            None if self.cache.is_none() => CacheOutcome::Disabled,
            None => CacheOutcome::Bypassed,
            Some(_) if !response.is_ok() => CacheOutcome::Skipped,
            Some(cache) => match cache.put(&signature, &response) {
                CacheWrite::Stored => CacheOutcome::Stored,
                CacheWrite::Failed(reason) => {
                    debug!(%reason, "Continuing without cached copy");
                    CacheOutcome::WriteFailed(reason)
                }
            },
        };

        Ok(Dispatched {
            response,
            signature,
            cache,
        })
    }

    /// Attach headers and place the signature.
    fn build_request(
        &self,
        method: Method,
        route: &str,
        data: Option<&Value>,
        signature: &str,
    ) -> Result<ApiRequest> {
        let mut headers = self.headers.clone();

        let (method, body) = match self.placement {
            SignaturePlacement::Header => {
                headers.push((SIGNATURE_HEADER.to_string(), signature.to_string()));
                let body = match method {
                    Method::Get => None,
                    _ => data.cloned(),
                };
                (method, body)
            }
            SignaturePlacement::Payload => match (method, data) {
                (Method::Get, None) => (Method::Get, None),
                (_, None) => {
                    let mut body = Map::new();
                    body.insert(SIGNATURE_FIELD.to_string(), Value::from(signature));
                    (method, Some(Value::Object(body)))
                }
                (_, Some(Value::Object(fields))) => {
                    let mut body = fields.clone();
                    body.insert(SIGNATURE_FIELD.to_string(), Value::from(signature));
                    // A GET cannot carry the signed body
                    let method = if method == Method::Get {
                        Method::Post
                    } else {
                        method
                    };
                    (method, Some(Value::Object(body)))
                }
                (_, Some(_)) => {
                    return Err(EconopsError::InvalidInput(
                        "payload-embedded signatures require a JSON object payload".to_string(),
                    ));
                }
            },
        };

        Ok(ApiRequest {
            method,
            url: format!("{}{}", self.base_url, route),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Transport that records requests and replays a canned response.
    struct MockTransport {
        response: ApiResponse,
        requests: RefCell<Vec<ApiRequest>>,
    }

    impl MockTransport {
        fn returning(status: u16, body: &str) -> Self {
            Self {
                response: ApiResponse::new(status, body),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }

        fn last(&self) -> ApiRequest {
            self.requests.borrow().last().cloned().unwrap()
        }
    }

    impl Transport for MockTransport {
        fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.requests.borrow_mut().push(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _request: &ApiRequest) -> Result<ApiResponse> {
            Err(EconopsError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    fn uncached(token: &str) -> ClientConfig {
        ClientConfig {
            token: Some(token.to_string()),
            use_cache: false,
            ..ClientConfig::default()
        }
    }

    fn cached(dir: &TempDir) -> ClientConfig {
        ClientConfig {
            token: Some("test_token".to_string()),
            cache_dir: Some(dir.path().to_path_buf()),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_client_init_with_token() {
        let client =
            Client::with_transport(uncached("test_token"), MockTransport::returning(200, ""))
                .unwrap();

        assert_eq!(client.token(), "test_token");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert!(
            client
                .headers()
                .contains(&("Authorization".to_string(), "Bearer test_token".to_string()))
        );
        assert!(client.cache().is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_removed() {
        let config = ClientConfig {
            base_url: "https://custom.com/".to_string(),
            ..uncached("test")
        };
        let client = Client::with_transport(config, MockTransport::returning(200, "")).unwrap();

        assert_eq!(client.base_url(), "https://custom.com");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result =
            Client::with_transport(uncached("bad\ntoken"), MockTransport::returning(200, ""));

        assert!(matches!(result, Err(EconopsError::InvalidHeader(_))));
    }

    #[test]
    fn test_get_status_returns_transport_response_unmodified() {
        let client = Client::with_transport(
            uncached("test_token"),
            MockTransport::returning(200, r#"{"status": "ok"}"#),
        )
        .unwrap();

        let response = client.get("/status").unwrap();
        assert_eq!(response, ApiResponse::new(200, r#"{"status": "ok"}"#));

        let request = client.transport().last();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "https://api.econops.com/status");
        assert_eq!(request.body, None);
        assert_eq!(request.header("authorization"), Some("Bearer test_token"));
        assert!(!request.url.contains("signature="));
    }

    #[test]
    fn test_signature_header_attached() {
        let client =
            Client::with_transport(uncached("test_token"), MockTransport::returning(200, "{}"))
                .unwrap();
        let data = json!({"data": [[1, 2, 3]], "n_components": 2});

        client.post("/compute/pca", Some(&data)).unwrap();

        let request = client.transport().last();
        let expected = signature::call_signature("/compute/pca", &data, None).unwrap();
        assert_eq!(request.header(SIGNATURE_HEADER), Some(expected.as_str()));
        assert_eq!(request.body, Some(data));
    }

    #[test]
    fn test_signature_in_payload() {
        let config = ClientConfig {
            placement: SignaturePlacement::Payload,
            scheme: SignatureScheme::RouteDigest,
            ..uncached("test_token")
        };
        let client = Client::with_transport(config, MockTransport::returning(200, "{}")).unwrap();

        client.post("/test", Some(&json!({"data": "value"}))).unwrap();

        let request = client.transport().last();
        assert_eq!(request.header(SIGNATURE_HEADER), None);
        let body = request.body.unwrap();
        assert_eq!(body["data"], "value");
        assert_eq!(body["signature"].as_str().unwrap().len(), 72);
    }

    #[test]
    fn test_get_with_data_forces_post_in_payload_mode() {
        let config = ClientConfig {
            placement: SignaturePlacement::Payload,
            ..uncached("test_token")
        };
        let client = Client::with_transport(config, MockTransport::returning(200, "{}")).unwrap();

        client
            .request(Method::Get, "/test", Some(&json!({"data": "value"})))
            .unwrap();
        assert_eq!(client.transport().last().method, Method::Post);

        client.get("/test").unwrap();
        let request = client.transport().last();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.body, None);
    }

    #[test]
    fn test_payload_mode_rejects_non_object() {
        let config = ClientConfig {
            placement: SignaturePlacement::Payload,
            ..uncached("test_token")
        };
        let client = Client::with_transport(config, MockTransport::returning(200, "{}")).unwrap();

        let result = client.post("/test", Some(&json!([1, 2, 3])));
        assert!(matches!(result, Err(EconopsError::InvalidInput(_))));
        assert_eq!(client.transport().calls(), 0);
    }

    #[test]
    fn test_pregiven_signature_used() {
        let client =
            Client::with_transport(uncached("test_token"), MockTransport::returning(200, "{}"))
                .unwrap();

        let dispatched = client
            .dispatch(Method::Post, "/test", Some(&json!({"a": 1})), Some("X"))
            .unwrap();

        assert_eq!(dispatched.signature, "X");
        assert_eq!(dispatched.cache, CacheOutcome::Disabled);
        assert_eq!(client.transport().last().header(SIGNATURE_HEADER), Some("X"));
    }

    #[test]
    fn test_cached_response_skips_transport() {
        let dir = TempDir::new().unwrap();
        let client =
            Client::with_transport(cached(&dir), MockTransport::returning(200, r#"{"x":1}"#))
                .unwrap();
        let data = json!({"x": 1});

        let first = client
            .dispatch(Method::Post, "/compute", Some(&data), None)
            .unwrap();
        assert_eq!(first.cache, CacheOutcome::Stored);
        assert!(!first.response.from_cache);

        let second = client
            .dispatch(Method::Post, "/compute", Some(&data), None)
            .unwrap();
        assert_eq!(second.cache, CacheOutcome::Hit);
        assert!(second.response.from_cache);
        assert_eq!(second.response.body, r#"{"x":1}"#);
        assert_eq!(client.transport().calls(), 1);
    }

    #[test]
    fn test_error_responses_not_cached() {
        let dir = TempDir::new().unwrap();
        let client =
            Client::with_transport(cached(&dir), MockTransport::returning(500, "boom")).unwrap();

        let first = client.dispatch(Method::Get, "/status", None, None).unwrap();
        assert_eq!(first.cache, CacheOutcome::Skipped);
        assert_eq!(first.response.status, 500);

        client.get("/status").unwrap();
        assert_eq!(client.transport().calls(), 2);
        assert_eq!(client.cache().unwrap().stats().entries, 0);
    }

    #[test]
    fn test_cache_write_failure_does_not_fail_request() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let config = ClientConfig {
            cache_dir: Some(blocker),
            ..cached(&dir)
        };
        let client = Client::with_transport(config, MockTransport::returning(200, "{}")).unwrap();

        let dispatched = client.dispatch(Method::Get, "/status", None, None).unwrap();
        assert!(matches!(dispatched.cache, CacheOutcome::WriteFailed(_)));
        assert!(dispatched.response.is_ok());
    }

    #[test]
    fn test_delete_after_cached_get_is_sent() {
        let dir = TempDir::new().unwrap();
        let client =
            Client::with_transport(cached(&dir), MockTransport::returning(200, "{}")).unwrap();

        let get = client.dispatch(Method::Get, "/items/1", None, None).unwrap();
        assert_eq!(get.cache, CacheOutcome::Stored);

        let delete = client
            .dispatch(Method::Delete, "/items/1", None, None)
            .unwrap();
        assert_eq!(delete.signature, get.signature);
        assert_eq!(delete.cache, CacheOutcome::Bypassed);
        assert!(!delete.response.from_cache);
        assert_eq!(client.transport().calls(), 2);
        assert_eq!(client.transport().last().method, Method::Delete);
    }

    #[test]
    fn test_put_and_patch_never_cached() {
        let dir = TempDir::new().unwrap();
        let client =
            Client::with_transport(cached(&dir), MockTransport::returning(200, "{}")).unwrap();
        let data = json!({"a": 1});

        client.put("/items/1", Some(&data)).unwrap();
        client.put("/items/1", Some(&data)).unwrap();
        client.patch("/items/1", Some(&data)).unwrap();

        assert_eq!(client.transport().calls(), 3);
        assert_eq!(client.cache().unwrap().stats().entries, 0);
    }

    #[test]
    fn test_payload_validation_precedes_cache_lookup() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig {
            placement: SignaturePlacement::Payload,
            ..cached(&dir)
        };
        let client = Client::with_transport(config, MockTransport::returning(200, "{}")).unwrap();

        let first = client
            .dispatch(Method::Post, "/test", Some(&json!({"a": 1})), Some("fixed"))
            .unwrap();
        assert_eq!(first.cache, CacheOutcome::Stored);

        let result = client.dispatch(Method::Post, "/test", Some(&json!([1, 2])), Some("fixed"));
        assert!(matches!(result, Err(EconopsError::InvalidInput(_))));
        assert_eq!(client.transport().calls(), 1);
    }

    #[test]
    fn test_transport_error_propagates() {
        let client = Client::with_transport(uncached("test_token"), FailingTransport).unwrap();

        assert!(client.get("/status").is_err());
    }
}
