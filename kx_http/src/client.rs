use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use reqwest::Client;
use reqwest::ClientBuilder;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Runtime;

use crate::errors::HttpError;
use crate::errors::Result;
use crate::operation::ApiRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.kraken.com";
pub const API_VERSION: u8 = 0;

/// The collaborator that actually talks to the exchange
///
/// Implementations perform exactly one attempt per call; throttling and
/// retrying happen around them.
pub trait ExchangeTransport: Send + Sync {
    fn call(&self, request: &ApiRequest) -> Result<Value>;
}

/// Authenticates private requests
///
/// Receives the URL path, the nonce already placed in the body and the
/// url-encoded body, and returns the headers to attach.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, path: &str, nonce: u64, body: &str) -> Result<Vec<(String, String)>>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// REST endpoint root (default: https://api.kraken.com)
    pub base_url: String,

    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,

    /// Idle timeout for connections (default: 90s)
    pub pool_idle_timeout: Duration,

    /// Connection establishment timeout (default: 10s)
    pub connect_timeout: Duration,

    /// Total request timeout (default: 30s)
    pub request_timeout: Duration,

    /// Enable TCP_NODELAY (default: true)
    pub tcp_nodelay: bool,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            tcp_nodelay: true,
            user_agent: concat!("kx_http/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Vec<String>,
    result: Option<Value>,
}

/// Blocking transport over reqwest
///
/// Drives the async client on its own current-thread runtime, so `call` must
/// not be invoked from inside another tokio runtime.
pub struct HttpTransport {
    client: Client,
    runtime: Runtime,
    config: HttpClientConfig,
    signer: Option<Box<dyn RequestSigner>>,
    last_nonce: AtomicU64,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(config.tcp_nodelay)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .gzip(true)
            .build()?;

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        Ok(Self { client, runtime, config, signer: None, last_nonce: AtomicU64::new(0) })
    }

    /// Attach the signer used for private endpoints
    pub fn with_signer(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// URL path of an operation, e.g. `/0/public/Time`
    pub fn path_for(request: &ApiRequest) -> String {
        let scope = if request.operation.is_private() { "private" } else { "public" };
        format!("/{API_VERSION}/{scope}/{}", request.operation.endpoint())
    }

    /// Strictly increasing millisecond nonce
    fn next_nonce(&self) -> u64 {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default();
        let mut last = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_nonce.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Build the url-encoded body and the auth headers for a request
    fn prepare(&self, request: &ApiRequest, path: &str) -> Result<(String, Vec<(String, String)>)> {
        let mut form = url::form_urlencoded::Serializer::new(String::new());

        if !request.operation.is_private() {
            form.extend_pairs(&request.params);
            return Ok((form.finish(), Vec::new()));
        }

        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| HttpError::AuthenticationFailed(format!("{} requires a request signer", request.operation.endpoint())))?;

        let nonce = self.next_nonce();
        form.append_pair("nonce", &nonce.to_string());
        form.extend_pairs(&request.params);
        let body = form.finish();
        let headers = signer.sign(path, nonce, &body)?;
        Ok((body, headers))
    }
}

/// Unpack the `{"error": [...], "result": ...}` envelope
pub fn unpack_envelope(bytes: &[u8]) -> Result<Value> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if !envelope.error.is_empty() {
        return Err(HttpError::ApiError { messages: envelope.error });
    }
    envelope.result.ok_or_else(|| HttpError::InvalidResponse("missing result".to_string()))
}

impl ExchangeTransport for HttpTransport {
    fn call(&self, request: &ApiRequest) -> Result<Value> {
        let path = Self::path_for(request);
        let (body, headers) = self.prepare(request, &path)?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        tracing::debug!(endpoint = request.operation.endpoint(), "sending request");

        self.runtime.block_on(async {
            let mut builder = self.client.post(&url).header(CONTENT_TYPE, "application/x-www-form-urlencoded").body(body);
            for (name, value) in &headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(HttpError::InvalidResponse(format!("HTTP {}", status)));
            }

            let bytes = response.bytes().await?;
            unpack_envelope(&bytes)
        })
    }
}
