//! Test server harness for E2E testing
//!
//! Provides `TestSessionServer` for spawning real session service instances
//! backed by an in-memory user store and a mock identity verifier.

use crate::fixtures::{
    TEST_COOKIE_NAME, TEST_GOOGLE_CLIENT_ID, TEST_JWT_SECRET, TEST_PAYMENT_SECRET,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use session_service::auth::google::mock::MockIdentityVerifier;
use session_service::auth::{SessionCodec, SigningKey};
use session_service::config::Config;
use session_service::observability::metrics::init_metrics_recorder;
use session_service::repositories::InMemoryUserStore;
use session_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Knobs for a test server.
pub struct TestServerOptions {
    pub verifier: MockIdentityVerifier,
    /// `None` leaves the payment gateway unconfigured.
    pub payment_secret: Option<String>,
    pub cookie_secure: bool,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            verifier: MockIdentityVerifier::accepting(),
            payment_secret: Some(TEST_PAYMENT_SECRET.to_string()),
            cookie_secure: false,
        }
    }
}

/// Result of a successful `POST /auth/google`.
#[derive(Debug, Clone)]
pub struct TestLogin {
    /// Session token taken from `Set-Cookie`.
    pub token: String,
    /// Response body.
    pub body: serde_json::Value,
}

impl TestLogin {
    /// `Cookie` header value that presents this session.
    pub fn cookie_header(&self) -> String {
        format!("{TEST_COOKIE_NAME}={}", self.token)
    }

    /// `Authorization` header value that presents this session.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test harness for spawning the session service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let server = TestSessionServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestSessionServer {
    addr: SocketAddr,
    store: Arc<InMemoryUserStore>,
    verifier: Arc<MockIdentityVerifier>,
    codec: SessionCodec,
    config: Config,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestSessionServer {
    /// Spawn a server with default options.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestServerOptions::default()).await
    }

    /// Spawn a server on `127.0.0.1:0` using the real route builder.
    pub async fn spawn_with(options: TestServerOptions) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            (
                "GOOGLE_CLIENT_ID".to_string(),
                TEST_GOOGLE_CLIENT_ID.to_string(),
            ),
            (
                "SESSION_COOKIE_NAME".to_string(),
                TEST_COOKIE_NAME.to_string(),
            ),
            (
                "SESSION_COOKIE_SECURE".to_string(),
                options.cookie_secure.to_string(),
            ),
        ]);
        if let Some(secret) = options.payment_secret {
            vars.insert("RAZORPAY_KEY_SECRET".to_string(), secret);
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let key = SigningKey::from_secret(&config.jwt_secret)
            .map_err(|e| anyhow::anyhow!("Failed to create signing key: {}", e))?;
        let codec = SessionCodec::new(Arc::new(key));

        let store = Arc::new(InMemoryUserStore::new());
        let verifier = Arc::new(options.verifier);

        let state = Arc::new(AppState {
            store: store.clone(),
            verifier: verifier.clone(),
            codec: codec.clone(),
            config: config.clone(),
        });

        // The global recorder can only be installed once per process; later
        // servers get a standalone handle.
        let metrics_handle = init_metrics_recorder()
            .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle());

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            verifier,
            codec,
            config,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Log in through `POST /auth/google`, using `email` as the assertion.
    ///
    /// Works with the default accepting verifier.
    pub async fn login(&self, email: &str) -> Result<TestLogin, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/auth/google", self.url()))
            .json(&serde_json::json!({ "idToken": email }))
            .send()
            .await?;

        if response.status() != 200 {
            anyhow::bail!("Login failed with status {}", response.status());
        }

        let token = session_token_from(&response)
            .ok_or_else(|| anyhow::anyhow!("Login response set no session cookie"))?;
        let body = response.json().await?;

        Ok(TestLogin { token, body })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// HTTP client without a cookie jar; tests pass credentials explicitly.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The server's user store.
    pub fn store(&self) -> &InMemoryUserStore {
        &self.store
    }

    /// The server's identity verifier.
    pub fn verifier(&self) -> &MockIdentityVerifier {
        &self.verifier
    }

    /// A codec sharing the server's signing key.
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestSessionServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Raw `Set-Cookie` header for the session cookie, if any.
pub fn session_set_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|h| h.starts_with(&format!("{TEST_COOKIE_NAME}=")))
        .map(str::to_string)
}

/// Session token carried by the response's `Set-Cookie`, if non-empty.
pub fn session_token_from(response: &reqwest::Response) -> Option<String> {
    let header = session_set_cookie(response)?;
    let value = header
        .split(';')
        .next()?
        .strip_prefix(&format!("{TEST_COOKIE_NAME}="))?;
    (!value.is_empty()).then(|| value.to_string())
}
