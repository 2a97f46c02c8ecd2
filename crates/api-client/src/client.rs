//! The request pipeline
//!
//! Outbound: bearer credential, snake_case body/query/form names, content
//! type. Inbound: camelCase body. On a 401 from a normal endpoint the request
//! waits on the shared renewal and is replayed once with the new token.

use std::sync::Arc;

use common::Secret;
use keycase::Value;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use session_auth::{
    DEFAULT_ENTRY_POINT, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH, TokenStore,
    parse_credential_pair,
};
use session_refresh::{
    Navigator, RefreshContext, RefreshCoordinator, SessionStatus, SessionTerminator,
};
use tracing::{debug, info, instrument, warn};
use transport::{Transport, TransportError, WireBody, WireRequest, WireResponse};

use crate::cache::ResponseCache;
use crate::error::{ApiError, Result};
use crate::request::{ApiRequest, ApiResponse, RequestBody, flatten_query};

/// Endpoint layout and fixed headers.
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    pub login_path: String,
    pub refresh_path: String,
    /// Unauthenticated entry point the terminator redirects to
    pub entry_point: String,
    /// Sent with every request; per-request headers take precedence.
    pub default_headers: HeaderMap,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            default_headers,
        }
    }
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    terminator: Arc<SessionTerminator>,
    coordinator: RefreshCoordinator,
    cache: Arc<ResponseCache>,
    options: ApiClientOptions,
}

impl ApiClient {
    /// Wire up the pipeline. Must be called inside a tokio runtime: the
    /// renewal coordinator task is spawned here.
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        options: ApiClientOptions,
    ) -> Self {
        let terminator = Arc::new(SessionTerminator::new(
            tokens.clone(),
            navigator,
            options.entry_point.clone(),
        ));

        let cache = Arc::new(ResponseCache::new());
        let wiped = cache.clone();
        terminator.register_wipe_hook("response-cache", move || wiped.clear());

        let coordinator = RefreshCoordinator::spawn(RefreshContext {
            transport: transport.clone(),
            tokens: tokens.clone(),
            terminator: terminator.clone(),
            refresh_path: options.refresh_path.clone(),
        });

        info!(transport = transport.id(), "api client ready");
        Self {
            transport,
            tokens,
            terminator,
            coordinator,
            cache,
            options,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn terminator(&self) -> &Arc<SessionTerminator> {
        &self.terminator
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Register application state to wipe when the session ends.
    pub fn register_wipe_hook(&self, name: impl Into<String>, hook: impl Fn() + Send + Sync + 'static) {
        self.terminator.register_wipe_hook(name, hook);
    }

    /// Issue a request through the pipeline.
    #[instrument(skip_all, fields(request_id = %request.context.request_id, method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = self.execute(request).await?;
        let body = Value::from_slice(&response.body)
            .map_err(|e| ApiError::Decode(format!("response is not JSON: {e}")))?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body: keycase::to_application(body),
        })
    }

    /// GET through the read-through cache. A result is stored only if the
    /// session that issued the request is still the active one when it
    /// arrives.
    pub async fn get_cached(&self, path: &str, query: Option<Value>) -> Result<Value> {
        let key = ResponseCache::key(path, query.as_ref());
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "response cache hit");
            return Ok(hit);
        }

        let mut session = self.terminator.subscribe();
        let issued_in = *session.borrow_and_update();

        let mut request = ApiRequest::get(path);
        request.query = query;
        let response = self.send(request).await?;

        // Any termination or re-login since issue bumps the channel version.
        let same_session = !session.has_changed().unwrap_or(true);
        if issued_in == SessionStatus::Active && same_session {
            self.cache.insert(key, response.body.clone());
        } else {
            debug!(%key, "session changed while in flight, not caching");
        }
        Ok(response.body)
    }

    /// Sign in: POST the credentials to the login endpoint, persist the
    /// issued token pair and start a new session.
    #[instrument(skip_all, fields(path = %self.options.login_path))]
    pub async fn login(&self, credentials: impl Into<Value>) -> Result<ApiResponse> {
        let request = ApiRequest::post(self.options.login_path.clone(), credentials);
        let response = self.execute(request).await?;

        let raw: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::Decode(format!("login response is not JSON: {e}")))?;
        let (shape, pair) = parse_credential_pair(&raw, None)
            .ok_or_else(|| ApiError::Decode("login response carried no credentials".into()))?;
        self.tokens
            .store_pair(&pair)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        self.cache.clear();
        self.terminator.rearm();
        info!(?shape, "signed in");

        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body: keycase::to_application(Value::from(raw)),
        })
    }

    /// Sign out: wipe credentials and caches, redirect to the entry point.
    pub async fn logout(&self) {
        info!("signing out");
        self.terminator.terminate().await;
    }

    /// Send, and on an auth failure renew and replay at most once.
    async fn execute(&self, mut request: ApiRequest) -> Result<WireResponse> {
        let auth_endpoint = self.is_auth_endpoint(&request.path);
        let token = if auth_endpoint {
            None
        } else {
            self.tokens.get().await
        };

        let response = self.dispatch(&request, token.as_ref()).await?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status != 401 || request.context.retried {
            return Err(failure(&response));
        }

        // Renewing on a 401 from login or renewal itself would loop.
        if auth_endpoint {
            warn!(status = response.status, "auth endpoint rejected credentials, ending session");
            self.terminator.terminate().await;
            return Err(ApiError::AuthFatal {
                status: response.status,
                body: error_body(&response),
            });
        }

        request.context.retried = true;
        debug!("access token rejected, waiting for renewal");
        let fresh = match self.coordinator.acquire_fresh_token().await {
            Ok(token) => token,
            Err(source) => {
                return Err(ApiError::Refresh {
                    source,
                    status: response.status,
                    body: error_body(&response),
                });
            }
        };

        crate::metrics::record_retry();
        debug!("replaying with renewed token");
        let replay = self.dispatch(&request, Some(&fresh)).await?;
        if replay.is_success() {
            Ok(replay)
        } else {
            Err(failure(&replay))
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&Secret<String>>,
    ) -> Result<WireResponse> {
        let wire = self.outbound(request, token)?;
        let response = self.transport.send(wire).await?;
        crate::metrics::record_request(request.method.as_str(), response.status);
        debug!(status = response.status, retried = request.context.retried, "response received");
        Ok(response)
    }

    /// Outbound transform: headers, credential, body and query in wire form.
    fn outbound(
        &self,
        request: &ApiRequest,
        token: Option<&Secret<String>>,
    ) -> Result<WireRequest> {
        let mut headers = self.options.default_headers.clone();
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        if self.is_auth_endpoint(&request.path) {
            headers.remove(AUTHORIZATION);
        } else if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_str()))
                .map_err(|e| TransportError::InvalidRequest(format!("unusable access token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let body = match &request.body {
            RequestBody::Empty => WireBody::Empty,
            RequestBody::Multipart(form) => {
                // The transport sets multipart/form-data with its boundary.
                headers.remove(CONTENT_TYPE);
                WireBody::Multipart(keycase::form_to_wire(form.clone()))
            }
            RequestBody::Json(value) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                WireBody::Json(keycase::to_wire(value.clone()).into_json())
            }
        };

        let query = request
            .query
            .clone()
            .map(|q| flatten_query(keycase::to_wire(q)))
            .unwrap_or_default();

        Ok(WireRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            query,
            headers,
            body,
        })
    }

    fn is_auth_endpoint(&self, path: &str) -> bool {
        let path = normalize_path(path);
        path == normalize_path(&self.options.login_path)
            || path == normalize_path(&self.options.refresh_path)
    }
}

/// Strip query/fragment and trailing slashes so `/auth/login` matches `/auth/login/?next=x`.
fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.trim_end_matches('/')
}

/// Error body in camelCase. Non-JSON bodies (HTML error pages) become a string.
fn error_body(response: &WireResponse) -> Value {
    let body = Value::from_slice(&response.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()));
    keycase::to_application(body)
}

fn failure(response: &WireResponse) -> ApiError {
    ApiError::Status {
        status: response.status,
        body: error_body(response),
    }
}
