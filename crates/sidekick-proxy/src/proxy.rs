//! `/api` forwarding
//!
//! Requests keep their method, headers, body, path and query. Only the
//! scheme, host and port change to the backend's.

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::any,
};
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, error};

pub struct ProxyState {
    pub backend: Url,
    pub client: reqwest::Client,
}

impl ProxyState {
    pub fn new(backend: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { backend, client })
    }
}

/// Routes for `/api` and everything below it
pub fn proxy_routes(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/api", any(forward))
        .route("/api/", any(forward))
        .route("/api/*path", any(forward))
        .with_state(state)
}

/// Handler for every proxied request
pub async fn forward(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    match forward_request(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            error!("Proxy error: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Proxy failed").into_response()
        }
    }
}

/// The backend URL for an incoming request URI. The backend URL's own path
/// is not used.
pub fn rewrite_url(backend: &Url, uri: &Uri) -> Url {
    let mut url = backend.clone();
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_path(uri.path());
    url.set_query(uri.query());
    url.set_fragment(None);
    url
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::TRANSFER_ENCODING
        || name == header::UPGRADE
        || name == header::TE
        || name == header::TRAILER
        || name.as_str() == "keep-alive"
        || name.as_str() == "proxy-connection"
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| *name != header::HOST && !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

async fn forward_request(state: &ProxyState, request: Request) -> anyhow::Result<Response> {
    let (parts, body) = request.into_parts();
    let url = rewrite_url(&state.backend, &parts.uri);
    debug!("{} {} -> {}", parts.method, parts.uri, url);

    let has_body = parts.headers.contains_key(header::CONTENT_LENGTH)
        || parts.headers.contains_key(header::TRANSFER_ENCODING);

    let mut upstream = state
        .client
        .request(parts.method, url)
        .headers(forwarded_headers(&parts.headers));
    if has_body {
        upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }
    let upstream = upstream.send().await?;

    let mut response = axum::http::Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        *headers = forwarded_headers(upstream.headers());
    }
    Ok(response.body(Body::from_stream(upstream.bytes_stream()))?)
}
