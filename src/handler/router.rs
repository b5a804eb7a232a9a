//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for size limits,
//! access checks, route matching, dispatching and mapping handler failures to
//! responses.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, REFERER, SERVER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode};

use crate::config::AppState;
use crate::error::{AppError, HttpError};
use crate::handler::{errors, pages};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::routing::{self, allow_header, AccessDecision, Endpoint, RouteMatch};

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let is_head = parts.method == Method::HEAD;

    logger::log_headers_count(parts.headers.len(), state.config.logging.show_headers);

    let mut response = route_request(&parts, body, &state).await;

    match HeaderValue::from_str(&state.config.http.server_name) {
        Ok(value) => {
            response.headers_mut().insert(SERVER, value);
        }
        Err(_) => logger::log_warning("http.server_name is not a valid header value"),
    }

    let body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default();
    if is_head {
        *response.body_mut() = Full::new(Bytes::new());
    }

    if state.config.logging.access_log {
        let mut entry = access_entry(&parts, peer_addr);
        entry.status = response.status().as_u16();
        entry.body_bytes = if is_head { 0 } else { body_bytes };
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and method
async fn route_request<B>(parts: &Parts, body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let path = parts.uri.path();

    // 1. Check body size
    if let Some(resp) = check_body_size(&parts.headers, state.config.http.max_body_size) {
        return resp;
    }

    // 2. Protected prefixes
    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match routing::check_access(path, authorization, &state.config.security.protected) {
        AccessDecision::Allowed => {}
        AccessDecision::Unauthenticated => {
            return errors::respond(HttpError::Unauthorized, &state.renderer);
        }
        AccessDecision::Forbidden => {
            logger::log_warning(&format!("Rejected bearer token for {path}"));
            return errors::respond(HttpError::Forbidden, &state.renderer);
        }
    }

    // 3. Route lookup
    let endpoint = match state.routes.resolve(&parts.method, path) {
        RouteMatch::Found(endpoint) => endpoint,
        RouteMatch::Options(allow) => {
            return http::build_options_response(&allow_header(allow), state.config.http.enable_cors);
        }
        RouteMatch::MethodNotAllowed(allow) => {
            logger::log_warning(&format!("Method not allowed: {} {path}", parts.method));
            return http::build_405_response(&allow_header(allow));
        }
        RouteMatch::NotFound => return errors::respond(HttpError::NotFound, &state.renderer),
    };

    // 4. Dispatch
    let result = match endpoint {
        Endpoint::FetchApi => pages::fetch_api(state).await,
        Endpoint::PostApi => pages::post_api(state, &parts.method, &parts.headers, body).await,
        Endpoint::Liveness | Endpoint::Readiness => return http::build_health_response("ok"),
    };

    match result {
        Ok(html) => http::build_html_response(StatusCode::OK, html),
        Err(err) => error_response(err, state),
    }
}

/// Map a handler failure to its response
fn error_response(err: AppError, state: &AppState) -> Response<Full<Bytes>> {
    match err {
        AppError::Http(e) => errors::respond(e, &state.renderer),
        AppError::PayloadTooLarge { .. } => {
            logger::log_warning(&err.to_string());
            http::build_413_response()
        }
        AppError::Outbound(_) => {
            logger::log_error(&err.to_string());
            http::build_502_response()
        }
        AppError::Render(ref e) => {
            logger::log_error(&format!("{err}: {}", render_cause(e)));
            http::build_500_response()
        }
    }
}

/// Innermost cause of a template error, which is where tera keeps the detail
fn render_cause(err: &tera::Error) -> String {
    let mut source: &dyn std::error::Error = err;
    while let Some(next) = source.source() {
        source = next;
    }
    source.to_string()
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = headers.get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn access_entry(parts: &Parts, peer_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = format!("{:?}", parts.version)
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header_string(&parts.headers, &REFERER);
    entry.user_agent = header_string(&parts.headers, &USER_AGENT);
    entry
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handler::pages::PLACEHOLDER;
    use crate::outbound::OutboundMethod;
    use crate::test_support::{test_config, test_state, MockOutbound};
    use http_body_util::BodyExt;
    use serde_json::json;

    const URLENCODED: &str = "application/x-www-form-urlencoded";

    struct TestResponse {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn request(
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        body: impl Into<Bytes>,
    ) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(body.into())).unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> TestResponse {
        let resp = handle_request(req, peer(), Arc::clone(state)).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    fn form_body(pairs: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }

    fn post_form(body: String) -> Request<Full<Bytes>> {
        request(Method::POST, "/post_api", &[("content-type", URLENCODED)], body)
    }

    #[tokio::test]
    async fn test_get_post_api_shows_placeholder() {
        let mock = MockOutbound::json(json!({}));
        let state = test_state(&mock);

        let resp = send(&state, request(Method::GET, "/post_api", &[], "")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains(PLACEHOLDER));
        assert!(resp.body.contains("name=\"csrf_token\""));
        assert!(resp.body.contains("name=\"user_input\""));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_valid_post_renders_echo_response() {
        let echoed = json!({"json": {"key": "hello world"}, "url": "https://echo.test/post"});
        let mock = MockOutbound::json(echoed.clone());
        let state = test_state(&mock);
        let token = state.csrf.issue();

        let resp = send(
            &state,
            post_form(form_body(&[("user_input", "hello world"), ("csrf_token", token.as_str())])),
        )
        .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains(&tera::escape_html(&echoed.to_string())));
        assert!(!resp.body.contains(PLACEHOLDER));
        assert!(resp.body.contains("value=\"hello world\""));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, OutboundMethod::Post);
        assert_eq!(calls[0].url, "https://echo.test/post");
        assert_eq!(
            calls[0].payload.as_ref().and_then(|p| p.get("key")).map(String::as_str),
            Some("hello world")
        );
    }

    #[tokio::test]
    async fn test_whitespace_input_is_accepted() {
        let mock = MockOutbound::json(json!({"json": {"key": " "}}));
        let state = test_state(&mock);
        let token = state.csrf.issue();

        let resp = send(
            &state,
            post_form(form_body(&[("user_input", " "), ("csrf_token", token.as_str())])),
        )
        .await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_without_call() {
        let mock = MockOutbound::json(json!({}));
        let state = test_state(&mock);
        let token = state.csrf.issue();

        for body in [
            form_body(&[("user_input", ""), ("csrf_token", token.as_str())]),
            form_body(&[("csrf_token", token.as_str())]),
        ] {
            let resp = send(&state, post_form(body)).await;
            assert_eq!(resp.status, StatusCode::OK);
            assert!(resp.body.contains("This field is required."));
            assert!(!resp.body.contains("id=\"data\""));
            assert!(!resp.body.contains(PLACEHOLDER));
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_csrf_token_is_rejected() {
        let mock = MockOutbound::json(json!({}));
        let state = test_state(&mock);

        let resp = send(&state, post_form(form_body(&[("user_input", "hi")]))).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains("The CSRF token is missing."));
        assert!(!resp.body.contains("This field is required."));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_csrf_can_be_disabled() {
        let mock = MockOutbound::json(json!({"ok": true}));
        let mut config = test_config();
        config.security.csrf_enabled = false;
        let state = Arc::new(AppState::with_outbound(&config, mock.clone()).unwrap());

        let resp = send(&state, post_form(form_body(&[("user_input", "hi")]))).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(!resp.body.contains("name=\"csrf_token\""));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_api_calls_weather_once() {
        let weather = json!({"weather": [{"main": "Rain"}], "name": "Singapore"});
        let mock = MockOutbound::json(weather.clone());
        let state = test_state(&mock);

        let resp = send(&state, request(Method::GET, "/fetch_api", &[], "")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.contains(&tera::escape_html(&weather.to_string())));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, OutboundMethod::Get);
        assert_eq!(
            calls[0].url,
            "https://weather.test/data/2.5/weather?lat=1.295895&lon=103.8474269&appid=k3y"
        );
    }

    #[tokio::test]
    async fn test_every_request_calls_upstream() {
        let mock = MockOutbound::json(json!({"temp": 30}));
        let state = test_state(&mock);

        for _ in 0..3 {
            let resp = send(&state, request(Method::GET, "/fetch_api", &[], "")).await;
            assert_eq!(resp.status, StatusCode::OK);
        }
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_undecodable_upstream_is_bad_gateway() {
        let mock = MockOutbound::not_json();
        let state = test_state(&mock);

        let resp = send(&state, request(Method::GET, "/fetch_api", &[], "")).await;
        assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_page() {
        let state = test_state(&MockOutbound::json(json!({})));

        let resp = send(&state, request(Method::GET, "/does-not-exist", &[], "")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert!(resp.body.contains("id=\"error-404\""));

        let resp = send(&state, request(Method::POST, "/does-not-exist", &[], "")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_prefix() {
        let state = test_state(&MockOutbound::json(json!({})));

        let resp = send(&state, request(Method::GET, "/admin/users", &[], "")).await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
        assert!(resp.body.contains("id=\"error-401\""));

        let wrong = [("authorization", "Bearer nope")];
        let resp = send(&state, request(Method::GET, "/admin/users", &wrong, "")).await;
        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert!(resp.body.contains("id=\"error-403\""));

        let right = [("authorization", "Bearer letmein")];
        let resp = send(&state, request(Method::GET, "/admin/users", &right, "")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_400_page() {
        let mock = MockOutbound::json(json!({}));
        let state = test_state(&mock);

        let resp = send(
            &state,
            request(
                Method::POST,
                "/post_api",
                &[("content-type", "multipart/form-data")],
                "user_input=x",
            ),
        )
        .await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert!(resp.body.contains("id=\"error-400\""));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let state = test_state(&MockOutbound::json(json!({})));

        let resp = send(&state, request(Method::POST, "/fetch_api", &[], "")).await;
        assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers.get("allow").unwrap(), "GET, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_options_lists_methods() {
        let state = test_state(&MockOutbound::json(json!({})));

        let resp = send(&state, request(Method::OPTIONS, "/post_api", &[], "")).await;
        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers.get("allow").unwrap(),
            "GET, POST, HEAD, OPTIONS"
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mock = MockOutbound::json(json!({}));
        let state = test_state(&mock);
        let big = "a".repeat(4096);

        // Declared length
        let resp = send(
            &state,
            request(
                Method::POST,
                "/post_api",
                &[("content-type", URLENCODED), ("content-length", "4096")],
                big.clone(),
            ),
        )
        .await;
        assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);

        // Body read past the limit
        let resp = send(&state, post_form(format!("user_input={big}"))).await;
        assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_head_strips_body() {
        let state = test_state(&MockOutbound::json(json!({"a": 1})));

        let resp = send(&state, request(Method::HEAD, "/fetch_api", &[], "")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.body.is_empty());
        assert_ne!(resp.headers.get("content-length").unwrap(), "0");
    }

    #[tokio::test]
    async fn test_health_and_server_header() {
        let state = test_state(&MockOutbound::json(json!({})));

        let resp = send(&state, request(Method::GET, "/healthz", &[], "")).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, "ok");
        assert_eq!(resp.headers.get("server").unwrap(), "portal-test");

        let resp = send(&state, request(Method::GET, "/readyz", &[], "")).await;
        assert_eq!(resp.body, "ok");
    }

    #[tokio::test]
    async fn test_health_routes_can_be_disabled() {
        let mut config: Config = test_config();
        config.routes.health.enabled = false;
        let state = Arc::new(
            AppState::with_outbound(&config, MockOutbound::json(json!({}))).unwrap(),
        );

        let resp = send(&state, request(Method::GET, "/healthz", &[], "")).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }
}
