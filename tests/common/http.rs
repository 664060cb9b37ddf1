use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

pub type Header = (&'static str, String);

/// Client address as a trusted proxy would report it.
pub fn forwarded_for(ip: &str) -> Header {
    ("x-forwarded-for", ip.to_string())
}

pub async fn request(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[Header],
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }

    let req = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    app.clone().oneshot(req).await.expect("oneshot response")
}

pub async fn response_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse json body")
    };
    (status, headers, json)
}

pub async fn get_json(app: &Router, path: &str, headers: &[Header]) -> (StatusCode, Value) {
    let (status, _, body) = response_json(request(app, Method::GET, path, None, headers).await).await;
    (status, body)
}

/// Error envelope as emitted behind the request-id layer.
pub fn assert_api_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "not an error body: {body}");
    assert_eq!(body["code"], code, "unexpected code in {body}");
    assert!(body["message"].is_string());
    assert!(body["traceId"].is_string(), "missing traceId in {body}");
}

pub fn assert_status_ok_json(status: StatusCode, body: &Value) {
    assert!(status.is_success(), "status {status}, body {body}");
    assert_eq!(body["success"], true);
    assert!(body.get("data").is_some());
}
