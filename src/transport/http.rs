//! HTTP transport
//!
//! Exposes the ingress adapter as `POST /kafka/send/{topic}`. The body is the
//! payload: any JSON document, or a form-urlencoded body which becomes an
//! object of string values. An empty body is the empty object. The response
//! is `204 No Content` on acceptance and `400` for malformed requests.

use std::future::Future;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::bridge::Bridge;
use crate::transport::ingress;
use crate::utils::error::{BridgeError, Result};

pub const PUBLISH_ROUTE: &str = "/kafka/send/{topic}";

pub fn router(bridge: Bridge) -> Router {
    Router::new()
        .route(PUBLISH_ROUTE, post(publish))
        .route("/kafka/send", post(publish_without_topic))
        .route("/kafka/send/", post(publish_without_topic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}

/// Serves the publish API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, bridge: Bridge, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn publish(
    State(bridge): State<Bridge>,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(&bridge, &topic, &headers, &body)
}

async fn publish_without_topic(
    State(bridge): State<Bridge>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    respond(&bridge, "", &headers, &body)
}

fn respond(bridge: &Bridge, topic: &str, headers: &HeaderMap, body: &[u8]) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let accepted = decode_body(content_type, body)
        .and_then(|payload| ingress::accept(bridge, topic, payload));

    match accepted {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) if err.is_client_error() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Unexpected ingress failure");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Decodes a request body into the message payload.
pub fn decode_body(content_type: Option<&str>, body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    let is_form = content_type
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        let fields = url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect::<Map<String, Value>>();
        return Ok(Value::Object(fields));
    }

    serde_json::from_slice(body)
        .map_err(|e| BridgeError::MalformedRequest(format!("body is not valid JSON: {e}")))
}
