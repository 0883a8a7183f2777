use std::convert::Infallible;
use std::sync::Arc;

use log::{error, warn};
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::{Config, CorsOrigins};
use crate::server::Server;

const NOTIFY_BODY_LIMIT: u64 = 64 * 1024;

/// Every HTTP and WebSocket route the relay serves, with CORS applied.
pub fn build(
    server: Arc<Server>,
    config: &Config,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ws_route = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_server(Arc::clone(&server)))
        .map(|ws: warp::ws::Ws, server: Arc<Server>| {
            ws.on_upgrade(move |socket| async move {
                server.handle_connection(socket).await;
            })
        });

    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_server(Arc::clone(&server)))
        .and_then(health);

    let token = config.notify_token.clone();
    let notify_route = warp::path!("users" / String / "notify")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-notify-token"))
        .and(warp::any().map(move || token.clone()))
        .and(warp::body::content_length_limit(NOTIFY_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_server(server))
        .and_then(notify);

    ws_route
        .or(health_route)
        .or(notify_route)
        .with(cors(&config.cors))
}

fn with_server(
    server: Arc<Server>,
) -> impl Filter<Extract = (Arc<Server>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&server))
}

fn cors(origins: &CorsOrigins) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type", "x-notify-token"]);
    match origins {
        CorsOrigins::Any => builder.allow_any_origin(),
        CorsOrigins::List(list) => builder.allow_origins(list.iter().map(String::as_str)),
    }
}

async fn health(server: Arc<Server>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "ok",
        "connections": server.connection_count().await,
        "rooms": server.room_count().await,
    })))
}

async fn notify(
    user_id: String,
    provided: Option<String>,
    expected: Option<String>,
    payload: Value,
    server: Arc<Server>,
) -> Result<impl Reply, Infallible> {
    let Some(expected) = expected else {
        return Ok(status_reply(StatusCode::NOT_FOUND, json!({ "error": "not found" })));
    };
    if provided.as_deref() != Some(expected.as_str()) {
        warn!("Rejected notification for user {user_id}: bad token");
        return Ok(status_reply(StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" })));
    }

    match server.notify_user(&user_id, payload).await {
        Ok(delivered) => Ok(status_reply(StatusCode::ACCEPTED, json!({ "delivered": delivered }))),
        Err(e) => {
            error!("Failed to notify user {user_id}: {e}");
            Ok(status_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "notification failed" }),
            ))
        }
    }
}

fn status_reply(status: StatusCode, body: Value) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}
