use std::convert::Infallible;
use std::sync::Arc;

use warp::Filter;

use super::quiz_websocket;
use crate::quiz::{ConnectionHub, QuizCoordinator};

/// All quiz routes with CORS restricted to `cors_origin`.
pub fn routes(
    coordinator: Arc<QuizCoordinator>,
    hub: Arc<ConnectionHub>,
    cors_origin: &str,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_origin(cors_origin)
        .allow_methods(vec!["GET", "POST"]);

    quiz_websocket_route(coordinator.clone(), hub.clone())
        .or(quiz_health_check(hub))
        .or(quiz_config_endpoint(coordinator))
        .with(cors)
}

/// Creates the quiz WebSocket route
pub fn quiz_websocket_route(
    coordinator: Arc<QuizCoordinator>,
    hub: Arc<ConnectionHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("quiz")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_coordinator(coordinator))
        .and(with_hub(hub))
        .map(|ws: warp::ws::Ws, coordinator: Arc<QuizCoordinator>, hub: Arc<ConnectionHub>| {
            ws.on_upgrade(move |websocket| {
                quiz_websocket::handle_quiz_websocket(websocket, coordinator, hub)
            })
        })
}

pub fn quiz_health_check(
    hub: Arc<ConnectionHub>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("quiz")
        .and(warp::path("health"))
        .and(warp::get())
        .and(with_hub(hub))
        .and_then(|hub: Arc<ConnectionHub>| async move {
            let connections = hub.connection_count().await;
            Ok::<_, Infallible>(warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Quiz Server",
                "version": env!("CARGO_PKG_VERSION"),
                "connections": connections
            })))
        })
}

pub fn quiz_config_endpoint(
    coordinator: Arc<QuizCoordinator>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("quiz")
        .and(warp::path("config"))
        .and(warp::get())
        .map(move || {
            let timing = coordinator.timing();
            warp::reply::json(&serde_json::json!({
                "countdownSecs": timing.countdown_secs,
                "tickMillis": timing.tick.as_millis() as u64
            }))
        })
}

fn with_coordinator(
    coordinator: Arc<QuizCoordinator>,
) -> impl Filter<Extract = (Arc<QuizCoordinator>,), Error = Infallible> + Clone {
    warp::any().map(move || coordinator.clone())
}

fn with_hub(
    hub: Arc<ConnectionHub>,
) -> impl Filter<Extract = (Arc<ConnectionHub>,), Error = Infallible> + Clone {
    warp::any().map(move || hub.clone())
}
