use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use quiz_server::api::quiz_routes;
use quiz_server::config::Config;
use quiz_server::quiz::{ConnectionHub, JsonFileLoader, QuizCoordinator};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let hub = Arc::new(ConnectionHub::new());
    let loader = Arc::new(JsonFileLoader::new(&config.quiz.questions_path));
    let coordinator = QuizCoordinator::new(loader, hub.clone(), config.quiz.timing);

    let routes = quiz_routes::routes(coordinator, hub, &config.server.cors_origin);

    let address = config.bind_address();
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        questions = %config.quiz.questions_path.display(),
        "Quiz server starting"
    );
    warp::serve(routes).run(address).await;
}
