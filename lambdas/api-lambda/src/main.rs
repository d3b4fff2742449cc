use lambda_http::{run, service_fn, tracing, Error, Request};
use skillshare_shared::{config::Config, sockets, AppState};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Initialize AWS clients once at startup
    let aws = aws_config::load_from_env().await;
    let config = Config::from_env();
    let state = AppState::from_config(config, &aws);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            // The WebSocket API and the HTTP API share this function
            if sockets::websocket_route(&event).is_some() {
                sockets::handle_websocket_event(event, state).await
            } else {
                http_handler::function_handler(event, state).await
            }
        }
    }))
    .await
}
