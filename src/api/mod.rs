pub mod quiz_routes;
mod quiz_websocket;
