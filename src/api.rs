//! Ambient observability surface: a minimal `/status` endpoint reporting how
//! many rooms are currently live. Not part of the connect/create URL routing
//! (that is WebSocket-only, see `ws.rs`) and carries no session/game data.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::registry::Registry;

pub fn make_router(registry: &'static Registry) -> Router {
    Router::new().route("/status", get(get_status)).with_state(registry)
}

#[derive(Serialize)]
struct Status {
    live_rooms: usize,
}

async fn get_status(State(registry): State<&'static Registry>) -> Json<Status> {
    Json(Status { live_rooms: registry.live_room_count() })
}
