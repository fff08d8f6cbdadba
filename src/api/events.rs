use rocket::{serde::json::Json, Route, State};

use crate::{contract::VotingSystem, model::EventRecord};

pub fn routes() -> Vec<Route> {
    routes![get_events]
}

/// The journal, optionally starting from sequence number `since`.
#[get("/events?<since>")]
pub async fn get_events(since: Option<u64>, system: &State<VotingSystem>) -> Json<Vec<EventRecord>> {
    Json(system.events_since(since.unwrap_or(0)))
}
