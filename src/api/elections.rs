use rocket::{http::Status, response::status::Created, serde::json::Json, Route, State};

use crate::{
    contract::VotingSystem,
    error::Result,
    model::{
        auth::Caller, ElectionDescription, ElectionId, ElectionSpec, TallyDescription, VoteSpec,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        get_elections,
        get_election,
        open_election,
        close_election,
        cast_vote,
        get_tally,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    caller: Caller,
    spec: Json<ElectionSpec>,
    system: &State<VotingSystem>,
) -> Result<Created<Json<ElectionDescription>>> {
    let id = system.create_election(&caller, spec.0.options)?;
    let election = system.election(id)?;
    Ok(Created::new(format!("/elections/{id}")).body(Json(election)))
}

#[get("/elections")]
pub async fn get_elections(system: &State<VotingSystem>) -> Json<Vec<ElectionDescription>> {
    Json(system.elections())
}

#[get("/elections/<election_id>")]
pub async fn get_election(
    election_id: ElectionId,
    system: &State<VotingSystem>,
) -> Result<Json<ElectionDescription>> {
    Ok(Json(system.election(election_id)?))
}

#[post("/elections/<election_id>/open")]
pub async fn open_election(
    caller: Caller,
    election_id: ElectionId,
    system: &State<VotingSystem>,
) -> Result<Json<ElectionDescription>> {
    system.open_election(&caller, election_id)?;
    Ok(Json(system.election(election_id)?))
}

#[post("/elections/<election_id>/close")]
pub async fn close_election(
    caller: Caller,
    election_id: ElectionId,
    system: &State<VotingSystem>,
) -> Result<Json<ElectionDescription>> {
    system.close_election(&caller, election_id)?;
    Ok(Json(system.election(election_id)?))
}

#[post("/elections/<election_id>/votes", data = "<vote>", format = "json")]
pub async fn cast_vote(
    caller: Caller,
    election_id: ElectionId,
    vote: Json<VoteSpec>,
    system: &State<VotingSystem>,
) -> Result<Status> {
    system.cast_vote(&caller, election_id, vote.choice)?;
    Ok(Status::Created)
}

#[get("/elections/<election_id>/tally")]
pub async fn get_tally(
    election_id: ElectionId,
    system: &State<VotingSystem>,
) -> Result<Json<TallyDescription>> {
    Ok(Json(system.tally(election_id)?))
}
