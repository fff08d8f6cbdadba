use rocket::Route;

mod elections;
mod events;
mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(users::routes());
    routes.extend(elections::routes());
    routes.extend(events::routes());
    routes
}
