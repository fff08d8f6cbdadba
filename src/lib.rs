#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Provider, Build, Rocket};

pub mod api;
pub mod config;
pub mod contract;
pub mod error;
pub mod logging;
pub mod model;

#[cfg(test)]
mod test_support;

pub use config::Config;

/// Build the server from `Rocket.toml` and `ROCKET_*` environment variables.
pub fn build() -> Rocket<Build> {
    rocket_from_figment(rocket::Config::figment())
}

pub(crate) fn rocket_from_figment(figment: impl Provider) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .attach(config::ConfigFairing)
        .attach(config::ContractFairing)
        .attach(logging::LoggerFairing)
}
