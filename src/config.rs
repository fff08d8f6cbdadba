use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;
use thiserror::Error;

use crate::contract::{
    read_records, JsonLinesSink, ReplayError, VotingError, VotingSystem,
};
use crate::model::{Address, UserSpec};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the contract itself.
#[derive(Deserialize)]
struct ContractConfig {
    /// Registered as the first manager on a fresh deployment.
    deployer_address: Address,
    #[serde(default = "default_deployer_name")]
    deployer_name: String,
    /// Where the journal is persisted. Without one, state lasts as long as the process.
    event_log: Option<PathBuf>,
    /// Registered by the deployer at every launch, if not already present.
    #[serde(default)]
    seed_users: Vec<UserSpec>,
}

fn default_deployer_name() -> String {
    "Deployer".to_string()
}

/// Ways bringing the contract online can fail.
#[derive(Debug, Error)]
enum LaunchError {
    #[error("Failed to open event log: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to replay event log: {0}")]
    Replay(#[from] ReplayError),
    #[error("Failed to deploy contract: {0}")]
    Deploy(#[from] VotingError),
}

/// A fairing that deploys the contract, or restores it from its event log,
/// seeds any configured users, and places the [`VotingSystem`] into managed
/// state.
pub struct ContractFairing;

#[rocket::async_trait]
impl Fairing for ContractFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voting contract",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<ContractConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load contract config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let system = match launch_contract(&config) {
            Ok(system) => system,
            Err(e) => {
                error!("{e}");
                return Err(rocket);
            }
        };
        seed_users(&system, config.seed_users);
        info!("...contract online!");

        // Manage the state.
        rocket = rocket.manage(system);
        Ok(rocket)
    }
}

/// Deploy a fresh contract, or restore one from a non-empty event log.
fn launch_contract(config: &ContractConfig) -> Result<VotingSystem, LaunchError> {
    let path = match &config.event_log {
        Some(path) => path,
        None => {
            info!("No event log configured, deploying in-memory contract...");
            return Ok(VotingSystem::deploy(
                config.deployer_address,
                config.deployer_name.as_str(),
            ));
        }
    };

    let records = if path.exists() {
        read_records(BufReader::new(File::open(path)?))?
    } else {
        Vec::new()
    };

    if records.is_empty() {
        info!("Deploying contract with event log {}...", path.display());
        let sink = JsonLinesSink::open(path)?;
        return Ok(VotingSystem::deploy_with_sink(
            config.deployer_address,
            config.deployer_name.as_str(),
            Box::new(sink),
        )?);
    }

    info!("Restoring contract from event log {}...", path.display());
    let system = VotingSystem::replay(records)?;
    if system.deployer() != config.deployer_address {
        warn!(
            "Configured deployer {} differs from {} recorded in {}; the event log wins",
            config.deployer_address,
            system.deployer(),
            path.display()
        );
    }
    system.attach_sink(Box::new(JsonLinesSink::open(path)?));
    Ok(system)
}

/// Register each configured user as the deployer, warning and continuing on
/// duplicates or failures.
fn seed_users(system: &VotingSystem, users: Vec<UserSpec>) {
    let deployer = system.deployer();
    for spec in users {
        let name = spec.name.clone();
        match system.register(&deployer, spec) {
            Ok(()) => info!("User added: {name}"),
            Err(VotingError::DuplicateUser(_)) => warn!("{name} already exists"),
            Err(e) => error!("Error adding {name}: {e}"),
        }
    }
}
