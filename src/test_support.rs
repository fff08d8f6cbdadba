//! Shared fixtures for route tests run through `#[backend_test]`.

use rocket::{
    figment::Figment,
    http::{ContentType, Header, Status},
    local::asynchronous::Client,
    serde::json::serde_json,
};

use crate::config::Config;
use crate::model::{auth::AuthToken, Address, Role, UserSpec};

pub const JWT_SECRET: &str = "test-secret-do-not-use-in-production";

/// The cast of every route test.
#[derive(Debug, Clone, Copy)]
pub struct Accounts {
    /// Registered at deployment, as a manager.
    pub deployer: Address,
    pub manager: Address,
    pub customer: Address,
    pub customer2: Address,
    /// Never registered.
    pub stranger: Address,
}

impl Accounts {
    pub fn new() -> Self {
        Self {
            deployer: Address::example(0xd0),
            manager: UserSpec::manager_example().address,
            customer: UserSpec::customer_example().address,
            customer2: Address::example(0xc2),
            stranger: Address::example(0x99),
        }
    }
}

/// Configuration for a fresh in-memory contract deployed by `accounts.deployer`.
pub fn figment(accounts: &Accounts) -> Figment {
    Figment::from(rocket::Config::debug_default())
        .merge(("log_level", "off"))
        .merge(("jwt_secret", JWT_SECRET))
        .merge(("auth_ttl", 3600))
        .merge(("deployer_address", accounts.deployer.to_string()))
}

pub async fn client(accounts: &Accounts) -> Client {
    // Route tests run the whole stack, so show its logs on failure.
    log4rs_test_utils::test_logging::init_logging_once_for(["voting_system"], None, None);

    Client::tracked(crate::rocket_from_figment(figment(accounts)))
        .await
        .unwrap()
}

/// A signed `Authorization` header acting as `address`.
pub fn auth(address: Address) -> Header<'static> {
    AuthToken::new(address).into_header(&Config::example())
}

/// Register the manager and both customers, in that order.
pub async fn seed(client: &Client, accounts: &Accounts) {
    let users = [
        UserSpec::manager_example(),
        UserSpec::customer_example(),
        UserSpec {
            address: accounts.customer2,
            name: "Carol Customer".to_string(),
            role: Role::Customer.into(),
        },
    ];
    for user in users {
        let response = client
            .post("/users")
            .header(ContentType::JSON)
            .header(auth(accounts.deployer))
            .body(serde_json::to_string(&user).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
    }
}
