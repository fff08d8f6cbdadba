use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    contract::VotingSystem,
    error::Result,
    model::{
        auth::Caller,
        pagination::{Paginated, Pagination},
        Address, Identity, Role, UserSpec,
    },
};

pub fn routes() -> Vec<Route> {
    routes![add_user, get_all_users, get_user_details, get_user, get_role]
}

#[post("/users", data = "<spec>", format = "json")]
pub async fn add_user(
    caller: Caller,
    spec: Json<UserSpec>,
    system: &State<VotingSystem>,
) -> Result<Status> {
    system.register(&caller, spec.0)?;
    Ok(Status::Created)
}

#[get("/users")]
pub async fn get_all_users(system: &State<VotingSystem>) -> Json<Vec<Address>> {
    Json(system.all_users())
}

#[get("/users/details")]
pub async fn get_user_details(
    pagination: Pagination,
    system: &State<VotingSystem>,
) -> Json<Paginated<Identity>> {
    Json(pagination.page(system.users()))
}

#[get("/users/<address>")]
pub async fn get_user(address: Address, system: &State<VotingSystem>) -> Result<Json<Identity>> {
    Ok(Json(system.identity(&address)?))
}

#[get("/users/<address>/role")]
pub async fn get_role(address: Address, system: &State<VotingSystem>) -> Result<Json<Role>> {
    Ok(Json(system.role(&address)?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::test_support::{auth, Accounts};

    use super::*;

    async fn post_user(client: &Client, caller: Header<'static>, spec: &UserSpec) -> Status {
        client
            .post(uri!(add_user))
            .header(ContentType::JSON)
            .header(caller)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await
            .status()
    }

    async fn all_users(client: &Client) -> Vec<Address> {
        let response = client.get(uri!(get_all_users)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test]
    async fn deployer_registers_users(client: Client, accounts: Accounts) {
        assert_eq!(all_users(&client).await, vec![accounts.deployer]);

        let manager = UserSpec::manager_example();
        let customer = UserSpec::customer_example();
        assert_eq!(
            post_user(&client, auth(accounts.deployer), &manager).await,
            Status::Created
        );
        assert_eq!(
            post_user(&client, auth(accounts.deployer), &customer).await,
            Status::Created
        );

        assert_eq!(
            all_users(&client).await,
            vec![accounts.deployer, manager.address, customer.address]
        );

        // Check the role lookup.
        let response = client
            .get(format!("/users/{}/role", customer.address))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(response.into_string().await.unwrap(), "2");

        // And the full identity.
        let response = client
            .get(format!("/users/{}", manager.address))
            .dispatch()
            .await;
        let identity: Identity = response.into_json().await.unwrap();
        assert_eq!(identity.name, "Roni Manager");
        assert_eq!(identity.role, Role::Manager);
    }

    #[backend_test(seeded)]
    async fn duplicate_user_conflicts(client: Client, accounts: Accounts) {
        let before = all_users(&client).await;

        let mut again = UserSpec::customer_example();
        again.address = accounts.customer;
        again.name = "Someone new".to_string();
        let response = client
            .post(uri!(add_user))
            .header(ContentType::JSON)
            .header(auth(accounts.manager))
            .body(serde_json::to_string(&again).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        assert!(response
            .into_string()
            .await
            .unwrap()
            .starts_with("User already exists"));

        assert_eq!(all_users(&client).await, before);
    }

    #[backend_test(seeded)]
    async fn only_managers_register(client: Client, accounts: Accounts) {
        let before = all_users(&client).await;
        let mut spec = UserSpec::customer_example();
        spec.address = Address::example(0x77);

        for caller in [accounts.customer, accounts.stranger] {
            assert_eq!(
                post_user(&client, auth(caller), &spec).await,
                Status::Forbidden
            );
        }

        // No token at all.
        let response = client
            .post(uri!(add_user))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // A token signed with the wrong key.
        let forged = Header::new(
            "Authorization",
            format!(
                "Bearer {}",
                crate::model::auth::AuthToken::new(accounts.manager)
                    .encode(&crate::config::Config::example_with_secret("wrong"))
            ),
        );
        assert_eq!(
            post_user(&client, forged, &spec).await,
            Status::Unauthorized
        );

        assert_eq!(all_users(&client).await, before);
    }

    #[backend_test(seeded)]
    async fn non_managers_never_see_role_errors(client: Client, accounts: Accounts) {
        let mut spec = UserSpec::customer_example();
        spec.address = Address::example(0x79);
        spec.role = 9;
        for caller in [accounts.customer, accounts.stranger] {
            assert_eq!(
                post_user(&client, auth(caller), &spec).await,
                Status::Forbidden
            );
        }
        assert_eq!(
            post_user(&client, auth(accounts.manager), &spec).await,
            Status::UnprocessableEntity
        );
    }

    #[backend_test(seeded)]
    async fn malformed_token_unauthorized(client: Client, accounts: Accounts) {
        let before = all_users(&client).await;
        let mut spec = UserSpec::customer_example();
        spec.address = Address::example(0x7a);
        for value in ["Bearer not.a.token", "Bearer ", "Basic dXNlcjpwYXNz"] {
            let garbage = Header::new("Authorization", value);
            assert_eq!(
                post_user(&client, garbage, &spec).await,
                Status::Unauthorized
            );
        }
        assert_eq!(all_users(&client).await, before);
        // The seeded manager is still a valid caller.
        assert_eq!(
            post_user(&client, auth(accounts.manager), &spec).await,
            Status::Created
        );
    }

    #[backend_test(seeded)]
    async fn invalid_role_rejected(client: Client, accounts: Accounts) {
        let mut spec = UserSpec::customer_example();
        spec.address = Address::example(0x78);
        for role in [0, 3, 200] {
            spec.role = role;
            assert_eq!(
                post_user(&client, auth(accounts.manager), &spec).await,
                Status::UnprocessableEntity
            );
        }
        let response = client
            .get(format!("/users/{}/role", spec.address))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(seeded)]
    async fn paginated_details(client: Client, accounts: Accounts) {
        let response = client
            .get("/users/details?page_num=1&page_size=2")
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let page: Paginated<Identity> = response.into_json().await.unwrap();
        assert_eq!(page.pagination.total, 4);
        let addresses: Vec<_> = page.items.iter().map(|i| i.address).collect();
        assert_eq!(addresses, vec![accounts.deployer, accounts.manager]);

        let response = client
            .get("/users/details?page_num=2&page_size=3")
            .dispatch()
            .await;
        let page: Paginated<Identity> = response.into_json().await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].address, accounts.customer2);

        let response = client.get("/users/details?page_num=0").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
    }
}
