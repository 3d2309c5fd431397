//! Database fixtures for tests.
//!
//! Database tests run against `TEST_DATABASE_URL` and are `#[ignore]`d by
//! default; run them with `cargo test -- --ignored`. Every connection lives
//! in a test transaction that is never committed, with the schema migration
//! applied to a scratch schema inside it, so tests neither see nor leave any
//! rows.

use crate::account::{NewUserAccount, UserAccount};
use crate::db::schema::users;
use crate::db::Pool;
use crate::users::models::{NewUser, User};
use diesel::connection::SimpleConnection;
use diesel::insert_into;
use diesel::prelude::*;
use dotenv::dotenv;
use r2d2::CustomizeConnection;
use r2d2_diesel::{ConnectionManager, Error as ManagerError};
use std::env;

static MIGRATION: &str = include_str!("../migrations/2024-03-02-101500_create_portal/up.sql");

fn database_url() -> String {
    dotenv().ok();
    env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set for database tests")
}

fn prepare(connection: &PgConnection) -> QueryResult<()> {
    connection.begin_test_transaction()?;
    connection.batch_execute("CREATE SCHEMA portal_test; SET LOCAL search_path TO portal_test;")?;
    connection.batch_execute(MIGRATION)
}

pub fn connection() -> PgConnection {
    let connection = PgConnection::establish(&database_url()).expect("TEST_DATABASE_URL is not reachable");
    prepare(&connection).expect("could not prepare test schema");
    connection
}

#[derive(Debug)]
struct TestTransaction;

impl CustomizeConnection<PgConnection, ManagerError> for TestTransaction {
    fn on_acquire(&self, connection: &mut PgConnection) -> Result<(), ManagerError> {
        prepare(connection).map_err(ManagerError::QueryError)
    }
}

/// A pool holding a single prepared connection, shared by every request a
/// test client sends. Handlers must not hold a connection while asking for
/// the current user.
pub fn pool() -> Pool {
    let manager = ConnectionManager::<PgConnection>::new(database_url());
    Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(TestTransaction))
        .build(manager)
        .expect("could not create test pool")
}

pub fn user(connection: &PgConnection, username: &str) -> User {
    let new_user = NewUser::new(username, "password").unwrap();
    insert_into(users::table)
        .values(&new_user)
        .get_result::<User>(connection)
        .unwrap()
}

pub fn account(connection: &PgConnection, user: &User) -> UserAccount {
    NewUserAccount {
        user_id: user.id,
        first_name: user.username.clone(),
        last_name: String::new(),
        email: format!("{}@example.com", user.username),
    }
    .insert(connection)
    .unwrap()
}
