//! Helpers for tests that run against a live database. They connect to `DATABASE_URL` and are
//! skipped when it is not set. Everything a test creates lives in its own schema inside an
//! uncommitted transaction, so nothing outlives the test.

use std::env;
use std::process;

use sqlx::Connection;
use sqlx::postgres::PgConnection;

pub(crate) async fn connect() -> Option<PgConnection> {
    let url = env::var("DATABASE_URL").ok()?;
    Some(PgConnection::connect(&url)
        .await
        .unwrap_or_else(|err| panic!("failed to connect to {}: {}", url, err)))
}

pub(crate) fn schema_name(name: &str) -> String {
    format!("robotparts_test_{}_{}", name, process::id())
}

/// Creates an empty schema and makes it the current one until the enclosing transaction ends.
pub(crate) async fn use_fresh_schema(db_conn: &mut PgConnection, name: &str) {
    let schema = schema_name(name);

    sqlx::query(&format!("CREATE SCHEMA \"{}\"", schema))
        .execute(&mut *db_conn)
        .await
        .unwrap();

    sqlx::query(&format!("SET LOCAL search_path TO \"{}\"", schema))
        .execute(&mut *db_conn)
        .await
        .unwrap();
}
