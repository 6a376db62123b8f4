use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgConnection;

use crate::schema;

#[derive(Parser, Debug)]
pub(crate) struct Opts {
    /// Drop all tables before recreating them.
    #[clap(long)]
    pub(crate) fresh: bool,

    /// Print the schema instead of applying it. No database connection is made.
    #[clap(long, conflicts_with = "fresh")]
    pub(crate) print: bool,
}

pub(crate) fn print_schema() {
    print!("{}", schema::ddl(&schema::tables()));
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    schema::migrate(db_conn, &schema::tables(), opts.fresh)
        .await
        .context("failed to migrate database")
}
