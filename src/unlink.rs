use anyhow::{bail, Context};
use clap::Parser;
use sqlx::postgres::PgConnection;

use crate::store;

#[derive(Parser, Debug)]
pub(crate) struct Opts {
    /// Id of the robot part association to remove.
    id: i32,
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    let deleted = store::unlink(db_conn, opts.id)
        .await
        .with_context(|| format!("failed to unlink robot part {}", opts.id))?;

    if !deleted {
        bail!("robot part {} does not exist", opts.id);
    }

    Ok(())
}
