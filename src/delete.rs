use anyhow::bail;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgConnection;

use crate::model::{Part, Robot};
use crate::not_saved;
use crate::store;

#[derive(Parser, Debug)]
pub(crate) struct Opts {
    #[clap(subcommand)]
    record: DeleteRecord,
}

#[derive(Subcommand, Debug)]
enum DeleteRecord {
    /// Delete a robot that has no parts.
    Robot { id: i32 },

    /// Delete a part that no robot uses.
    Part { id: i32 },
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    match opts.record {
        DeleteRecord::Robot { id } => {
            match store::delete::<Robot>(db_conn, id)
                .await
                .map_err(|err| not_saved(err, "failed to delete robot"))?
            {
                Some(robot) => println!("deleted robot {} ({})", robot.id, robot.name),
                None => bail!("robot {} does not exist", id),
            }
        },

        DeleteRecord::Part { id } => {
            match store::delete::<Part>(db_conn, id)
                .await
                .map_err(|err| not_saved(err, "failed to delete part"))?
            {
                Some(part) => println!("deleted part {} ({})", part.id, part.name),
                None => bail!("part {} does not exist", id),
            }
        },
    }

    Ok(())
}
