use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgConnection;

use crate::model::{NewPart, NewRobot};
use crate::store;

#[derive(Parser, Debug)]
pub(crate) struct Opts {
    #[clap(subcommand)]
    record: AddRecord,
}

#[derive(Subcommand, Debug)]
enum AddRecord {
    /// Add a new robot.
    Robot {
        name: String,

        /// The kind of robot, e.g. "mechanical" or "virtual".
        #[clap(short = 't', long = "type", default_value = "mechanical")]
        kind: String,

        /// The year the robot was built.
        #[clap(short, long)]
        year: i32,

        /// When the robot was registered, as "YYYY-MM-DD HH:MM:SS". Defaults to now.
        #[clap(long, parse(try_from_str = parse_datetime))]
        datetime: Option<NaiveDateTime>,
    },

    /// Add a new part.
    Part {
        name: String,
    },
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    let id = match opts.record {
        AddRecord::Robot { name, kind, year, datetime } => {
            let new = NewRobot {
                name: &name,
                kind: &kind,
                year,
                datetime: datetime.unwrap_or_else(|| Utc::now().naive_utc()),
            };

            store::insert_robot(db_conn, &new)
                .await
                .with_context(|| format!("failed to add robot {}", name))?
                .id
        },

        AddRecord::Part { name } => {
            store::insert_part(db_conn, &NewPart { name: &name })
                .await
                .with_context(|| format!("failed to add part {}", name))?
                .id
        },
    };

    println!("{}", id);

    Ok(())
}
