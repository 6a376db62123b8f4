use clap::Parser;
use sqlx::postgres::PgConnection;

use crate::model::NewRobotsPart;
use crate::not_saved;
use crate::store;

#[derive(Parser, Debug)]
pub(crate) struct Opts {
    /// Id of the robot the part belongs to.
    robots_id: i32,

    /// Id of the part.
    parts_id: i32,

    /// Only check that the robot and part exist, without storing anything.
    #[clap(long)]
    dry_run: bool,
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    let new = NewRobotsPart {
        robots_id: opts.robots_id,
        parts_id: opts.parts_id,
    };

    if opts.dry_run {
        store::check_link(db_conn, new)
            .await
            .map_err(|err| not_saved(err, "robot part is not valid"))?;
        println!("ok");
        return Ok(());
    }

    let robots_part = store::link(db_conn, new)
        .await
        .map_err(|err| not_saved(err, "failed to link part to robot"))?;

    println!("{}", robots_part.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[clap(flatten)]
        opts: Opts,
    }

    #[test]
    fn parses_ids_and_dry_run() {
        let cli = Cli::try_parse_from(["link", "3", "7", "--dry-run"]).unwrap();
        assert_eq!(cli.opts.robots_id, 3);
        assert_eq!(cli.opts.parts_id, 7);
        assert!(cli.opts.dry_run);

        assert!(Cli::try_parse_from(["link", "3"]).is_err());
        assert!(Cli::try_parse_from(["link", "robot", "7"]).is_err());
    }
}
