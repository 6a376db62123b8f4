use anyhow::{bail, Context};
use clap::Parser;
use sqlx::postgres::PgConnection;

use crate::model::{Part, Robot, RobotsPart};
use crate::store;

#[derive(Parser, Debug)]
pub(crate) struct Opts {
    /// Id of the robot part association.
    id: i32,
}

pub(crate) async fn run(db_conn: &mut PgConnection, opts: Opts) -> anyhow::Result<()> {
    let robots_part = match store::find::<RobotsPart>(db_conn, opts.id)
        .await
        .context("failed to look up robot part")?
    {
        Some(robots_part) => robots_part,
        None => bail!("robot part {} does not exist", opts.id),
    };

    let robot = store::find_related::<Robot, _>(db_conn, &robots_part)
        .await
        .context("failed to look up robot")?;

    let part = store::find_related::<Part, _>(db_conn, &robots_part)
        .await
        .context("failed to look up part")?;

    println!("{}", describe(&robots_part, robot.as_ref(), part.as_ref()));

    Ok(())
}

fn describe(robots_part: &RobotsPart, robot: Option<&Robot>, part: Option<&Part>) -> String {
    let robot = match robot {
        Some(robot) => format!(
            "{} ({}, {}, registered {})",
            robot.name,
            robot.kind,
            robot.year,
            robot.datetime.format("%Y-%m-%d %H:%M:%S")),
        None => format!("missing robot {}", robots_part.robots_id),
    };

    let part = match part {
        Some(part) => part.name.clone(),
        None => format!("missing part {}", robots_part.parts_id),
    };

    format!("{}: {} has {}", robots_part.id, robot, part)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn describes_association() {
        let robots_part = RobotsPart { id: 4, robots_id: 1, parts_id: 2 };
        let robot = Robot {
            id: 1,
            name: "Robotina".to_owned(),
            kind: "mechanical".to_owned(),
            year: 1972,
            datetime: NaiveDate::from_ymd_opt(1972, 1, 1)
                .and_then(|date| date.and_hms_opt(9, 30, 0))
                .unwrap(),
        };
        let part = Part { id: 2, name: "Engine".to_owned() };

        assert_eq!(
            describe(&robots_part, Some(&robot), Some(&part)),
            "4: Robotina (mechanical, 1972, registered 1972-01-01 09:30:00) has Engine");
        assert_eq!(
            describe(&robots_part, None, None),
            "4: missing robot 1 has missing part 2");
    }
}
