use chrono::NaiveDateTime;
use lazy_static::lazy_static;
use sqlx::FromRow;

use crate::dialect::{Column, ColumnType};
use crate::relation::{ForeignKey, Relations};

/// Table-level description of a stored entity.
pub(crate) trait Model {
    /// The name other models use to refer to this one in their relations.
    const NAME: &'static str;
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [Column];

    /// Relationships declared by this model. They are registered on first use and shared
    /// thereafter.
    fn relations() -> &'static Relations;
}

/// A value whose integer fields can be read by column name, used when checking relations.
///
/// `field` returns `None` when the field is null.
pub(crate) trait Record {
    type Model: Model;

    fn field(&self, name: &str) -> Option<i32>;
}

#[derive(FromRow, Clone, Debug)]
pub(crate) struct Robot {
    pub(crate) id: i32,
    pub(crate) name: String,
    #[sqlx(rename = "type")]
    pub(crate) kind: String,
    pub(crate) year: i32,
    pub(crate) datetime: NaiveDateTime,
}

impl Robot {
    fn initialize(relations: &mut Relations) {
        relations.has_many::<RobotsPart>("id", "robots_id", Some(ForeignKey::default()));
    }
}

impl Model for Robot {
    const NAME: &'static str = "Robots";
    const TABLE: &'static str = "robots";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Serial).primary(),
        Column::new("name", ColumnType::Varchar(70)).not_null(),
        Column::new("type", ColumnType::Varchar(32)).not_null(),
        Column::new("year", ColumnType::Integer).not_null(),
        Column::new("datetime", ColumnType::Timestamp).not_null(),
    ];

    fn relations() -> &'static Relations {
        lazy_static! {
            static ref RELATIONS: Relations = {
                let mut relations = Relations::new(Robot::NAME);
                Robot::initialize(&mut relations);
                relations
            };
        }
        &RELATIONS
    }
}

impl Record for Robot {
    type Model = Robot;

    fn field(&self, name: &str) -> Option<i32> {
        match name {
            "id" => Some(self.id),
            _ => None,
        }
    }
}

#[derive(FromRow, Clone, Debug)]
pub(crate) struct Part {
    pub(crate) id: i32,
    pub(crate) name: String,
}

impl Part {
    fn initialize(relations: &mut Relations) {
        relations.has_many::<RobotsPart>("id", "parts_id", Some(ForeignKey::default()));
    }
}

impl Model for Part {
    const NAME: &'static str = "Parts";
    const TABLE: &'static str = "parts";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Serial).primary(),
        Column::new("name", ColumnType::Varchar(70)).not_null(),
    ];

    fn relations() -> &'static Relations {
        lazy_static! {
            static ref RELATIONS: Relations = {
                let mut relations = Relations::new(Part::NAME);
                Part::initialize(&mut relations);
                relations
            };
        }
        &RELATIONS
    }
}

impl Record for Part {
    type Model = Part;

    fn field(&self, name: &str) -> Option<i32> {
        match name {
            "id" => Some(self.id),
            _ => None,
        }
    }
}

/// Association between a robot and one of its parts.
#[derive(FromRow, Clone, Debug)]
pub(crate) struct RobotsPart {
    pub(crate) id: i32,
    pub(crate) robots_id: i32,
    pub(crate) parts_id: i32,
}

impl RobotsPart {
    fn initialize(relations: &mut Relations) {
        relations
            .belongs_to::<Part>("parts_id", "id", Some(ForeignKey::default()))
            .belongs_to::<Robot>("robots_id", "id", Some(
                ForeignKey::with_message("The robot code does not exist")));
    }
}

impl Model for RobotsPart {
    const NAME: &'static str = "RobotsParts";
    const TABLE: &'static str = "robots_parts";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", ColumnType::Serial).primary(),
        Column::new("robots_id", ColumnType::Integer).not_null(),
        Column::new("parts_id", ColumnType::Integer).not_null(),
    ];

    fn relations() -> &'static Relations {
        lazy_static! {
            static ref RELATIONS: Relations = {
                let mut relations = Relations::new(RobotsPart::NAME);
                RobotsPart::initialize(&mut relations);
                relations
            };
        }
        &RELATIONS
    }
}

impl Record for RobotsPart {
    type Model = RobotsPart;

    fn field(&self, name: &str) -> Option<i32> {
        match name {
            "id" => Some(self.id),
            "robots_id" => Some(self.robots_id),
            "parts_id" => Some(self.parts_id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NewRobot<'a> {
    pub(crate) name: &'a str,
    pub(crate) kind: &'a str,
    pub(crate) year: i32,
    pub(crate) datetime: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub(crate) struct NewPart<'a> {
    pub(crate) name: &'a str,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct NewRobotsPart {
    pub(crate) robots_id: i32,
    pub(crate) parts_id: i32,
}

impl Record for NewRobotsPart {
    type Model = RobotsPart;

    fn field(&self, name: &str) -> Option<i32> {
        match name {
            "robots_id" => Some(self.robots_id),
            "parts_id" => Some(self.parts_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn records_expose_relation_fields_only() {
        let robot = Robot {
            id: 3,
            name: "Terminator".to_owned(),
            kind: "cyborg".to_owned(),
            year: 2029,
            datetime: NaiveDate::from_ymd_opt(2029, 1, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap(),
        };
        assert_eq!(robot.field("id"), Some(3));
        assert_eq!(robot.field("year"), None);

        let robots_part = RobotsPart { id: 1, robots_id: 3, parts_id: 2 };
        assert_eq!(robots_part.field("robots_id"), Some(3));
        assert_eq!(robots_part.field("parts_id"), Some(2));
        assert_eq!(robots_part.field("name"), None);
    }
}
