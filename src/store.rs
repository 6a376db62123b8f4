use async_trait::async_trait;
use sqlx::Connection;
use sqlx::FromRow;
use sqlx::postgres::{PgConnection, PgRow};
use tracing::{debug, info};

use crate::dialect::{self, escape};
use crate::model::{Model, NewPart, NewRobot, NewRobotsPart, Part, Record, Robot, RobotsPart};
use crate::relation::RelationKind;
use crate::validation::{self, NotSaved, ReferenceLookup};

/// Looks referenced rows up with a shared lock, so that inside a transaction they cannot be
/// deleted before it commits.
#[async_trait]
impl ReferenceLookup for PgConnection {
    async fn exists(
        &mut self,
        table: &'static str,
        column: &'static str,
        value: i32
    ) -> Result<bool, sqlx::Error>
    {
        let sql = dialect::shared_lock(&dialect::limit(
            &format!("SELECT 1 FROM {} WHERE {} = $1", escape(table), escape(column)),
            1));

        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(self)
            .await?;

        debug!(table, column, value, found = row.is_some(), "reference lookup");
        Ok(row.is_some())
    }
}

pub(crate) async fn insert_robot(db_conn: &mut PgConnection, robot: &NewRobot<'_>) -> Result<Robot, sqlx::Error> {
    let robot = sqlx::query_as::<_, Robot>(
        "INSERT INTO robots (name, type, year, datetime) \
        VALUES ($1, $2, $3, $4) \
        RETURNING id, name, type, year, datetime"
    )
    .bind(robot.name)
    .bind(robot.kind)
    .bind(robot.year)
    .bind(robot.datetime)
    .fetch_one(db_conn)
    .await?;

    info!(id = robot.id, name = %robot.name, "created robot");
    Ok(robot)
}

pub(crate) async fn insert_part(db_conn: &mut PgConnection, part: &NewPart<'_>) -> Result<Part, sqlx::Error> {
    let part = sqlx::query_as::<_, Part>(
        "INSERT INTO parts (name) VALUES ($1) RETURNING id, name"
    )
    .bind(part.name)
    .fetch_one(db_conn)
    .await?;

    info!(id = part.id, name = %part.name, "created part");
    Ok(part)
}

/// Checks the association's foreign keys and stores it, in a single transaction. The referenced
/// robot and part stay share-locked until the row is committed.
pub(crate) async fn link(db_conn: &mut PgConnection, new: NewRobotsPart) -> Result<RobotsPart, NotSaved> {
    let mut tx = db_conn.begin().await?;

    validation::check_foreign_keys(&new, &mut *tx).await?;

    let robots_part = sqlx::query_as::<_, RobotsPart>(
        "INSERT INTO robots_parts (robots_id, parts_id) \
        VALUES ($1, $2) \
        RETURNING id, robots_id, parts_id"
    )
    .bind(new.robots_id)
    .bind(new.parts_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        id = robots_part.id,
        robots_id = robots_part.robots_id,
        parts_id = robots_part.parts_id,
        "linked part to robot");

    Ok(robots_part)
}

/// Runs the same checks as `link` without storing anything.
pub(crate) async fn check_link(db_conn: &mut PgConnection, new: NewRobotsPart) -> Result<(), NotSaved> {
    validation::check_foreign_keys(&new, db_conn).await
}

/// Deletes an association. Returns whether a row was deleted.
pub(crate) async fn unlink(db_conn: &mut PgConnection, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM robots_parts WHERE id = $1")
        .bind(id)
        .execute(db_conn)
        .await?;

    let deleted = res.rows_affected() > 0;
    if deleted {
        info!(id, "unlinked part from robot");
    }
    Ok(deleted)
}

pub(crate) async fn find<M>(db_conn: &mut PgConnection, id: i32) -> Result<Option<M>, sqlx::Error>
where
    M: Model + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} WHERE {} = $1", escape(M::TABLE), escape(M::PRIMARY_KEY));

    sqlx::query_as::<_, M>(&sql)
        .bind(id)
        .fetch_optional(db_conn)
        .await
}

pub(crate) async fn list<M>(db_conn: &mut PgConnection) -> Result<Vec<M>, sqlx::Error>
where
    M: Model + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} ORDER BY {}", escape(M::TABLE), escape(M::PRIMARY_KEY));

    sqlx::query_as::<_, M>(&sql)
        .fetch_all(db_conn)
        .await
}

/// Fetches the row of `M` that the record belongs to. Returns `None` if the record's model has
/// no `belongs_to` relation to `M`, the field is null, or the row does not exist.
pub(crate) async fn find_related<M, R>(db_conn: &mut PgConnection, record: &R) -> Result<Option<M>, sqlx::Error>
where
    M: Model + for<'r> FromRow<'r, PgRow> + Send + Unpin,
    R: Record,
{
    let relation = match <R::Model as Model>::relations().get(M::NAME) {
        Some(relation) if relation.kind == RelationKind::BelongsTo => relation,
        _ => return Ok(None),
    };

    let value = match record.field(relation.fields) {
        Some(value) => value,
        None => return Ok(None),
    };

    let sql = format!(
        "SELECT * FROM {} WHERE {} = $1",
        escape(relation.referenced_table),
        escape(relation.referenced_fields));

    sqlx::query_as::<_, M>(&sql)
        .bind(value)
        .fetch_optional(db_conn)
        .await
}

/// Deletes the row with the given id unless other rows still reference it. The row is locked
/// for the duration of the check. Returns the deleted row, or `None` if there was no such row.
pub(crate) async fn delete<M>(db_conn: &mut PgConnection, id: i32) -> Result<Option<M>, NotSaved>
where
    M: Model + Record<Model = M> + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut tx = db_conn.begin().await?;

    let sql = dialect::for_update(&format!(
        "SELECT * FROM {} WHERE {} = $1",
        escape(M::TABLE),
        escape(M::PRIMARY_KEY)));

    let record = sqlx::query_as::<_, M>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    let record = match record {
        Some(record) => record,
        None => return Ok(None),
    };

    validation::check_restrict_delete(&record, &mut *tx).await?;

    let sql = format!("DELETE FROM {} WHERE {} = $1", escape(M::TABLE), escape(M::PRIMARY_KEY));
    sqlx::query(&sql)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(model = M::NAME, id, "deleted record");
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::schema;
    use crate::testdb;
    use crate::validation::ValidationFailed;

    async fn robot_and_part(db_conn: &mut PgConnection) -> (Robot, Part) {
        let robot = insert_robot(&mut *db_conn, &NewRobot {
            name: "Robotina",
            kind: "mechanical",
            year: 1972,
            datetime: NaiveDate::from_ymd_opt(1972, 1, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap(),
        })
        .await
        .unwrap();

        let part = insert_part(&mut *db_conn, &NewPart { name: "Engine" })
            .await
            .unwrap();

        (robot, part)
    }

    async fn count_links(db_conn: &mut PgConnection) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM robots_parts")
            .fetch_one(db_conn)
            .await
            .unwrap()
    }

    fn invalid<T: std::fmt::Debug>(res: Result<T, NotSaved>) -> ValidationFailed {
        match res {
            Err(NotSaved::Invalid(err)) => err,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn link_with_missing_robot_stores_nothing() {
        let mut db_conn = match testdb::connect().await {
            Some(db_conn) => db_conn,
            None => return,
        };
        let mut tx = db_conn.begin().await.unwrap();
        testdb::use_fresh_schema(&mut tx, "link_missing_robot").await;
        schema::migrate(&mut tx, &schema::tables(), false).await.unwrap();

        let (robot, part) = robot_and_part(&mut tx).await;

        let err = invalid(link(&mut tx, NewRobotsPart { robots_id: robot.id + 1, parts_id: part.id }).await);
        assert_eq!(err.messages().len(), 1);
        assert_eq!(err.messages()[0].field, "robots_id");
        assert_eq!(err.messages()[0].text, "The robot code does not exist");

        let err = invalid(check_link(&mut tx, NewRobotsPart { robots_id: robot.id, parts_id: part.id + 1 }).await);
        assert_eq!(
            err.to_string(),
            r#"Value of field "parts_id" does not exist on referenced table"#);

        assert_eq!(count_links(&mut tx).await, 0);
    }

    #[tokio::test]
    async fn valid_link_is_stored_and_resolves_both_parents() {
        let mut db_conn = match testdb::connect().await {
            Some(db_conn) => db_conn,
            None => return,
        };
        let mut tx = db_conn.begin().await.unwrap();
        testdb::use_fresh_schema(&mut tx, "link_valid").await;
        schema::migrate(&mut tx, &schema::tables(), false).await.unwrap();

        let (robot, part) = robot_and_part(&mut tx).await;

        let robots_part = link(&mut tx, NewRobotsPart { robots_id: robot.id, parts_id: part.id })
            .await
            .unwrap();
        assert_eq!(robots_part.robots_id, robot.id);
        assert_eq!(robots_part.parts_id, part.id);
        assert_eq!(count_links(&mut tx).await, 1);

        let stored = find::<RobotsPart>(&mut tx, robots_part.id).await.unwrap().unwrap();
        assert_eq!(stored.robots_id, robot.id);

        let found_part = find_related::<Part, _>(&mut tx, &robots_part).await.unwrap().unwrap();
        assert_eq!(found_part.id, part.id);
        assert_eq!(found_part.name, "Engine");

        let found_robot = find_related::<Robot, _>(&mut tx, &robots_part).await.unwrap().unwrap();
        assert_eq!(found_robot.id, robot.id);
        assert_eq!(found_robot.kind, "mechanical");

        // Robots only have a has_many relation to robots_parts
        assert!(find_related::<RobotsPart, _>(&mut tx, &robot).await.unwrap().is_none());

        let ids = list::<RobotsPart>(&mut tx)
            .await
            .unwrap()
            .iter()
            .map(|robots_part| robots_part.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, [robots_part.id]);
    }

    #[tokio::test]
    async fn linked_robot_cannot_be_deleted_until_unlinked() {
        let mut db_conn = match testdb::connect().await {
            Some(db_conn) => db_conn,
            None => return,
        };
        let mut tx = db_conn.begin().await.unwrap();
        testdb::use_fresh_schema(&mut tx, "delete_linked").await;
        schema::migrate(&mut tx, &schema::tables(), false).await.unwrap();

        let (robot, part) = robot_and_part(&mut tx).await;
        let robots_part = link(&mut tx, NewRobotsPart { robots_id: robot.id, parts_id: part.id })
            .await
            .unwrap();

        let err = invalid(delete::<Robot>(&mut tx, robot.id).await);
        assert_eq!(err.messages().len(), 1);
        assert_eq!(err.messages()[0].field, "id");
        assert_eq!(err.messages()[0].text, "Record is referenced by model RobotsParts");
        assert!(find::<Robot>(&mut tx, robot.id).await.unwrap().is_some());

        invalid(delete::<Part>(&mut tx, part.id).await);

        assert!(unlink(&mut tx, robots_part.id).await.unwrap());
        assert!(!unlink(&mut tx, robots_part.id).await.unwrap());

        let deleted = delete::<Robot>(&mut tx, robot.id).await.unwrap().unwrap();
        assert_eq!(deleted.id, robot.id);
        assert!(find::<Robot>(&mut tx, robot.id).await.unwrap().is_none());
        assert!(delete::<Robot>(&mut tx, robot.id).await.unwrap().is_none());
    }
}
