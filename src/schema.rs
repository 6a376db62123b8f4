use sqlx::FromRow;
use sqlx::postgres::PgConnection;
use tracing::info;

use crate::dialect::{self, Column, Reference};
use crate::model::{Model, Part, Robot, RobotsPart};

/// The definition of one table, derived from a model's columns and its foreign key relations.
#[derive(Clone, Debug)]
pub(crate) struct Table {
    pub(crate) name: &'static str,
    pub(crate) columns: &'static [Column],
    pub(crate) references: Vec<Reference>,
}

impl Table {
    pub(crate) fn of<M: Model>() -> Self {
        let references = M::relations()
            .belongs_to_relations()
            .filter(|relation| relation.is_foreign_key())
            .map(|relation| Reference::new(
                M::TABLE,
                relation.fields,
                relation.referenced_table,
                relation.referenced_fields))
            .collect();

        Self {
            name: M::TABLE,
            columns: M::COLUMNS,
            references,
        }
    }

    pub(crate) fn create_sql(&self) -> String {
        dialect::create_table(self.name, self.columns, &self.references)
    }
}

/// All tables, each one after the tables it references.
pub(crate) fn tables() -> Vec<Table> {
    vec![
        Table::of::<Robot>(),
        Table::of::<Part>(),
        Table::of::<RobotsPart>(),
    ]
}

pub(crate) fn ddl(tables: &[Table]) -> String {
    let mut ddl = String::new();
    for table in tables {
        ddl.push_str(&table.create_sql());
        ddl.push_str(";\n\n");
    }
    ddl
}

/// A foreign key as reported by the database.
#[derive(FromRow, Clone, PartialEq, Eq, Debug)]
pub(crate) struct DescribedReference {
    pub(crate) constraint_name: String,
    pub(crate) column_name: String,
    pub(crate) schema_name: String,
    pub(crate) referenced_schema_name: String,
    pub(crate) referenced_table_name: String,
    pub(crate) referenced_column_name: String,
}

impl DescribedReference {
    /// Table definitions only reference tables in their own schema.
    fn matches(&self, reference: &Reference) -> bool {
        self.column_name == reference.column
            && self.referenced_schema_name == self.schema_name
            && self.referenced_table_name == reference.referenced_table
            && self.referenced_column_name == reference.referenced_column
    }
}

pub(crate) async fn table_exists(db_conn: &mut PgConnection, table: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(dialect::TABLE_EXISTS)
        .bind(table)
        .fetch_one(db_conn)
        .await
}

pub(crate) async fn describe_references(
    db_conn: &mut PgConnection,
    table: &str
) -> Result<Vec<DescribedReference>, sqlx::Error>
{
    sqlx::query_as::<_, DescribedReference>(dialect::DESCRIBE_REFERENCES)
        .bind(table)
        .fetch_all(db_conn)
        .await
}

/// Brings the database in line with the table definitions: creates missing tables and adds
/// foreign keys missing from existing ones. With `fresh`, all tables are dropped first.
pub(crate) async fn migrate(db_conn: &mut PgConnection, tables: &[Table], fresh: bool) -> Result<(), sqlx::Error> {
    if fresh {
        for table in tables.iter().rev() {
            sqlx::query(&dialect::drop_table(table.name, true))
                .execute(&mut *db_conn)
                .await?;
            info!(table = table.name, "dropped table");
        }
    }

    for table in tables {
        if !table_exists(&mut *db_conn, table.name).await? {
            sqlx::query(&table.create_sql())
                .execute(&mut *db_conn)
                .await?;
            info!(table = table.name, "created table");
            continue;
        }

        let existing = describe_references(&mut *db_conn, table.name).await?;

        for reference in missing_references(table, &existing) {
            sqlx::query(&dialect::add_foreign_key(table.name, reference))
                .execute(&mut *db_conn)
                .await?;
            info!(table = table.name, constraint = %reference.name, "added foreign key");
        }
    }

    Ok(())
}

fn missing_references<'a>(table: &'a Table, existing: &[DescribedReference]) -> Vec<&'a Reference> {
    table.references
        .iter()
        .filter(|reference| !existing.iter().any(|described| described.matches(reference)))
        .collect()
}
