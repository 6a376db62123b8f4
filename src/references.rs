use anyhow::Context;
use sqlx::postgres::PgConnection;

use crate::schema;

/// Prints the foreign keys the database reports for each table, one per line.
pub(crate) async fn run(db_conn: &mut PgConnection) -> anyhow::Result<()> {
    for table in schema::tables() {
        let references = schema::describe_references(db_conn, table.name)
            .await
            .with_context(|| format!("failed to describe references of {}", table.name))?;

        for reference in references {
            println!(
                "{}.{} -> {}.{}.{} ({})",
                table.name,
                reference.column_name,
                reference.referenced_schema_name,
                reference.referenced_table_name,
                reference.referenced_column_name,
                reference.constraint_name);
        }
    }

    Ok(())
}
