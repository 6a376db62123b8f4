//! PostgreSQL flavoured SQL generation.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ColumnType {
    Serial,
    Integer,
    Varchar(u32),
    Timestamp,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Column {
    pub(crate) name: &'static str,
    pub(crate) ty: ColumnType,
    pub(crate) not_null: bool,
    pub(crate) primary: bool,
}

impl Column {
    pub(crate) const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            not_null: false,
            primary: false,
        }
    }

    pub(crate) const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Marks the column as (part of) the primary key, which implies `NOT NULL`.
    pub(crate) const fn primary(mut self) -> Self {
        self.primary = true;
        self.not_null = true;
        self
    }
}

/// A foreign key constraint on a table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Reference {
    pub(crate) name: String,
    pub(crate) column: &'static str,
    pub(crate) referenced_table: &'static str,
    pub(crate) referenced_column: &'static str,
}

impl Reference {
    /// Creates a reference named the way PostgreSQL names unnamed foreign keys,
    /// `<table>_<column>_fkey`.
    pub(crate) fn new(
        table: &str,
        column: &'static str,
        referenced_table: &'static str,
        referenced_column: &'static str
    ) -> Self
    {
        Self {
            name: format!("{}_{}_fkey", table, column),
            column,
            referenced_table,
            referenced_column,
        }
    }
}

/// Quotes an identifier, doubling any quotes inside it.
pub(crate) fn escape(ident: &str) -> String {
    let mut escaped = String::with_capacity(ident.len() + 2);
    escaped.push('"');
    for c in ident.chars() {
        if c == '"' {
            escaped.push('"');
        }
        escaped.push(c);
    }
    escaped.push('"');
    escaped
}

pub(crate) fn limit(sql: &str, number: u64) -> String {
    format!("{} LIMIT {}", sql, number)
}

pub(crate) fn for_update(sql: &str) -> String {
    format!("{} FOR UPDATE", sql)
}

pub(crate) fn shared_lock(sql: &str) -> String {
    format!("{} FOR SHARE", sql)
}

pub(crate) fn column_definition(column: &Column) -> String {
    let mut def = match column.ty {
        ColumnType::Serial => "SERIAL".to_owned(),
        ColumnType::Integer => "INT".to_owned(),
        ColumnType::Varchar(size) => format!("CHARACTER VARYING({})", size),
        ColumnType::Timestamp => "TIMESTAMP".to_owned(),
    };
    if column.not_null {
        def.push_str(" NOT NULL");
    }
    def
}

fn reference_definition(reference: &Reference) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
        escape(&reference.name),
        escape(reference.column),
        escape(reference.referenced_table),
        escape(reference.referenced_column))
}

pub(crate) fn create_table(table: &str, columns: &[Column], references: &[Reference]) -> String {
    let mut definitions = Vec::with_capacity(columns.len() + references.len() + 1);

    for column in columns {
        definitions.push(format!("{} {}", escape(column.name), column_definition(column)));
    }

    let primary = columns
        .iter()
        .filter(|column| column.primary)
        .map(|column| escape(column.name))
        .collect::<Vec<_>>();

    if !primary.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", primary.join(", ")));
    }

    for reference in references {
        definitions.push(reference_definition(reference));
    }

    format!("CREATE TABLE {} (\n\t{}\n)", escape(table), definitions.join(",\n\t"))
}

pub(crate) fn add_foreign_key(table: &str, reference: &Reference) -> String {
    format!("ALTER TABLE {} ADD {}", escape(table), reference_definition(reference))
}

pub(crate) fn drop_table(table: &str, if_exists: bool) -> String {
    if if_exists {
        format!("DROP TABLE IF EXISTS {}", escape(table))
    } else {
        format!("DROP TABLE {}", escape(table))
    }
}

/// Query taking the table name as `$1` and returning a single boolean.
pub(crate) const TABLE_EXISTS: &str =
    "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
    WHERE table_schema = current_schema() AND table_name = $1)";

/// Query taking the table name as `$1` and returning one row per foreign key column of that
/// table in the current schema, with the columns `constraint_name`, `column_name`,
/// `schema_name`, `referenced_schema_name`, `referenced_table_name` and
/// `referenced_column_name`.
///
/// Constraints are selected by the oid of the table they belong to, since constraint names are
/// only unique within one table.
pub(crate) const DESCRIBE_REFERENCES: &str =
    "SELECT con.conname::text AS constraint_name, \
        att.attname::text AS column_name, \
        ns.nspname::text AS schema_name, \
        ref_ns.nspname::text AS referenced_schema_name, \
        ref_tbl.relname::text AS referenced_table_name, \
        ref_att.attname::text AS referenced_column_name \
    FROM pg_catalog.pg_constraint AS con \
    JOIN pg_catalog.pg_class AS tbl ON tbl.oid = con.conrelid \
    JOIN pg_catalog.pg_namespace AS ns ON ns.oid = tbl.relnamespace \
    JOIN pg_catalog.pg_class AS ref_tbl ON ref_tbl.oid = con.confrelid \
    JOIN pg_catalog.pg_namespace AS ref_ns ON ref_ns.oid = ref_tbl.relnamespace \
    CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS cols(conkey, confkey, ord) \
    JOIN pg_catalog.pg_attribute AS att ON att.attrelid = con.conrelid AND att.attnum = cols.conkey \
    JOIN pg_catalog.pg_attribute AS ref_att ON ref_att.attrelid = con.confrelid AND ref_att.attnum = cols.confkey \
    WHERE con.contype = 'f' AND ns.nspname = current_schema() AND tbl.relname = $1 \
    ORDER BY con.conname, cols.ord";
