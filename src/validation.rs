use std::error;
use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::model::{Model, Record};
use crate::relation::Relation;

/// Answers whether a row exists in `table` whose `column` holds `value`.
#[async_trait]
pub(crate) trait ReferenceLookup {
    async fn exists(
        &mut self,
        table: &'static str,
        column: &'static str,
        value: i32
    ) -> Result<bool, sqlx::Error>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum MessageKind {
    ConstraintViolation,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConstraintViolation => write!(f, "ConstraintViolation"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Message {
    pub(crate) text: String,
    pub(crate) field: &'static str,
    pub(crate) kind: MessageKind,
}

impl Message {
    fn constraint_violation(relation: &Relation, default_text: impl FnOnce() -> String) -> Self {
        let text = relation.foreign_key
            .and_then(|fk| fk.message)
            .map(str::to_owned)
            .unwrap_or_else(default_text);

        Self {
            text,
            field: relation.fields,
            kind: MessageKind::ConstraintViolation,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Every relation a record violated, in declaration order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct ValidationFailed(pub(crate) Vec<Message>);

impl ValidationFailed {
    pub(crate) fn messages(&self) -> &[Message] {
        &self.0
    }
}

impl fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, message) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            message.fmt(f)?;
        }
        Ok(())
    }
}

impl error::Error for ValidationFailed {}

/// Contains information about why a record was not written or deleted.
#[derive(Debug)]
pub(crate) enum NotSaved {
    /// Case when the record violated one or more of its relations.
    Invalid(ValidationFailed),
    /// Case when the database could not be queried.
    DbError(Box<sqlx::Error>),
}

impl fmt::Display for NotSaved {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Invalid(err) => err.fmt(f),
            Self::DbError(err) => err.fmt(f),
        }
    }
}

impl error::Error for NotSaved {}

impl From<ValidationFailed> for NotSaved {
    fn from(err: ValidationFailed) -> Self {
        Self::Invalid(err)
    }
}

impl From<sqlx::Error> for NotSaved {
    fn from(err: sqlx::Error) -> Self {
        Self::DbError(Box::new(err))
    }
}

/// Checks that every row the record points at through a foreign key `belongs_to` relation
/// exists.
pub(crate) async fn check_foreign_keys<R, L>(record: &R, lookup: &mut L) -> Result<(), NotSaved>
where
    R: Record,
    L: ReferenceLookup + ?Sized,
{
    let relations = <R::Model as Model>::relations();
    let mut messages = Vec::new();

    for relation in relations.belongs_to_relations() {
        let foreign_key = match relation.foreign_key {
            Some(foreign_key) => foreign_key,
            None => continue,
        };

        let found = match record.field(relation.fields) {
            Some(value) => lookup
                .exists(relation.referenced_table, relation.referenced_fields, value)
                .await?,
            None => foreign_key.allow_nulls,
        };

        if !found {
            debug!(
                model = relations.model(),
                field = relation.fields,
                referenced_model = relation.referenced_model,
                "foreign key violated");

            messages.push(Message::constraint_violation(relation, || format!(
                r#"Value of field "{}" does not exist on referenced table"#,
                relation.fields)));
        }
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailed(messages).into())
    }
}

/// Checks that no rows still point at the record through a foreign key `has_many` relation.
pub(crate) async fn check_restrict_delete<R, L>(record: &R, lookup: &mut L) -> Result<(), NotSaved>
where
    R: Record,
    L: ReferenceLookup + ?Sized,
{
    let relations = <R::Model as Model>::relations();
    let mut messages = Vec::new();

    for relation in relations.has_many_relations() {
        if !relation.is_foreign_key() {
            continue;
        }

        let value = match record.field(relation.fields) {
            Some(value) => value,
            None => continue,
        };

        if lookup.exists(relation.referenced_table, relation.referenced_fields, value).await? {
            debug!(model = relations.model(), value, referenced_model = relation.referenced_model, "record still referenced");
            messages.push(Message::constraint_violation(relation, || format!(
                "Record is referenced by model {}",
                relation.referenced_model)));
        }
    }

    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailed(messages).into())
    }
}
