use crate::model::Model;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RelationKind {
    BelongsTo,
    HasMany,
}

/// Options controlling how a relation is enforced when records are written or deleted.
///
/// `ForeignKey::default()` enables the check with the default message and no nulls allowed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct ForeignKey {
    pub(crate) message: Option<&'static str>,
    pub(crate) allow_nulls: bool,
}

impl ForeignKey {
    pub(crate) const fn with_message(message: &'static str) -> Self {
        Self {
            message: Some(message),
            allow_nulls: false,
        }
    }
}

/// A single relationship between a field of one model and a field of another.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Relation {
    pub(crate) kind: RelationKind,
    pub(crate) fields: &'static str,
    pub(crate) referenced_model: &'static str,
    pub(crate) referenced_table: &'static str,
    pub(crate) referenced_fields: &'static str,
    pub(crate) foreign_key: Option<ForeignKey>,
}

impl Relation {
    pub(crate) fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }
}

/// The relationships declared by one model. Built once by the model's `initialize` and never
/// modified afterwards.
#[derive(Clone, Debug)]
pub(crate) struct Relations {
    model: &'static str,
    belongs_to: Vec<Relation>,
    has_many: Vec<Relation>,
}

impl Relations {
    pub(crate) fn new(model: &'static str) -> Self {
        Self {
            model,
            belongs_to: Vec::new(),
            has_many: Vec::new(),
        }
    }

    pub(crate) fn model(&self) -> &'static str {
        self.model
    }

    /// Declares that `field` of this model references `referenced_field` of `M`.
    pub(crate) fn belongs_to<M>(
        &mut self,
        field: &'static str,
        referenced_field: &'static str,
        foreign_key: Option<ForeignKey>
    ) -> &mut Self
    where
        M: Model,
    {
        self.belongs_to.push(Relation {
            kind: RelationKind::BelongsTo,
            fields: field,
            referenced_model: M::NAME,
            referenced_table: M::TABLE,
            referenced_fields: referenced_field,
            foreign_key,
        });
        self
    }

    /// Declares that rows of `M` reference this model, `referenced_field` of `M` pointing at
    /// `field` of this model.
    pub(crate) fn has_many<M>(
        &mut self,
        field: &'static str,
        referenced_field: &'static str,
        foreign_key: Option<ForeignKey>
    ) -> &mut Self
    where
        M: Model,
    {
        self.has_many.push(Relation {
            kind: RelationKind::HasMany,
            fields: field,
            referenced_model: M::NAME,
            referenced_table: M::TABLE,
            referenced_fields: referenced_field,
            foreign_key,
        });
        self
    }

    pub(crate) fn belongs_to_relations(&self) -> impl Iterator<Item = &Relation> {
        self.belongs_to.iter()
    }

    pub(crate) fn has_many_relations(&self) -> impl Iterator<Item = &Relation> {
        self.has_many.iter()
    }

    /// Finds the relation pointing at the model with the given name, if there is one.
    pub(crate) fn get(&self, referenced_model: &str) -> Option<&Relation> {
        self.belongs_to
            .iter()
            .chain(self.has_many.iter())
            .find(|relation| relation.referenced_model == referenced_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, Part, Robot, RobotsPart};

    #[test]
    fn robots_parts_declares_both_parents() {
        let relations = RobotsPart::relations();
        assert_eq!(relations.model(), "RobotsParts");

        let belongs_to = relations.belongs_to_relations().collect::<Vec<_>>();
        assert_eq!(belongs_to.len(), 2);

        assert_eq!(belongs_to[0].fields, "parts_id");
        assert_eq!(belongs_to[0].referenced_model, "Parts");
        assert_eq!(belongs_to[0].referenced_table, "parts");
        assert_eq!(belongs_to[0].referenced_fields, "id");
        assert_eq!(belongs_to[0].foreign_key, Some(ForeignKey::default()));

        assert_eq!(belongs_to[1].fields, "robots_id");
        assert_eq!(belongs_to[1].referenced_model, "Robots");
        assert_eq!(belongs_to[1].referenced_table, "robots");
        assert_eq!(belongs_to[1].referenced_fields, "id");
        assert_eq!(
            belongs_to[1].foreign_key.and_then(|fk| fk.message),
            Some("The robot code does not exist"));

        assert!(belongs_to.iter().all(|relation| relation.kind == RelationKind::BelongsTo));
        assert_eq!(relations.has_many_relations().count(), 0);
    }

    #[test]
    fn parents_declare_reverse_relations() {
        for relations in [Robot::relations(), Part::relations()] {
            let has_many = relations.has_many_relations().collect::<Vec<_>>();
            assert_eq!(has_many.len(), 1);
            assert_eq!(has_many[0].referenced_model, "RobotsParts");
            assert!(has_many[0].is_foreign_key());
            assert_eq!(relations.belongs_to_relations().count(), 0);
        }
    }

    #[test]
    fn relation_lookup_by_model_name() {
        let relations = RobotsPart::relations();
        assert_eq!(relations.get("Robots").map(|r| r.fields), Some("robots_id"));
        assert_eq!(relations.get("Parts").map(|r| r.fields), Some("parts_id"));
        assert!(relations.get("Tags").is_none());
    }

    #[test]
    fn relation_fields_are_model_columns() {
        fn check<M: Model>() {
            let relations = M::relations();
            for relation in relations.belongs_to_relations().chain(relations.has_many_relations()) {
                assert!(
                    M::COLUMNS.iter().any(|column| column.name == relation.fields),
                    "{} has no column {}", M::NAME, relation.fields);
            }
        }

        check::<Robot>();
        check::<Part>();
        check::<RobotsPart>();
    }

    #[test]
    fn foreign_key_defaults() {
        let fk = ForeignKey::with_message("gone");
        assert_eq!(fk.message, Some("gone"));
        assert!(!fk.allow_nulls);
        assert_eq!(ForeignKey::default().message, None);
    }
}
