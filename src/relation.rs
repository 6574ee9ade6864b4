//! One-to-one relation descriptors.

use log::debug;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::orm::{Filters, Value};
use crate::query::Query;
use crate::record::{AttributeSource, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The related row carries `foreign_key` pointing at the parent's `owner_key`.
    HasOne,
    /// The parent carries `foreign_key` pointing at the related row's `owner_key`.
    BelongsTo,
}

/// Link between a parent model and one related model.
///
/// For `HasOne`, `owner_key` names the parent's local key; for `BelongsTo`
/// it names the key on the related model.
#[derive(Clone, Copy)]
pub struct Relation {
    pub kind: RelationKind,
    pub related: &'static dyn Model,
    pub foreign_key: &'static str,
    pub owner_key: &'static str,
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("kind", &self.kind)
            .field("related", &self.related.table_name())
            .field("foreign_key", &self.foreign_key)
            .field("owner_key", &self.owner_key)
            .finish()
    }
}

impl Relation {
    pub fn has_one(
        related: &'static dyn Model,
        foreign_key: &'static str,
        local_key: &'static str,
    ) -> Self {
        Relation {
            kind: RelationKind::HasOne,
            related,
            foreign_key,
            owner_key: local_key,
        }
    }

    pub fn belongs_to(
        related: &'static dyn Model,
        foreign_key: &'static str,
        owner_key: &'static str,
    ) -> Self {
        Relation {
            kind: RelationKind::BelongsTo,
            related,
            foreign_key,
            owner_key,
        }
    }

    /// Key value on the parent side that identifies the related row.
    pub fn parent_key(&self, parent: &Record) -> Option<Value> {
        let attribute = match self.kind {
            RelationKind::HasOne => self.owner_key,
            RelationKind::BelongsTo => self.foreign_key,
        };
        parent.attribute(attribute).filter(|v| !v.is_null()).cloned()
    }

    // column on the related table matched against `parent_key`
    fn related_column(&self) -> &'static str {
        match self.kind {
            RelationKind::HasOne => self.foreign_key,
            RelationKind::BelongsTo => self.owner_key,
        }
    }

    fn constraint(&self, parent: &Record) -> Option<Filters> {
        self.parent_key(parent)
            .map(|key| vec![(self.related_column().to_string(), key)])
    }

    /// New, unsaved related record. A `HasOne` child already points at the
    /// parent when the parent key is known.
    pub fn make(&self, parent: &Record) -> Record {
        let mut record = Record::new(parent.db(), self.related);
        if self.kind == RelationKind::HasOne {
            if let Some(key) = self.parent_key(parent) {
                record.set_attribute(self.foreign_key, key);
            }
        }
        record
    }

    /// Fetch the related row; `None` when the parent has no key yet or no row matches.
    pub async fn load(&self, parent: &Record) -> Result<Option<Record>> {
        let Some(filters) = self.constraint(parent) else {
            return Ok(None);
        };
        debug!(
            "Loading `{}` related to `{}`",
            self.related.table_name(),
            parent.model().table_name()
        );
        let mut query = Query::new(parent.db(), self.related);
        for (column, value) in filters {
            query = query.filter(column, value);
        }
        query.first().await
    }

    /// Persist `record`, stamping the link back to the parent first for `HasOne`.
    pub async fn save(&self, parent_key: &Value, record: &mut Record) -> Result<()> {
        if self.kind == RelationKind::HasOne {
            if parent_key.is_null() {
                return Err(Error::MissingKey {
                    table: record.model().table_name(),
                    key: self.foreign_key.to_string(),
                });
            }
            record.set_attribute(self.foreign_key, parent_key.clone());
        }
        record.save().await
    }

    /// Delete the related rows straight from the table.
    pub async fn delete(&self, parent: &Record) -> Result<u64> {
        let Some(filters) = self.constraint(parent) else {
            return Ok(0);
        };
        parent
            .db()
            .delete_where(self.related.table_name(), &filters)
            .await
    }
}
