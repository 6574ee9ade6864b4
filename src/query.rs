//! Equality-filtered queries over one model's table.

use crate::error::Result;
use crate::model::Model;
use crate::orm::{Db, Filters, Value};
use crate::record::Record;
use crate::role;

/// Query builder yielding hydrated records.
///
/// Queries on a role master (a `HasOne` role model) are scoped to the
/// model's role-marking attributes, so loading students never returns an
/// instructor row from the shared table.
pub struct Query {
    db: Db,
    model: &'static dyn Model,
    filters: Filters,
}

impl Query {
    pub fn new(db: &Db, model: &'static dyn Model) -> Self {
        Query {
            db: db.clone(),
            model,
            filters: role::role_scope(model),
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub async fn get(&self) -> Result<Vec<Record>> {
        let rows = self
            .db
            .select(self.model.table_name(), &self.filters, None)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::hydrate(&self.db, self.model, row))
            .collect())
    }

    pub async fn first(&self) -> Result<Option<Record>> {
        let rows = self
            .db
            .select(self.model.table_name(), &self.filters, Some(1))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| Record::hydrate(&self.db, self.model, row)))
    }

    pub async fn exists(&self) -> Result<bool> {
        self.db.exists(self.model.table_name(), &self.filters).await
    }

    /// Delete matching rows without loading them (no lifecycle hooks run).
    pub async fn delete(&self) -> Result<u64> {
        self.db
            .delete_where(self.model.table_name(), &self.filters)
            .await
    }
}
