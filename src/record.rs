//! Active records: one table row plus its loaded relations.
//!
//! `Record` persists itself through the `Db` it was created with. Models that
//! inherit a role get their attribute access forwarded to the role record and
//! their writes synchronized with it; see the `role` module.

use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::orm::{Attributes, BoxFuture, Db, Value};
use crate::query::Query;
use crate::role::{self, Context};

/// Named-attribute access on a single record, without any forwarding.
pub trait AttributeSource {
    fn has_attribute(&self, name: &str) -> bool;

    fn get_attribute(&self, name: &str) -> Option<Value>;

    fn set_attribute(&mut self, name: &str, value: Value);
}

#[derive(Clone)]
pub struct Record {
    db: Db,
    model: &'static dyn Model,
    attributes: Attributes,
    original: Attributes,
    exists: bool,
    relations: BTreeMap<String, Option<Record>>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.model.table_name())
            .field("attributes", &self.attributes)
            .field("exists", &self.exists)
            .field("relations", &self.relations)
            .finish()
    }
}

impl AttributeSource for Record {
    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    fn get_attribute(&self, name: &str) -> Option<Value> {
        if self.model.has_get_mutator(name) {
            return self.model.get_mutator(self, name);
        }
        self.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }
}

impl Record {
    /// A new, unsaved record of `model`.
    pub fn new(db: &Db, model: &'static dyn Model) -> Self {
        Record {
            db: db.clone(),
            model,
            attributes: Attributes::new(),
            original: Attributes::new(),
            exists: false,
            relations: BTreeMap::new(),
        }
    }

    /// A record for a row that already exists in storage.
    pub fn hydrate(db: &Db, model: &'static dyn Model, attributes: Attributes) -> Self {
        Record {
            db: db.clone(),
            model,
            original: attributes.clone(),
            attributes,
            exists: true,
            relations: BTreeMap::new(),
        }
    }

    pub fn query(db: &Db, model: &'static dyn Model) -> Query {
        Query::new(db, model)
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn model(&self) -> &'static dyn Model {
        self.model
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Stored value, ignoring computed getters and forwarding.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn unset_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Primary key value, if assigned.
    pub fn key(&self) -> Option<&Value> {
        self.attributes
            .get(self.model.primary_key())
            .filter(|v| !v.is_null())
    }

    /// Mass-assign `attributes`, skipping anything the model does not allow.
    pub fn fill<I, K, V>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            let name = name.into();
            if self.model.is_fillable(&name) {
                self.attributes.insert(name, value.into());
            } else {
                debug!(
                    "Discarding non-fillable attribute `{}` on `{}`",
                    name,
                    self.model.table_name()
                );
            }
        }
        self
    }

    /// Attributes changed since the record was loaded or last saved.
    pub fn dirty(&self) -> Attributes {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty().is_empty()
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Cached relation value; `None` when not loaded or loaded as empty.
    pub fn relation(&self, name: &str) -> Option<&Record> {
        self.relations.get(name).and_then(Option::as_ref)
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.relations.get_mut(name).and_then(Option::as_mut)
    }

    pub fn set_relation(&mut self, name: &str, value: Option<Record>) {
        self.relations.insert(name.to_string(), value);
    }

    pub fn unset_relation(&mut self, name: &str) -> Option<Record> {
        self.relations.remove(name).flatten()
    }

    /// Read an attribute, forwarding to the role record when the model inherits one.
    pub async fn get(&mut self, name: &str) -> Result<Option<Value>> {
        self.get_with(name, Context::default()).await
    }

    /// Write an attribute, forwarding to the role record when it owns `name`.
    pub async fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.set_with(name, value.into(), Context::default()).await
    }

    /// Remove an attribute from the record and from its role record.
    pub async fn unset(&mut self, name: &str) -> Result<()> {
        self.unset_with(name, Context::default()).await
    }

    /// Invoke a model method, on this record or else on its role record.
    pub async fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        self.call_with(method, args, Context::default()).await
    }

    /// Load (or return the cached) related record `name`, looking through
    /// the role record for relations this model does not declare.
    pub async fn related(&mut self, name: &str) -> Result<Option<&Record>> {
        self.related_with(name, Context::default()).await
    }

    // The `*_with` variants take the forwarding context explicitly; an
    // entered context keeps the operation on this record.

    pub fn get_with<'a>(
        &'a mut self,
        name: &'a str,
        ctx: Context,
    ) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(role::forward_get(self, name, ctx))
    }

    pub fn set_with<'a>(
        &'a mut self,
        name: &'a str,
        value: Value,
        ctx: Context,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(role::forward_set(self, name, value, ctx))
    }

    pub fn unset_with<'a>(&'a mut self, name: &'a str, ctx: Context) -> BoxFuture<'a, Result<()>> {
        Box::pin(role::forward_unset(self, name, ctx))
    }

    pub fn call_with<'a>(
        &'a mut self,
        method: &'a str,
        args: &'a [Value],
        ctx: Context,
    ) -> BoxFuture<'a, Result<Value>> {
        Box::pin(role::forward_call(self, method, args, ctx))
    }

    pub fn related_with<'a>(
        &'a mut self,
        name: &str,
        ctx: Context,
    ) -> BoxFuture<'a, Result<Option<&'a Record>>> {
        // owned so the returned record borrows only `self`
        let name = name.to_string();
        Box::pin(async move { role::forward_related(self, &name, ctx).await })
    }

    /// Load relation `name` declared on this model and cache it.
    pub async fn load_relation(&mut self, name: &str) -> Result<Option<&Record>> {
        if !self.relation_loaded(name) {
            let relation = self.model.relation(name).ok_or_else(|| {
                Error::Configuration(format!(
                    "relation `{}` is not declared on `{}`",
                    name,
                    self.model.table_name()
                ))
            })?;
            let value = relation.load(self).await?;
            self.set_relation(name, value);
        }
        Ok(self.relation(name))
    }

    /// Insert or update the row, running lifecycle hooks around the write.
    pub fn save(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let hooks = self.model.hooks();
            if let Some(hooks) = hooks {
                hooks.before_save(self).await?;
            }
            if self.exists {
                self.perform_update().await?;
            } else {
                self.perform_insert().await?;
            }
            if let Some(hooks) = hooks {
                hooks.after_save(self).await?;
            }
            Ok(())
        })
    }

    /// Delete the row, running lifecycle hooks around the write.
    ///
    /// Returns `false` without touching storage when the record was never saved.
    pub fn delete(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            if !self.exists {
                return Ok(false);
            }
            let hooks = self.model.hooks();
            if let Some(hooks) = hooks {
                hooks.before_delete(self).await?;
            }
            let key = self.require_key()?;
            let filters = vec![(self.model.primary_key().to_string(), key)];
            self.db
                .delete_where(self.model.table_name(), &filters)
                .await?;
            self.exists = false;
            info!("Deleted `{}` record", self.model.table_name());
            if let Some(hooks) = hooks {
                hooks.after_delete(self).await?;
            }
            Ok(true)
        })
    }

    fn require_key(&self) -> Result<Value> {
        self.original
            .get(self.model.primary_key())
            .or_else(|| self.key())
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| Error::MissingKey {
                table: self.model.table_name(),
                key: self.model.primary_key().to_string(),
            })
    }

    async fn perform_insert(&mut self) -> Result<()> {
        let id = self
            .db
            .insert(self.model.table_name(), &self.attributes)
            .await?;
        if self.model.incrementing() && self.key().is_none() {
            self.attributes
                .insert(self.model.primary_key().to_string(), Value::Integer(id));
        }
        self.exists = true;
        self.original = self.attributes.clone();
        info!("Inserted `{}` record", self.model.table_name());
        Ok(())
    }

    async fn perform_update(&mut self) -> Result<()> {
        let dirty = self.dirty();
        if dirty.is_empty() {
            debug!("`{}` record is clean, skipping update", self.model.table_name());
            return Ok(());
        }
        let key = self.require_key()?;
        self.db
            .update(
                self.model.table_name(),
                self.model.primary_key(),
                &key,
                &dirty,
            )
            .await?;
        self.original = self.attributes.clone();
        Ok(())
    }
}
