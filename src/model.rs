//! Static model declarations.
//!
//! A model is a (usually zero-sized) type describing one table: its key,
//! mass-assignment rules, relations, computed getters and callable methods.
//! Records hold a `&'static dyn Model`, so unit structs are declared once and
//! referenced as `&Student`.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::orm::Value;
use crate::record::Record;
use crate::relation::Relation;
use crate::role::{InheritRole, InheritRoleHooks};

/// Callbacks fired by `Record::save` and `Record::delete` around the write.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_save(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    async fn after_save(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    async fn before_delete(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }

    async fn after_delete(&self, _record: &mut Record) -> Result<()> {
        Ok(())
    }
}

pub trait Model: Send + Sync + 'static {
    fn table_name(&self) -> &'static str;

    fn primary_key(&self) -> &'static str {
        "id"
    }

    /// Whether the primary key is assigned by the database on insert.
    fn incrementing(&self) -> bool {
        true
    }

    fn fillable(&self) -> &'static [&'static str] {
        &[]
    }

    fn guarded(&self) -> &'static [&'static str] {
        &[]
    }

    /// Relation accessor by name.
    fn relation(&self, _name: &str) -> Option<Relation> {
        None
    }

    fn has_get_mutator(&self, _attribute: &str) -> bool {
        false
    }

    /// Computed value for `attribute`, consulted before stored attributes.
    fn get_mutator(&self, _record: &Record, _attribute: &str) -> Option<Value> {
        None
    }

    fn has_method(&self, _method: &str) -> bool {
        false
    }

    fn call(&self, _record: &mut Record, method: &str, _args: &[Value]) -> Result<Value> {
        Err(Error::UnknownMethod {
            table: self.table_name(),
            method: method.to_string(),
        })
    }

    /// Role composition settings, for models split across a master and a role table.
    fn inherit_role(&self) -> Option<&dyn InheritRole> {
        None
    }

    fn hooks(&self) -> Option<&'static dyn LifecycleHooks> {
        self.inherit_role()
            .map(|_| &InheritRoleHooks as &'static dyn LifecycleHooks)
    }

    /// Mass-assignment check used by `Record::fill`.
    fn is_fillable(&self, attribute: &str) -> bool {
        if self.fillable().contains(&attribute) {
            return true;
        }
        if self.is_guarded(attribute) {
            return false;
        }
        self.fillable().is_empty() && !attribute.starts_with('_')
    }

    fn is_guarded(&self, attribute: &str) -> bool {
        let guarded = self.guarded();
        guarded.contains(&"*") || guarded.contains(&attribute)
    }
}
