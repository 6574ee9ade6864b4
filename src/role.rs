//! Role inheritance: one logical entity stored as a master row plus a role row.
//!
//! A model opts in by implementing [`InheritRole`] and returning itself from
//! `Model::inherit_role`. The role relation decides which side is the master:
//!
//! - `HasOne`: the model is the master ("Student" over `humans`); the role row
//!   (`students`) points back at it. The master carries the role-marking
//!   attributes and its queries are scoped by them.
//! - `BelongsTo`: the model is the slave ("Instructor" over `instructors`) and
//!   points at the shared row (`humans`), which carries the role-marking
//!   attributes.
//!
//! Attributes that the model does not hold itself are read from and written to
//! the role record, which is loaded, or made, on first access. Saving and
//! deleting keep both rows consistent.

use async_trait::async_trait;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::{LifecycleHooks, Model};
use crate::orm::{Attributes, Filters, Value};
use crate::record::{AttributeSource, Record};
use crate::relation::{Relation, RelationKind};

/// Role composition settings of a model.
pub trait InheritRole: Send + Sync {
    /// Name of the relation, declared on the same model, leading to the role record.
    fn role_relation_name(&self) -> &str;

    /// Fixed attribute values that tell this role apart on a shared table.
    fn role_marking_attributes(&self) -> Attributes {
        Attributes::new()
    }
}

/// Forwarding state of the current call chain.
///
/// `Record::get`, `set`, `unset`, `call` and `related` start from
/// `Context::default()`. Delegation to the role record goes through the
/// role record's `*_with` operations with an entered context, so the role
/// record applies the operation to itself and never forwards again.
/// Callers holding a context (model methods, hooks) pass it on the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    forwarding: bool,
}

impl Context {
    pub fn enter(self) -> Context {
        Context { forwarding: true }
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding
    }
}

fn role_settings(model: &'static dyn Model) -> Result<&'static dyn InheritRole> {
    model.inherit_role().ok_or_else(|| {
        Error::Configuration(format!(
            "`{}` does not inherit a role",
            model.table_name()
        ))
    })
}

/// Name and descriptor of the model's role relation.
pub fn role_relation(model: &'static dyn Model) -> Result<(&'static str, Relation)> {
    let name = role_settings(model)?.role_relation_name();
    if name.is_empty() {
        return Err(Error::Configuration(format!(
            "`{}` declares an empty role relation name",
            model.table_name()
        )));
    }
    let relation = model.relation(name).ok_or_else(|| {
        Error::Configuration(format!(
            "role relation `{}` is not declared on `{}`",
            name,
            model.table_name()
        ))
    })?;
    Ok((name, relation))
}

fn role_marking_attributes(model: &'static dyn Model) -> Attributes {
    model
        .inherit_role()
        .map(|role| role.role_marking_attributes())
        .unwrap_or_default()
}

/// Equality filters applied to every query of a role master.
pub fn role_scope(model: &'static dyn Model) -> Filters {
    match role_relation(model) {
        Ok((_, relation)) if relation.kind == RelationKind::HasOne => {
            role_marking_attributes(model).into_iter().collect()
        }
        _ => Filters::new(),
    }
}

/// The record's role record: the cached one, else the stored one, else a new
/// unsaved one. The result is cached, so repeated calls return the same record.
pub async fn role_relation_model(record: &mut Record) -> Result<&mut Record> {
    let (name, relation) = role_relation(record.model())?;
    if record.relation(name).is_none() {
        let stored = if record.relation_loaded(name) {
            None
        } else {
            relation.load(record).await?
        };
        let role = match stored {
            Some(role) => role,
            None => {
                debug!(
                    "Making new `{}` role record for `{}`",
                    relation.related.table_name(),
                    record.model().table_name()
                );
                relation.make(record)
            }
        };
        record.set_relation(name, Some(role));
    }
    record.relation_mut(name).ok_or_else(|| {
        Error::Configuration(format!("role relation `{}` could not be resolved", name))
    })
}

/// Whether an operation on `name` may be redirected to the role record.
pub fn is_forwardable(record: &Record, name: &str, ctx: Context) -> bool {
    !ctx.is_forwarding()
        && record.model().inherit_role().is_some()
        && name != record.model().primary_key()
        && !record.has_attribute(name)
        && !record.relation_loaded(name)
}

pub(crate) async fn forward_get(
    record: &mut Record,
    name: &str,
    ctx: Context,
) -> Result<Option<Value>> {
    if is_forwardable(record, name, ctx) {
        let computed = record.model().has_get_mutator(name);
        let role = role_relation_model(record).await?;
        if role.has_attribute(name) || computed {
            debug!("Reading `{}` from `{}`", name, role.model().table_name());
            return role.get_with(name, ctx.enter()).await;
        }
    }
    Ok(record.get_attribute(name))
}

pub(crate) async fn forward_set(
    record: &mut Record,
    name: &str,
    value: Value,
    ctx: Context,
) -> Result<()> {
    if is_forwardable(record, name, ctx) {
        let role = role_relation_model(record).await?;
        let model = role.model();
        if role.has_attribute(name)
            || model.fillable().contains(&name)
            || model.guarded().contains(&name)
        {
            debug!("Writing `{}` to `{}`", name, model.table_name());
            return role.set_with(name, value, ctx.enter()).await;
        }
    }
    record.set_attribute(name, value);
    Ok(())
}

pub(crate) async fn forward_unset(record: &mut Record, name: &str, ctx: Context) -> Result<()> {
    if is_forwardable(record, name, ctx) {
        role_relation_model(record)
            .await?
            .unset_with(name, ctx.enter())
            .await?;
    }
    record.unset_attribute(name);
    Ok(())
}

pub(crate) async fn forward_call(
    record: &mut Record,
    method: &str,
    args: &[Value],
    ctx: Context,
) -> Result<Value> {
    let model = record.model();
    if model.has_method(method) {
        return model.call(record, method, args);
    }
    if !ctx.is_forwarding() && model.inherit_role().is_some() {
        let role = role_relation_model(record).await?;
        let role_model = role.model();
        if role_model.has_method(method) {
            debug!("Calling `{}` on `{}`", method, role_model.table_name());
            return role.call_with(method, args, ctx.enter()).await;
        }
    }
    Err(Error::UnknownMethod {
        table: model.table_name(),
        method: method.to_string(),
    })
}

pub(crate) async fn forward_related<'r>(
    record: &'r mut Record,
    name: &str,
    ctx: Context,
) -> Result<Option<&'r Record>> {
    if record.model().relation(name).is_some() {
        return record.load_relation(name).await;
    }
    if is_forwardable(record, name, ctx) {
        let role = role_relation_model(record).await?;
        if role.model().relation(name).is_some() {
            return role.related_with(name, ctx.enter()).await;
        }
    }
    Ok(None)
}

/// Lifecycle hooks keeping the master and role rows consistent.
///
/// `HasOne` masters stamp their marking attributes before their own write and
/// save the role row afterwards, once their key exists. `BelongsTo` slaves
/// save the role row first and adopt its key.
pub struct InheritRoleHooks;

#[async_trait]
impl LifecycleHooks for InheritRoleHooks {
    async fn before_save(&self, record: &mut Record) -> Result<()> {
        let model = record.model();
        let (name, relation) = role_relation(model)?;
        let marking = role_marking_attributes(model);
        match relation.kind {
            RelationKind::HasOne => {
                for (attribute, value) in marking {
                    record.set_attribute(&attribute, value);
                }
            }
            RelationKind::BelongsTo => {
                if !record.relation_loaded(name) && relation.parent_key(record).is_some() {
                    debug!(
                        "Role `{}` of `{}` untouched, keeping existing link",
                        name,
                        model.table_name()
                    );
                    return Ok(());
                }
                let owner_key = {
                    let role = role_relation_model(record).await?;
                    for (attribute, value) in marking {
                        role.set_attribute(&attribute, value);
                    }
                    role.save().await?;
                    role.attribute(relation.owner_key)
                        .cloned()
                        .unwrap_or_default()
                };
                record.set_attribute(relation.foreign_key, owner_key);
            }
        }
        Ok(())
    }

    async fn after_save(&self, record: &mut Record) -> Result<()> {
        let (name, relation) = role_relation(record.model())?;
        match relation.kind {
            RelationKind::BelongsTo => Ok(()),
            RelationKind::HasOne => {
                if !record.relation_loaded(name) {
                    return Ok(());
                }
                let parent_key = relation.parent_key(record).unwrap_or_default();
                let role = role_relation_model(record).await?;
                relation.save(&parent_key, role).await?;
                info!("Saved `{}` role record", relation.related.table_name());
                Ok(())
            }
        }
    }

    async fn before_delete(&self, record: &mut Record) -> Result<()> {
        let (name, relation) = role_relation(record.model())?;
        if relation.kind == RelationKind::HasOne {
            let deleted = relation.delete(record).await?;
            record.unset_relation(name);
            info!(
                "Deleted {} `{}` role row(s)",
                deleted,
                relation.related.table_name()
            );
        }
        Ok(())
    }

    async fn after_delete(&self, record: &mut Record) -> Result<()> {
        let (_, relation) = role_relation(record.model())?;
        if relation.kind == RelationKind::BelongsTo {
            let role = role_relation_model(record).await?;
            if role.delete().await? {
                info!("Deleted `{}` role record", relation.related.table_name());
            }
        }
        Ok(())
    }
}
