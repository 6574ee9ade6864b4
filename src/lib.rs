pub mod error;
pub mod model;
pub mod orm;
pub mod query;
pub mod record;
pub mod relation;
pub mod role;
pub mod settings;

pub use error::{Error, Result};
pub use model::{LifecycleHooks, Model};
pub use orm::{Attributes, Db, Value};
pub use query::Query;
pub use record::{AttributeSource, Record};
pub use relation::{Relation, RelationKind};
pub use role::{Context, InheritRole};
