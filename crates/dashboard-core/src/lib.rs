pub mod error;
pub mod kind;
pub mod labels;
pub mod object;
pub mod organization;
pub mod project;
pub mod schema;
pub mod slug;

pub use error::{CoreError, Result};
pub use kind::ResourceKind;
pub use object::{Condition, Labels, Object, ObjectKey, ObjectMeta, ObjectStatus, OwnerReference, Phase};
pub use organization::Organization;
pub use project::ProjectNamespace;
pub use schema::{SchemaDescriptor, SchemaScope};
pub use slug::{slugify, validate_slug};
