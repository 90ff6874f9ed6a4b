//! Hierarchical group data: the schema ([`Schema`]), the runtime instance
//! arena ([`GroupTree`]), row ingestion and sibling ordering.

pub mod build;
pub mod field;
pub mod model;
pub mod order;
pub mod tree;

pub use build::Row;
pub use field::{DataField, FieldLookup, FieldSlot, FieldType};
pub use model::{FieldDecl, GroupModel, KeySpec, ModelId, Schema};
pub use order::{GroupOrder, OrderBy};
pub use tree::{Group, GroupId, GroupList, GroupTree};
