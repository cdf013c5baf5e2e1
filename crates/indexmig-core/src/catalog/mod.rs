//! Content definition catalog.
//!
//! Content types, their attached parts, standalone parts and fields, each
//! carrying a JSON settings map, plus the store they are persisted in.

mod definition;
mod store;

pub use definition::{
    ContentTypeDefinition, FieldDefinition, PartDefinition, SettingsMap, TypePartDefinition,
};
pub use store::{AlterFn, DefinitionStore, SledDefinitionStore};
