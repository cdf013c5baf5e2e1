//! Definition store: persistence for type and part definitions.

use super::{ContentTypeDefinition, PartDefinition, TypePartDefinition};
use crate::error::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};

/// Tree name for content type definitions.
const TYPES_TREE: &str = "definitions:types";

/// Tree name for part definitions.
const PARTS_TREE: &str = "definitions:parts";

/// Mutator applied by an alter operation. Returns whether it changed anything.
pub type AlterFn<'a, T> = dyn FnMut(&mut T) -> Result<bool, Error> + 'a;

/// Access to stored content definitions.
///
/// Each alter is an atomic read-modify-write of a single definition and is
/// skipped entirely when the mutator reports no change. Nothing spans more
/// than one definition.
pub trait DefinitionStore: Send + Sync {
    /// Load every content type definition.
    fn load_type_definitions(&self) -> Result<Vec<ContentTypeDefinition>, Error>;

    /// Load every standalone part definition.
    fn load_part_definitions(&self) -> Result<Vec<PartDefinition>, Error>;

    /// Alter one part reference of a content type. Returns whether it was persisted.
    fn alter_type_part_definition(
        &self,
        type_name: &str,
        part_name: &str,
        alter: &mut AlterFn<'_, TypePartDefinition>,
    ) -> Result<bool, Error>;

    /// Alter a standalone part definition. Returns whether it was persisted.
    fn alter_part_definition(
        &self,
        name: &str,
        alter: &mut AlterFn<'_, PartDefinition>,
    ) -> Result<bool, Error>;

    /// Make all prior alters durable.
    fn flush(&self) -> Result<(), Error>;
}

/// Sled-backed definition store.
pub struct SledDefinitionStore {
    /// Content type definitions keyed by name.
    types_tree: Tree,
    /// Part definitions keyed by name.
    parts_tree: Tree,
}

impl SledDefinitionStore {
    /// Open or create the store in the given sled database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        Ok(Self {
            types_tree: db.open_tree(TYPES_TREE)?,
            parts_tree: db.open_tree(PARTS_TREE)?,
        })
    }

    /// Insert or replace a content type definition.
    pub fn store_type_definition(&self, definition: &ContentTypeDefinition) -> Result<(), Error> {
        self.types_tree
            .insert(definition.name.as_bytes(), definition.to_bytes()?)?;
        Ok(())
    }

    /// Insert or replace a part definition.
    pub fn store_part_definition(&self, definition: &PartDefinition) -> Result<(), Error> {
        self.parts_tree
            .insert(definition.name.as_bytes(), definition.to_bytes()?)?;
        Ok(())
    }

    /// Get a content type definition by name.
    pub fn get_type_definition(&self, name: &str) -> Result<Option<ContentTypeDefinition>, Error> {
        match self.types_tree.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(ContentTypeDefinition::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a part definition by name.
    pub fn get_part_definition(&self, name: &str) -> Result<Option<PartDefinition>, Error> {
        match self.parts_tree.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(PartDefinition::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_all<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, Error> {
        let mut definitions = Vec::new();
        for result in tree.iter() {
            let (_, value) = result?;
            definitions.push(
                serde_json::from_slice(&value)
                    .map_err(|e| Error::Deserialization(e.to_string()))?,
            );
        }
        Ok(definitions)
    }

    /// Compare-and-swap loop over one definition. The mutator is re-run on
    /// fresh data if a concurrent writer got in between.
    fn read_modify_write<T, F>(tree: &Tree, name: &str, mut alter: F) -> Result<bool, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> Result<bool, Error>,
    {
        loop {
            let current = tree
                .get(name.as_bytes())?
                .ok_or_else(|| Error::NotFound(name.to_string()))?;

            let mut definition: T = serde_json::from_slice(&current)
                .map_err(|e| Error::Deserialization(e.to_string()))?;
            if !alter(&mut definition)? {
                return Ok(false);
            }

            let updated = serde_json::to_vec(&definition)?;
            match tree.compare_and_swap(name.as_bytes(), Some(current), Some(updated))? {
                Ok(()) => return Ok(true),
                Err(_) => {
                    tracing::debug!(definition = name, "concurrent alter detected, retrying");
                }
            }
        }
    }
}

impl DefinitionStore for SledDefinitionStore {
    fn load_type_definitions(&self) -> Result<Vec<ContentTypeDefinition>, Error> {
        Self::load_all(&self.types_tree)
    }

    fn load_part_definitions(&self) -> Result<Vec<PartDefinition>, Error> {
        Self::load_all(&self.parts_tree)
    }

    fn alter_type_part_definition(
        &self,
        type_name: &str,
        part_name: &str,
        alter: &mut AlterFn<'_, TypePartDefinition>,
    ) -> Result<bool, Error> {
        Self::read_modify_write(
            &self.types_tree,
            type_name,
            |definition: &mut ContentTypeDefinition| {
                let part = definition
                    .part_mut(part_name)
                    .ok_or_else(|| Error::NotFound(format!("{}.{}", type_name, part_name)))?;
                alter(part)
            },
        )
    }

    fn alter_part_definition(
        &self,
        name: &str,
        alter: &mut AlterFn<'_, PartDefinition>,
    ) -> Result<bool, Error> {
        Self::read_modify_write(&self.parts_tree, name, |definition: &mut PartDefinition| {
            alter(definition)
        })
    }

    fn flush(&self) -> Result<(), Error> {
        self.types_tree.flush()?;
        self.parts_tree.flush()?;
        Ok(())
    }
}
