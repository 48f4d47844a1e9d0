//! Identity, names and user properties shared by every document entity.

use std::collections::btree_map;
use std::collections::BTreeMap;

use uuid::Uuid;

use crate::attribute::{Attribute, AttributeType};
use crate::component::ComponentBundle;
use crate::error::MapError;

/// Name → [`Attribute`] mapping with case-sensitive unique names.
///
/// Used both for the property bundle of a [`Metadata`] and for the fields
/// of components and component definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: BTreeMap<String, Attribute>,
}

impl AttributeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new attribute, rejecting names that are already taken.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Attribute>) -> Result<(), MapError> {
        let name = name.into();
        match self.entries.entry(name) {
            btree_map::Entry::Occupied(e) => Err(MapError::DuplicateName {
                name: e.key().clone(),
            }),
            btree_map::Entry::Vacant(e) => {
                e.insert(value.into());
                Ok(())
            }
        }
    }

    /// Inserts or replaces an attribute, returning the replaced value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Attribute>) -> Option<Attribute> {
        self.entries.insert(name.into(), value.into())
    }

    /// Removes an attribute and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.entries.remove(name)
    }

    /// Renames an attribute, keeping its value.
    ///
    /// Fails without changing anything if `from` is missing or `to` is taken.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> Result<(), MapError> {
        let to = to.into();
        if !self.entries.contains_key(from) {
            return Err(MapError::NameNotFound { name: from.to_owned() });
        }
        if from == to {
            return Ok(());
        }
        if self.entries.contains_key(&to) {
            return Err(MapError::DuplicateName { name: to });
        }
        if let Some(value) = self.entries.remove(from) {
            self.entries.insert(to, value);
        }
        Ok(())
    }

    /// Replaces the value of an existing attribute, returning the previous value.
    pub fn update(&mut self, name: &str, value: impl Into<Attribute>) -> Result<Attribute, MapError> {
        let slot = self.slot(name)?;
        Ok(std::mem::replace(slot, value.into()))
    }

    /// Resets an existing attribute to the default of `kind`, returning the previous value.
    pub fn change_type(&mut self, name: &str, kind: AttributeType) -> Result<Attribute, MapError> {
        let slot = self.slot(name)?;
        Ok(std::mem::replace(slot, Attribute::new(kind)))
    }

    fn slot(&mut self, name: &str) -> Result<&mut Attribute, MapError> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| MapError::NameNotFound { name: name.to_owned() })
    }

    /// Returns the attribute with the given name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.entries.get(name)
    }

    /// Whether an attribute with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Attribute>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Identity, display name, properties and components of a document entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    uuid: Uuid,
    name: String,
    properties: AttributeMap,
    components: ComponentBundle,
}

impl Metadata {
    /// Creates metadata with a fresh identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uuid(Uuid::new_v4(), name)
    }

    /// Creates metadata with a specific identity.
    pub fn with_uuid(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            properties: AttributeMap::new(),
            components: ComponentBundle::new(),
        }
    }

    /// Copies name, properties and components under a fresh identity.
    pub fn duplicate(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            ..self.clone()
        }
    }

    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the display name, returning the previous one.
    pub fn set_name(&mut self, name: impl Into<String>) -> String {
        std::mem::replace(&mut self.name, name.into())
    }

    #[inline]
    pub fn properties(&self) -> &AttributeMap {
        &self.properties
    }

    #[inline]
    pub fn properties_mut(&mut self) -> &mut AttributeMap {
        &mut self.properties
    }

    #[inline]
    pub fn components(&self) -> &ComponentBundle {
        &self.components
    }

    #[inline]
    pub fn components_mut(&mut self) -> &mut ComponentBundle {
        &mut self.components
    }
}
