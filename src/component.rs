//! User-defined component schemas and their per-entity instances.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::attribute::Attribute;
use crate::error::MapError;
use crate::meta::AttributeMap;

/// An instance of a component definition attached to a [`Metadata`](crate::Metadata).
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    definition: Uuid,
    attributes: AttributeMap,
}

impl Component {
    /// Creates an instance of `definition` with the given attribute values.
    pub fn new(definition: Uuid, attributes: AttributeMap) -> Self {
        Self {
            definition,
            attributes,
        }
    }

    /// The id of the definition this instance was created from.
    #[inline]
    pub fn definition(&self) -> Uuid {
        self.definition
    }

    #[inline]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Changes the value of an existing attribute without changing its kind,
    /// returning the previous value. The set of names follows the definition
    /// and is only changed through [`Map`](crate::Map).
    pub fn update(&mut self, name: &str, value: impl Into<Attribute>) -> Result<Attribute, MapError> {
        let value = value.into();
        let current = self
            .attributes
            .get(name)
            .ok_or_else(|| MapError::NameNotFound { name: name.to_owned() })?;
        if current.kind() != value.kind() {
            return Err(MapError::TypeMismatch {
                expected: current.kind(),
                actual: value.kind(),
            });
        }
        self.attributes.update(name, value)
    }

    #[inline]
    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// The components attached to one entity, at most one per definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentBundle {
    components: BTreeMap<Uuid, Component>,
}

impl ComponentBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a component, rejecting a second instance of the same definition.
    pub fn add(&mut self, component: Component) -> Result<(), MapError> {
        let id = component.definition();
        if self.components.contains_key(&id) {
            return Err(MapError::DuplicateComponent(id));
        }
        self.components.insert(id, component);
        Ok(())
    }

    /// Detaches and returns the instance of `definition`.
    pub fn remove(&mut self, definition: Uuid) -> Option<Component> {
        self.components.remove(&definition)
    }

    pub fn find(&self, definition: Uuid) -> Option<&Component> {
        self.components.get(&definition)
    }

    pub fn find_mut(&mut self, definition: Uuid) -> Option<&mut Component> {
        self.components.get_mut(&definition)
    }

    pub fn contains(&self, definition: Uuid) -> bool {
        self.components.contains_key(&definition)
    }

    /// Replaces every attribute of an instance with `values`, returning the previous values.
    pub fn reset(&mut self, definition: Uuid, values: AttributeMap) -> Result<AttributeMap, MapError> {
        let component = self
            .find_mut(definition)
            .ok_or(MapError::ComponentNotFound(definition))?;
        Ok(std::mem::replace(&mut component.attributes, values))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterates instances ordered by definition id.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }
}

/// A named component schema; its attribute values are the defaults for new instances.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    uuid: Uuid,
    name: String,
    attributes: AttributeMap,
}

impl ComponentDefinition {
    fn new(uuid: Uuid, name: String) -> Self {
        Self {
            uuid,
            name,
            attributes: AttributeMap::new(),
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

    #[inline]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    #[inline]
    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }

    /// Creates an instance carrying a copy of the default values.
    pub fn instantiate(&self) -> Component {
        Component::new(self.uuid, self.attributes.clone())
    }
}

/// All component definitions of a map, with unique names.
#[derive(Debug, Clone, Default)]
pub struct ComponentIndex {
    definitions: BTreeMap<Uuid, ComponentDefinition>,
}

impl ComponentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty definition and returns its id.
    pub fn define(&mut self, name: impl Into<String>) -> Result<Uuid, MapError> {
        let name = name.into();
        self.ensure_name_free(&name)?;
        let uuid = Uuid::new_v4();
        self.definitions.insert(uuid, ComponentDefinition::new(uuid, name));
        Ok(uuid)
    }

    /// Reinserts a previously removed definition under its old id.
    pub fn restore(&mut self, definition: ComponentDefinition) -> Result<(), MapError> {
        if self.definitions.contains_key(&definition.uuid) {
            return Err(MapError::DuplicateComponent(definition.uuid));
        }
        self.ensure_name_free(&definition.name)?;
        self.definitions.insert(definition.uuid, definition);
        Ok(())
    }

    /// Renames a definition, returning the previous name.
    pub fn rename(&mut self, uuid: Uuid, name: impl Into<String>) -> Result<String, MapError> {
        let name = name.into();
        let current = self
            .definitions
            .get(&uuid)
            .ok_or(MapError::ComponentNotFound(uuid))?;
        if current.name == name {
            return Ok(name);
        }
        self.ensure_name_free(&name)?;
        let def = self
            .definitions
            .get_mut(&uuid)
            .ok_or(MapError::ComponentNotFound(uuid))?;
        Ok(std::mem::replace(&mut def.name, name))
    }

    fn ensure_name_free(&self, name: &str) -> Result<(), MapError> {
        if self.find_by_name(name).is_some() {
            return Err(MapError::DuplicateName { name: name.to_owned() });
        }
        Ok(())
    }

    /// Removes a definition. Instances are not touched; see [`Map::remove_component_definition`](crate::Map::remove_component_definition).
    pub fn remove(&mut self, uuid: Uuid) -> Option<ComponentDefinition> {
        self.definitions.remove(&uuid)
    }

    pub fn find(&self, uuid: Uuid) -> Option<&ComponentDefinition> {
        self.definitions.get(&uuid)
    }

    pub fn find_mut(&mut self, uuid: Uuid) -> Option<&mut ComponentDefinition> {
        self.definitions.get_mut(&uuid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ComponentDefinition> {
        self.definitions.values().find(|def| def.name == name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.definitions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_names_are_unique() {
        let mut index = ComponentIndex::new();
        let health = index.define("Health").unwrap();
        assert!(matches!(index.define("Health"), Err(MapError::DuplicateName { .. })));

        let armor = index.define("Armor").unwrap();
        assert!(index.rename(armor, "Health").is_err());
        assert_eq!(index.find(armor).unwrap().name(), "Armor");

        assert_eq!(index.rename(health, "Vitality").unwrap(), "Health");
        assert!(index.find_by_name("Vitality").is_some());
    }

    #[test]
    fn instances_copy_definition_defaults() {
        let mut index = ComponentIndex::new();
        let id = index.define("Spawner").unwrap();
        let def = index.find_mut(id).unwrap();
        def.attributes_mut().add("rate", 2.0f32).unwrap();
        def.attributes_mut().add("kind", "slime").unwrap();

        let instance = index.find(id).unwrap().instantiate();
        assert_eq!(instance.definition(), id);
        assert_eq!(instance.attributes().get("rate"), Some(&Attribute::from(2.0f32)));
        assert_eq!(instance.attributes().len(), 2);
    }

    #[test]
    fn bundle_holds_one_instance_per_definition() {
        let def = Uuid::new_v4();
        let mut bundle = ComponentBundle::new();
        bundle.add(Component::new(def, AttributeMap::new())).unwrap();
        assert!(matches!(
            bundle.add(Component::new(def, AttributeMap::new())),
            Err(MapError::DuplicateComponent(id)) if id == def
        ));
        assert_eq!(bundle.len(), 1);
        assert!(bundle.remove(def).is_some());
        assert!(bundle.remove(def).is_none());
    }

    #[test]
    fn reset_returns_previous_values() {
        let def = Uuid::new_v4();
        let mut bundle = ComponentBundle::new();
        let values: AttributeMap = [("x", 3)].into_iter().collect();
        bundle.add(Component::new(def, values.clone())).unwrap();

        let defaults: AttributeMap = [("x", 0)].into_iter().collect();
        let previous = bundle.reset(def, defaults).unwrap();
        assert_eq!(previous, values);
        assert_eq!(bundle.find(def).unwrap().attributes().get("x"), Some(&Attribute::from(0)));
        assert!(bundle.reset(Uuid::new_v4(), AttributeMap::new()).is_err());
    }

    #[test]
    fn instance_updates_keep_names_and_kinds() {
        let values: AttributeMap = [("hp", 10)].into_iter().collect();
        let mut component = Component::new(Uuid::new_v4(), values);

        assert_eq!(component.update("hp", 7).unwrap(), Attribute::from(10));
        assert!(matches!(
            component.update("hp", "seven"),
            Err(MapError::TypeMismatch { .. })
        ));
        assert!(matches!(component.update("mp", 1), Err(MapError::NameNotFound { .. })));
        assert_eq!(component.attributes().get("hp"), Some(&Attribute::from(7)));
        assert_eq!(component.attributes().len(), 1);
    }

    #[test]
    fn restore_reuses_old_identity() {
        let mut index = ComponentIndex::new();
        let id = index.define("Door").unwrap();
        let removed = index.remove(id).unwrap();
        index.restore(removed).unwrap();
        assert_eq!(index.find(id).unwrap().name(), "Door");
    }
}
