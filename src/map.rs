use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use macroquad::math::{vec2, Vec2};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::attribute::{Attribute, AttributeType};
use crate::command::TilePatch;
use crate::component::{Component, ComponentDefinition, ComponentIndex};
use crate::config::{DuplicateObjectPolicy, MapConfig};
use crate::error::MapError;
use crate::layer::{
    GroupLayer, Layer, LayerKind, LayerSubtree, LayerTree, LayerVisitor, Object, ObjectKind,
    ObjectLayer, PersistentIds, TileLayer,
};
use crate::loader::json_loader::{decode_map_file, encode_map_file};
use crate::meta::{AttributeMap, Metadata};
use crate::spatial::{check_extent, TileExtent, TileId, TilePos};
use crate::tileset::TilesetBundle;

/// A component definition removed from a map, with the values every context
/// held for it at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedComponent {
    pub definition: ComponentDefinition,
    pub instances: BTreeMap<Uuid, AttributeMap>,
}

/// A [`Map::restore_layer`] that was refused. The subtree is returned
/// untouched so the caller still owns it.
#[derive(Debug, Error)]
#[error("cannot restore layer {}: {error}", .subtree.root_uuid())]
pub struct RestoreLayerError {
    #[source]
    pub error: MapError,
    pub subtree: LayerSubtree,
}

/// The document root: a tree of layers over a fixed-size tile grid.
#[derive(Debug)]
pub struct Map {
    meta: Metadata,
    extent: TileExtent,
    tile_width: u32,
    tile_height: u32,
    layers: LayerTree,
    tilesets: TilesetBundle,
    components: ComponentIndex,
    active_layer: Option<Uuid>,
    ids: PersistentIds,
    tile_layer_suffix: i32,
    object_layer_suffix: i32,
    group_layer_suffix: i32,
    object_policy: DuplicateObjectPolicy,
}

impl Map {
    /// Creates an empty map with default tile size and policies.
    pub fn new(rows: usize, cols: usize) -> Result<Self, MapError> {
        Self::with_config(&MapConfig {
            rows,
            cols,
            ..MapConfig::default()
        })
    }

    pub fn with_config(config: &MapConfig) -> Result<Self, MapError> {
        check_extent(config.rows, config.cols)?;
        Ok(Self {
            meta: Metadata::new("Map"),
            extent: TileExtent::new(config.rows, config.cols),
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            layers: LayerTree::new(),
            tilesets: TilesetBundle::new(),
            components: ComponentIndex::new(),
            active_layer: None,
            ids: PersistentIds::default(),
            tile_layer_suffix: 1,
            object_layer_suffix: 1,
            group_layer_suffix: 1,
            object_policy: config.object_policy,
        })
    }

    /// Reads a JSON document from disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let ir = decode_map_file(path)?;
        Self::from_ir(ir).with_context(|| format!("Building map from {}", path.display()))
    }

    /// Writes the document to disk as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        encode_map_file(&self.to_ir(), path)
            .with_context(|| format!("Saving map to {}", path.display()))
    }

    #[inline] pub fn uuid(&self) -> Uuid { self.meta.uuid() }
    #[inline] pub fn meta(&self) -> &Metadata { &self.meta }
    #[inline] pub fn meta_mut(&mut self) -> &mut Metadata { &mut self.meta }
    #[inline] pub fn extent(&self) -> TileExtent { self.extent }
    #[inline] pub fn row_count(&self) -> usize { self.extent.rows }
    #[inline] pub fn column_count(&self) -> usize { self.extent.cols }
    #[inline] pub fn tile_width(&self) -> u32 { self.tile_width }
    #[inline] pub fn tile_height(&self) -> u32 { self.tile_height }
    #[inline] pub fn layers(&self) -> &LayerTree { &self.layers }
    #[inline] pub fn tilesets(&self) -> &TilesetBundle { &self.tilesets }
    #[inline] pub fn tilesets_mut(&mut self) -> &mut TilesetBundle { &mut self.tilesets }
    #[inline] pub fn component_index(&self) -> &ComponentIndex { &self.components }
    #[inline] pub fn persistent_ids(&self) -> PersistentIds { self.ids }
    #[inline] pub fn object_policy(&self) -> DuplicateObjectPolicy { self.object_policy }

    /// Tile size in pixels as a vector, for hit testing.
    #[inline]
    pub fn tile_size(&self) -> Vec2 {
        vec2(self.tile_width as f32, self.tile_height as f32)
    }

    pub fn set_tile_size(&mut self, width: u32, height: u32) {
        self.tile_width = width;
        self.tile_height = height;
    }

    /// Gives every layer and object without a persistent id the next free
    /// one, in pre-order and object order.
    pub(crate) fn assign_missing_persistent_ids(&mut self) -> Result<(), MapError> {
        let Self { layers, ids, .. } = self;
        let mut result = Ok(());
        layers.each_mut(|layer| {
            if result.is_err() {
                return;
            }
            result = assign_ids(layer, ids);
        });
        result
    }

    pub(crate) fn set_persistent_ids(&mut self, ids: PersistentIds) {
        self.ids = ids;
    }

    // -- Layers --

    /// Adds an empty tile layer named "Tile Layer N" under `parent` (the root when `None`).
    pub fn add_tile_layer(&mut self, parent: Option<Uuid>) -> Result<Uuid, MapError> {
        let name = format!("Tile Layer {}", self.tile_layer_suffix);
        let layer = TileLayer::new(name, self.extent)?;
        let uuid = self.add_layer(layer, parent)?;
        self.tile_layer_suffix += 1;
        Ok(uuid)
    }

    /// Adds an empty object layer named "Object Layer N".
    pub fn add_object_layer(&mut self, parent: Option<Uuid>) -> Result<Uuid, MapError> {
        let name = format!("Object Layer {}", self.object_layer_suffix);
        let layer = ObjectLayer::with_policy(name, self.object_policy);
        let uuid = self.add_layer(layer, parent)?;
        self.object_layer_suffix += 1;
        Ok(uuid)
    }

    /// Adds an empty group layer named "Group Layer N".
    pub fn add_group_layer(&mut self, parent: Option<Uuid>) -> Result<Uuid, MapError> {
        let name = format!("Group Layer {}", self.group_layer_suffix);
        let uuid = self.add_layer(GroupLayer::new(name), parent)?;
        self.group_layer_suffix += 1;
        Ok(uuid)
    }

    fn add_layer(&mut self, layer: impl Into<Layer>, parent: Option<Uuid>) -> Result<Uuid, MapError> {
        let mut layer = layer.into();
        let parent = parent.unwrap_or_else(|| self.layers.root_uuid());
        // Check before allocating so a failed insert does not burn an id.
        if parent != self.layers.root_uuid() && self.layers.find_group_layer(parent).is_none() {
            return Err(if self.layers.contains(parent) {
                MapError::NotAGroup(parent)
            } else {
                MapError::LayerNotFound(parent)
            });
        }
        layer.set_persistent_id(Some(self.ids.next_layer()?));
        self.layers.append_layer_to(parent, layer)
    }

    /// Inserts a layer built elsewhere (a loader) without allocating a new
    /// persistent id; default-name counters skip past it.
    pub(crate) fn insert_loaded_layer(
        &mut self,
        parent: Option<Uuid>,
        layer: Layer,
    ) -> Result<Uuid, MapError> {
        match layer.kind() {
            LayerKind::Tile => self.tile_layer_suffix += 1,
            LayerKind::Object => self.object_layer_suffix += 1,
            LayerKind::Group => self.group_layer_suffix += 1,
        }
        let parent = parent.unwrap_or_else(|| self.layers.root_uuid());
        self.restore_layer(layer.into(), parent, usize::MAX)
            .map_err(|rejected| rejected.error)
    }

    /// Reinserts a removed subtree at `index` under `parent`, clamping the
    /// index to the end. Tile layers are resized to the current map extent.
    ///
    /// On failure nothing is changed and the subtree is handed back inside
    /// the error.
    pub fn restore_layer(
        &mut self,
        mut subtree: LayerSubtree,
        parent: Uuid,
        index: usize,
    ) -> Result<Uuid, RestoreLayerError> {
        let checked = self
            .layers
            .child_count(parent)
            .map(|len| index.min(len))
            .and_then(|index| {
                self.layers
                    .check_attach(parent, &subtree, index)
                    .map(|()| index)
            });
        let index = match checked {
            Ok(index) => index,
            Err(error) => return Err(RestoreLayerError { error, subtree }),
        };

        let extent = self.extent;
        let resized = subtree.layers_mut().try_for_each(|layer| match layer {
            Layer::Tile(tile_layer) => tile_layer.resize(extent),
            _ => Ok(()),
        });
        if let Err(error) = resized {
            return Err(RestoreLayerError { error, subtree });
        }
        Ok(self.layers.attach_checked(parent, subtree, index))
    }

    /// Detaches a layer and its descendants. The active layer is cleared if it
    /// was part of the removed subtree.
    pub fn remove_layer(&mut self, uuid: Uuid) -> Option<LayerSubtree> {
        let removed = self.layers.remove_layer(uuid)?;
        if let Some(active) = self.active_layer {
            if removed.get(active).is_some() {
                self.active_layer = None;
            }
        }
        Some(removed)
    }

    pub fn duplicate_layer(&mut self, uuid: Uuid) -> Option<Uuid> {
        self.layers.duplicate_layer(uuid, &mut self.ids)
    }

    pub fn move_layer_up(&mut self, uuid: Uuid) -> bool {
        self.layers.move_layer_up(uuid)
    }

    pub fn move_layer_down(&mut self, uuid: Uuid) -> bool {
        self.layers.move_layer_down(uuid)
    }

    pub fn can_move_layer_up(&self, uuid: Uuid) -> bool {
        self.layers.can_move_layer_up(uuid)
    }

    pub fn can_move_layer_down(&self, uuid: Uuid) -> bool {
        self.layers.can_move_layer_down(uuid)
    }

    pub fn set_layer_index(&mut self, uuid: Uuid, index: usize) -> Result<(), MapError> {
        self.layers.set_layer_index(uuid, index)
    }

    /// Makes `uuid` the active layer.
    pub fn select_layer(&mut self, uuid: Uuid) -> Result<(), MapError> {
        if !self.layers.contains(uuid) {
            return Err(MapError::LayerNotFound(uuid));
        }
        self.active_layer = Some(uuid);
        Ok(())
    }

    #[inline]
    pub fn active_layer(&self) -> Option<Uuid> {
        self.active_layer
    }

    pub fn is_active_layer(&self, uuid: Uuid) -> bool {
        self.active_layer == Some(uuid)
    }

    /// Number of layers, the implicit root excluded.
    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.layer_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn local_index(&self, uuid: Uuid) -> Option<usize> {
        self.layers.local_index(uuid)
    }

    pub fn global_index(&self, uuid: Uuid) -> Option<usize> {
        self.layers.global_index(uuid)
    }

    pub fn find_layer(&self, uuid: Uuid) -> Option<&Layer> {
        self.layers.find_layer(uuid)
    }

    pub fn find_layer_mut(&mut self, uuid: Uuid) -> Option<&mut Layer> {
        self.layers.find_layer_mut(uuid)
    }

    pub fn find_tile_layer(&self, uuid: Uuid) -> Option<&TileLayer> {
        self.layers.find_tile_layer(uuid)
    }

    pub fn find_tile_layer_mut(&mut self, uuid: Uuid) -> Option<&mut TileLayer> {
        self.layers.find_tile_layer_mut(uuid)
    }

    pub fn find_object_layer(&self, uuid: Uuid) -> Option<&ObjectLayer> {
        self.layers.find_object_layer(uuid)
    }

    pub fn find_object_layer_mut(&mut self, uuid: Uuid) -> Option<&mut ObjectLayer> {
        self.layers.find_object_layer_mut(uuid)
    }

    pub fn find_group_layer(&self, uuid: Uuid) -> Option<&GroupLayer> {
        self.layers.find_group_layer(uuid)
    }

    pub fn find_parent_layer(&self, uuid: Uuid) -> Option<&GroupLayer> {
        self.layers.find_parent_layer(uuid)
    }

    pub fn each(&self, f: impl FnMut(&Layer)) {
        self.layers.each(f);
    }

    pub fn visit_layers<V: LayerVisitor + ?Sized>(&self, visitor: &mut V) {
        self.layers.visit_layers(visitor);
    }

    // -- Extent --

    pub fn add_row(&mut self) {
        self.extent.rows += 1;
        self.layers.each_mut(|layer| {
            if let Layer::Tile(tile_layer) = layer {
                tile_layer.add_row();
            }
        });
    }

    pub fn add_column(&mut self) {
        self.extent.cols += 1;
        self.layers.each_mut(|layer| {
            if let Layer::Tile(tile_layer) = layer {
                tile_layer.add_column();
            }
        });
    }

    /// Removes the bottom row everywhere. Fails when the map has one row.
    pub fn remove_row(&mut self) -> Result<(), MapError> {
        self.resize(self.extent.rows.saturating_sub(1), self.extent.cols)
    }

    /// Removes the rightmost column everywhere. Fails when the map has one column.
    pub fn remove_column(&mut self) -> Result<(), MapError> {
        self.resize(self.extent.rows, self.extent.cols.saturating_sub(1))
    }

    /// Sets the map extent and resizes every tile layer to match.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<(), MapError> {
        check_extent(rows, cols)?;
        let extent = TileExtent::new(rows, cols);
        for id in self.layers.layer_ids() {
            if let Some(tile_layer) = self.layers.find_tile_layer_mut(id) {
                tile_layer.resize(extent)?;
            }
        }
        debug!(from = %self.extent, to = %extent, "resized map");
        self.extent = extent;
        Ok(())
    }

    // -- Tiles --

    /// Clears every tile id no attached tileset provides.
    ///
    /// Returns, for each tile layer, the ids that were cleared so the change
    /// can be undone with [`TilePatch::apply`].
    pub fn fix_tiles(&mut self) -> BTreeMap<Uuid, TilePatch> {
        let mut result = BTreeMap::new();
        let mut fixed = 0usize;
        for id in self.layers.layer_ids() {
            let Some(tile_layer) = self.layers.find_tile_layer_mut(id) else {
                continue;
            };
            let invalid: TilePatch = tile_layer
                .matrix()
                .iter()
                .filter(|(_, tile)| !tile.is_empty() && !self.tilesets.is_valid_tile(*tile))
                .collect();
            for (pos, _) in invalid.iter() {
                tile_layer.set_tile(pos, TileId::EMPTY);
            }
            fixed += invalid.len();
            result.insert(id, invalid);
        }
        if fixed > 0 {
            warn!(fixed, "cleared tiles without a tileset");
        }
        result
    }

    /// Bucket fill on a tile layer. Returns the patch that undoes it.
    pub fn flood(&mut self, layer: Uuid, origin: TilePos, replacement: TileId) -> Result<TilePatch, MapError> {
        let tile_layer = self
            .layers
            .find_tile_layer_mut(layer)
            .ok_or(MapError::LayerNotFound(layer))?;
        let Some(previous) = tile_layer.tile_at(origin) else {
            return Ok(TilePatch::new());
        };
        let mut affected = Vec::new();
        tile_layer.flood(origin, replacement, Some(&mut affected));
        Ok(TilePatch::from_affected(&affected, previous))
    }

    // -- Objects --

    /// Creates an object on an object layer and returns its id.
    pub fn add_object(
        &mut self,
        layer: Uuid,
        kind: ObjectKind,
        position: Vec2,
        size: Vec2,
    ) -> Result<Uuid, MapError> {
        let object_layer = self
            .layers
            .find_object_layer_mut(layer)
            .ok_or(MapError::LayerNotFound(layer))?;
        let mut object = Object::new(kind);
        object.set_position(position);
        object.set_size(size);
        object.set_persistent_id(Some(self.ids.next_object()?));
        let uuid = object.uuid();
        object_layer.add_object(object)?;
        Ok(uuid)
    }

    /// Puts a previously removed object back, keeping its identity.
    pub fn restore_object(&mut self, layer: Uuid, object: Object) -> Result<(), MapError> {
        self.layers
            .find_object_layer_mut(layer)
            .ok_or(MapError::LayerNotFound(layer))?
            .add_object(object)
    }

    pub fn remove_object(&mut self, layer: Uuid, object: Uuid) -> Result<Object, MapError> {
        self.layers
            .find_object_layer_mut(layer)
            .ok_or(MapError::LayerNotFound(layer))?
            .remove_object(object)
    }

    /// Id of the object layer holding `object`.
    pub fn find_object_owner(&self, object: Uuid) -> Option<Uuid> {
        let mut owner = None;
        self.layers.each(|layer| {
            if let Layer::Object(object_layer) = layer {
                if owner.is_none() && object_layer.find_object(object).is_some() {
                    owner = Some(layer.uuid());
                }
            }
        });
        owner
    }

    pub fn find_object(&self, object: Uuid) -> Option<&Object> {
        let owner = self.find_object_owner(object)?;
        self.layers.find_object_layer(owner)?.find_object(object)
    }

    // -- Contexts --

    /// Metadata of any entity in the document: the map, a layer, an object or a tileset.
    pub fn find_context(&self, uuid: Uuid) -> Option<&Metadata> {
        if uuid == self.meta.uuid() {
            return Some(&self.meta);
        }
        if let Some(layer) = self.layers.find_layer(uuid) {
            return Some(layer.meta());
        }
        if let Some(object) = self.find_object(uuid) {
            return Some(object.meta());
        }
        self.tilesets.find(uuid).map(|r| r.tileset().meta())
    }

    pub fn find_context_mut(&mut self, uuid: Uuid) -> Option<&mut Metadata> {
        if uuid == self.meta.uuid() {
            return Some(&mut self.meta);
        }
        if self.layers.contains(uuid) {
            return self.layers.find_layer_mut(uuid).map(Layer::meta_mut);
        }
        if let Some(owner) = self.find_object_owner(uuid) {
            return self
                .layers
                .find_object_layer_mut(owner)?
                .find_object_mut(uuid)
                .map(Object::meta_mut);
        }
        self.tilesets
            .find_mut(uuid)
            .map(|r| r.tileset_mut().meta_mut())
    }

    fn each_context_mut(&mut self, mut f: impl FnMut(&mut Metadata)) {
        f(&mut self.meta);
        self.layers.each_mut(|layer| {
            f(layer.meta_mut());
            if let Layer::Object(object_layer) = layer {
                for object in object_layer.objects_mut() {
                    f(object.meta_mut());
                }
            }
        });
        for tileset_ref in self.tilesets.iter_mut() {
            f(tileset_ref.tileset_mut().meta_mut());
        }
    }

    // -- Components --

    /// Creates an empty component definition.
    pub fn define_component(&mut self, name: impl Into<String>) -> Result<Uuid, MapError> {
        self.components.define(name)
    }

    /// Renames a definition, returning the previous name.
    pub fn rename_component(&mut self, definition: Uuid, name: impl Into<String>) -> Result<String, MapError> {
        self.components.rename(definition, name)
    }

    fn definition_mut(&mut self, definition: Uuid) -> Result<&mut ComponentDefinition, MapError> {
        self.components
            .find_mut(definition)
            .ok_or(MapError::ComponentNotFound(definition))
    }

    /// Adds an attribute to a definition and to every attached instance.
    pub fn add_component_attribute(
        &mut self,
        definition: Uuid,
        name: &str,
        value: impl Into<Attribute>,
    ) -> Result<(), MapError> {
        let value = value.into();
        self.definition_mut(definition)?
            .attributes_mut()
            .add(name, value.clone())?;
        self.each_context_mut(|meta| {
            if let Some(component) = meta.components_mut().find_mut(definition) {
                component.attributes_mut().insert(name, value.clone());
            }
        });
        Ok(())
    }

    /// Removes an attribute from a definition and every instance, returning
    /// the definition's default value.
    pub fn remove_component_attribute(&mut self, definition: Uuid, name: &str) -> Result<Attribute, MapError> {
        let previous = self
            .definition_mut(definition)?
            .attributes_mut()
            .remove(name)
            .ok_or_else(|| MapError::NameNotFound { name: name.to_owned() })?;
        self.each_context_mut(|meta| {
            if let Some(component) = meta.components_mut().find_mut(definition) {
                component.attributes_mut().remove(name);
            }
        });
        Ok(previous)
    }

    /// Renames an attribute in a definition and every instance. Nothing
    /// changes unless the rename succeeds everywhere.
    pub fn rename_component_attribute(&mut self, definition: Uuid, from: &str, to: &str) -> Result<(), MapError> {
        self.definition_mut(definition)?;
        if from != to {
            let mut clash = false;
            self.each_context_mut(|meta| {
                if let Some(component) = meta.components().find(definition) {
                    clash |= component.attributes().contains(to);
                }
            });
            if clash {
                return Err(MapError::DuplicateName { name: to.to_owned() });
            }
        }
        self.definition_mut(definition)?
            .attributes_mut()
            .rename(from, to)?;

        let mut result = Ok(());
        self.each_context_mut(|meta| {
            if let Some(component) = meta.components_mut().find_mut(definition) {
                if result.is_ok() && component.attributes().contains(from) {
                    result = component.attributes_mut().rename(from, to);
                }
            }
        });
        result
    }

    /// Changes an attribute's type in a definition and resets it to the new
    /// default in every instance. Returns the definition's previous value.
    pub fn set_component_attribute_type(
        &mut self,
        definition: Uuid,
        name: &str,
        kind: AttributeType,
    ) -> Result<Attribute, MapError> {
        let previous = self
            .definition_mut(definition)?
            .attributes_mut()
            .change_type(name, kind)?;
        self.each_context_mut(|meta| {
            if let Some(component) = meta.components_mut().find_mut(definition) {
                component.attributes_mut().insert(name, Attribute::new(kind));
            }
        });
        Ok(previous)
    }

    /// Changes the default value of a definition attribute. Existing instances
    /// keep their values.
    pub fn update_component_attribute(
        &mut self,
        definition: Uuid,
        name: &str,
        value: impl Into<Attribute>,
    ) -> Result<Attribute, MapError> {
        self.definition_mut(definition)?
            .attributes_mut()
            .update(name, value)
    }

    /// Attaches a fresh instance of `definition` to a context.
    pub fn attach_component(&mut self, context: Uuid, definition: Uuid) -> Result<(), MapError> {
        let component = self
            .components
            .find(definition)
            .ok_or(MapError::ComponentNotFound(definition))?
            .instantiate();
        self.find_context_mut(context)
            .ok_or(MapError::ContextNotFound(context))?
            .components_mut()
            .add(component)
    }

    /// Detaches the instance of `definition` from a context.
    pub fn detach_component(&mut self, context: Uuid, definition: Uuid) -> Result<Component, MapError> {
        self.find_context_mut(context)
            .ok_or(MapError::ContextNotFound(context))?
            .components_mut()
            .remove(definition)
            .ok_or(MapError::ComponentNotFound(definition))
    }

    /// Resets an instance to the definition's defaults, returning its previous values.
    pub fn reset_component(&mut self, context: Uuid, definition: Uuid) -> Result<AttributeMap, MapError> {
        let defaults = self
            .components
            .find(definition)
            .ok_or(MapError::ComponentNotFound(definition))?
            .attributes()
            .clone();
        self.find_context_mut(context)
            .ok_or(MapError::ContextNotFound(context))?
            .components_mut()
            .reset(definition, defaults)
    }

    /// Removes a definition and strips its instances from every context.
    pub fn remove_component_definition(&mut self, definition: Uuid) -> Result<RemovedComponent, MapError> {
        let removed = self
            .components
            .remove(definition)
            .ok_or(MapError::ComponentNotFound(definition))?;
        let mut instances = BTreeMap::new();
        self.each_context_mut(|meta| {
            if let Some(component) = meta.components_mut().remove(definition) {
                instances.insert(meta.uuid(), component.attributes().clone());
            }
        });
        debug!(component = %definition, instances = instances.len(), "removed component definition");
        Ok(RemovedComponent {
            definition: removed,
            instances,
        })
    }

    /// Undoes [`remove_component_definition`](Self::remove_component_definition).
    /// Contexts that no longer exist are skipped.
    pub fn restore_component_definition(&mut self, removed: RemovedComponent) -> Result<(), MapError> {
        let RemovedComponent {
            definition,
            instances,
        } = removed;
        let id = definition.uuid();
        self.components.restore(definition)?;
        for (context, values) in instances {
            match self.find_context_mut(context) {
                Some(meta) => meta.components_mut().add(Component::new(id, values))?,
                None => warn!(%context, component = %id, "context vanished before component restore"),
            }
        }
        Ok(())
    }
}

fn assign_ids(layer: &mut Layer, ids: &mut PersistentIds) -> Result<(), MapError> {
    if layer.persistent_id().is_none() {
        layer.set_persistent_id(Some(ids.next_layer()?));
    }
    if let Some(objects) = layer.as_object_layer_mut() {
        for object in objects.objects_mut() {
            if object.persistent_id().is_none() {
                object.set_persistent_id(Some(ids.next_object()?));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tileset::Tileset;

    #[test]
    fn factories_assign_names_and_persistent_ids() {
        let mut map = Map::new(4, 4).unwrap();
        let a = map.add_tile_layer(None).unwrap();
        let b = map.add_tile_layer(None).unwrap();
        let g = map.add_group_layer(None).unwrap();
        let o = map.add_object_layer(Some(g)).unwrap();

        assert_eq!(map.find_layer(a).unwrap().name(), "Tile Layer 1");
        assert_eq!(map.find_layer(b).unwrap().name(), "Tile Layer 2");
        assert_eq!(map.find_layer(g).unwrap().name(), "Group Layer 1");
        assert_eq!(map.find_layer(o).unwrap().name(), "Object Layer 1");
        assert_eq!(map.find_layer(o).unwrap().persistent_id(), Some(4));
        assert_eq!(map.find_tile_layer(a).unwrap().extent(), TileExtent::new(4, 4));
        assert_eq!(map.find_parent_layer(o).unwrap().children(), &[o]);
    }

    #[test]
    fn adding_under_non_group_fails_without_side_effects() {
        let mut map = Map::new(2, 2).unwrap();
        let tile = map.add_tile_layer(None).unwrap();
        assert!(matches!(map.add_tile_layer(Some(tile)), Err(MapError::NotAGroup(_))));
        assert!(matches!(
            map.add_group_layer(Some(Uuid::new_v4())),
            Err(MapError::LayerNotFound(_))
        ));
        assert_eq!(map.layer_count(), 1);
        assert_eq!(map.persistent_ids().next_layer_id, 2);
        let next = map.add_tile_layer(None).unwrap();
        assert_eq!(map.find_layer(next).unwrap().name(), "Tile Layer 2");
    }

    #[test]
    fn zero_sized_map_is_rejected() {
        assert!(matches!(Map::new(0, 3), Err(MapError::InvalidExtent { .. })));
    }

    #[test]
    fn resize_propagates_to_nested_tile_layers() {
        let mut map = Map::new(3, 3).unwrap();
        let g = map.add_group_layer(None).unwrap();
        let nested = map.add_tile_layer(Some(g)).unwrap();
        let top = map.add_tile_layer(None).unwrap();

        map.resize(5, 2).unwrap();
        assert_eq!(map.find_tile_layer(nested).unwrap().extent(), TileExtent::new(5, 2));
        assert_eq!(map.find_tile_layer(top).unwrap().extent(), TileExtent::new(5, 2));

        map.add_column();
        map.remove_row().unwrap();
        assert_eq!(map.extent(), TileExtent::new(4, 3));
        assert_eq!(map.find_tile_layer(nested).unwrap().extent(), TileExtent::new(4, 3));

        map.resize(1, 1).unwrap();
        assert!(map.remove_row().is_err());
        assert!(map.remove_column().is_err());
        assert_eq!(map.extent(), TileExtent::new(1, 1));
        assert_eq!(map.find_tile_layer(top).unwrap().extent(), TileExtent::new(1, 1));
    }

    #[test]
    fn removed_tile_layer_is_resized_on_restore() {
        let mut map = Map::new(2, 2).unwrap();
        let layer = map.add_tile_layer(None).unwrap();
        map.select_layer(layer).unwrap();

        let removed = map.remove_layer(layer).unwrap();
        assert_eq!(map.active_layer(), None);
        map.resize(3, 4).unwrap();

        let root = map.layers().root_uuid();
        map.restore_layer(removed, root, 0).unwrap();
        assert_eq!(map.find_tile_layer(layer).unwrap().extent(), TileExtent::new(3, 4));
    }

    #[test]
    fn refused_restore_hands_the_subtree_back() {
        let mut map = Map::new(2, 2).unwrap();
        let group = map.add_group_layer(None).unwrap();
        let child = map.add_tile_layer(Some(group)).unwrap();
        let tiles = map.add_tile_layer(None).unwrap();
        let removed = map.remove_layer(group).unwrap();
        let before = map.layer_count();

        let err = map.restore_layer(removed, tiles, 0).unwrap_err();
        assert!(matches!(err.error, MapError::NotAGroup(id) if id == tiles));
        let err = map.restore_layer(err.subtree, Uuid::new_v4(), 0).unwrap_err();
        assert!(matches!(err.error, MapError::LayerNotFound(_)));
        assert_eq!(map.layer_count(), before);

        let subtree = err.subtree;
        assert_eq!(subtree.len(), 2);
        assert!(subtree.get(child).is_some());
        let root = map.layers().root_uuid();
        assert_eq!(map.restore_layer(subtree, root, 0).unwrap(), group);
        assert_eq!(map.find_parent_layer(child).unwrap().children(), &[child]);
    }

    #[test]
    fn restoring_a_clashing_uuid_is_refused_and_returned() {
        let mut map = Map::new(2, 2).unwrap();
        let layer = map.add_tile_layer(None).unwrap();
        let root = map.layers().root_uuid();
        let mut twin = TileLayer::new("twin", map.extent()).unwrap();
        *twin.delegate_mut().meta_mut() = Metadata::with_uuid(layer, "twin");

        let err = map.restore_layer(twin.into(), root, 0).unwrap_err();
        assert!(matches!(err.error, MapError::LayerAlreadyPresent(id) if id == layer));
        assert_eq!(err.subtree.root_uuid(), layer);
        assert_eq!(map.layer_count(), 1);
    }

    #[test]
    fn select_layer_requires_existing_layer() {
        let mut map = Map::new(2, 2).unwrap();
        assert!(map.select_layer(Uuid::new_v4()).is_err());
        assert!(map.select_layer(map.layers().root_uuid()).is_err());
        let layer = map.add_object_layer(None).unwrap();
        map.select_layer(layer).unwrap();
        assert!(map.is_active_layer(layer));
    }

    #[test]
    fn fix_tiles_clears_ids_without_tileset_and_reports_them() {
        let mut map = Map::new(2, 2).unwrap();
        map.tilesets_mut()
            .attach(Tileset::new("ts", "ts.png", 16, 16, 4, 2))
            .unwrap();
        let layer = map.add_tile_layer(None).unwrap();
        let other = map.add_tile_layer(None).unwrap();
        {
            let tiles = map.find_tile_layer_mut(layer).unwrap();
            tiles.set_tile(TilePos::new(0, 0), TileId(3));
            tiles.set_tile(TilePos::new(0, 1), TileId(5));
            tiles.set_tile(TilePos::new(1, 1), TileId(40));
        }

        let result = map.fix_tiles();
        let patch = &result[&layer];
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get(TilePos::new(0, 1)), Some(TileId(5)));
        assert_eq!(patch.get(TilePos::new(1, 1)), Some(TileId(40)));
        assert!(result[&other].is_empty());

        let tiles = map.find_tile_layer_mut(layer).unwrap();
        assert_eq!(tiles.tile_at(TilePos::new(0, 0)), Some(TileId(3)));
        assert_eq!(tiles.tile_at(TilePos::new(0, 1)), Some(TileId::EMPTY));

        patch.apply(tiles);
        assert_eq!(tiles.tile_at(TilePos::new(1, 1)), Some(TileId(40)));
    }

    #[test]
    fn flood_returns_undo_patch() {
        let mut map = Map::new(3, 3).unwrap();
        let layer = map.add_tile_layer(None).unwrap();
        let patch = map.flood(layer, TilePos::new(1, 1), TileId(2)).unwrap();
        assert_eq!(patch.len(), 9);
        assert!(patch.iter().all(|(_, id)| id == TileId::EMPTY));
        assert!(map.flood(Uuid::new_v4(), TilePos::new(0, 0), TileId(1)).is_err());
        assert!(map.flood(layer, TilePos::new(7, 7), TileId(1)).unwrap().is_empty());
    }

    #[test]
    fn objects_get_persistent_ids_and_contexts() {
        let mut map = Map::new(2, 2).unwrap();
        let layer = map.add_object_layer(None).unwrap();
        let a = map
            .add_object(layer, ObjectKind::Rect, vec2(1.0, 2.0), vec2(3.0, 4.0))
            .unwrap();
        let b = map
            .add_object(layer, ObjectKind::Point, vec2(0.0, 0.0), Vec2::ZERO)
            .unwrap();

        assert_eq!(map.find_object(a).unwrap().persistent_id(), Some(1));
        assert_eq!(map.find_object(b).unwrap().persistent_id(), Some(2));
        assert_eq!(map.find_object_owner(a), Some(layer));

        map.find_context_mut(a).unwrap().set_name("chest");
        assert_eq!(map.find_object(a).unwrap().meta().name(), "chest");

        let removed = map.remove_object(layer, a).unwrap();
        assert!(map.find_context(a).is_none());
        map.restore_object(layer, removed).unwrap();
        assert!(map.find_context(a).is_some());
        assert!(map.remove_object(Uuid::new_v4(), a).is_err());
    }

    #[test]
    fn component_definition_removal_round_trips() {
        let mut map = Map::new(2, 2).unwrap();
        let layer = map.add_tile_layer(None).unwrap();
        let def = map.define_component("Light").unwrap();
        map.add_component_attribute(def, "radius", 4.0f32).unwrap();

        map.attach_component(layer, def).unwrap();
        map.attach_component(map.uuid(), def).unwrap();
        assert!(matches!(
            map.attach_component(layer, def),
            Err(MapError::DuplicateComponent(_))
        ));

        map.find_context_mut(layer)
            .unwrap()
            .components_mut()
            .find_mut(def)
            .unwrap()
            .update("radius", 9.0f32)
            .unwrap();

        let removed = map.remove_component_definition(def).unwrap();
        assert_eq!(removed.instances.len(), 2);
        assert!(map.find_context(layer).unwrap().components().is_empty());
        assert!(map.component_index().is_empty());

        map.restore_component_definition(removed).unwrap();
        let restored = map.find_context(layer).unwrap().components().find(def).unwrap();
        assert_eq!(restored.attributes().get("radius"), Some(&Attribute::from(9.0f32)));
        assert!(map.meta().components().contains(def));
    }

    #[test]
    fn attribute_rename_is_refused_when_any_instance_clashes() {
        let mut map = Map::new(1, 1).unwrap();
        let def = map.define_component("Door").unwrap();
        map.add_component_attribute(def, "locked", false).unwrap();
        let layer = map.add_object_layer(None).unwrap();
        map.attach_component(layer, def).unwrap();

        let odd: AttributeMap = [("locked", false), ("closed", true)].into_iter().collect();
        map.meta_mut()
            .components_mut()
            .add(Component::new(def, odd))
            .unwrap();

        assert!(matches!(
            map.rename_component_attribute(def, "locked", "closed"),
            Err(MapError::DuplicateName { name }) if name == "closed"
        ));
        let schema = map.component_index().find(def).unwrap().attributes();
        assert!(schema.contains("locked") && !schema.contains("closed"));
        let instance = map.find_context(layer).unwrap().components().find(def).unwrap();
        assert!(instance.attributes().contains("locked"));
        assert_eq!(map.meta().components().find(def).unwrap().attributes().len(), 2);
    }

    #[test]
    fn component_attribute_edits_reach_instances() {
        let mut map = Map::new(1, 1).unwrap();
        let def = map.define_component("Door").unwrap();
        map.add_component_attribute(def, "locked", false).unwrap();
        let ctx = map.uuid();
        map.attach_component(ctx, def).unwrap();

        map.add_component_attribute(def, "key", "gold").unwrap();
        map.rename_component_attribute(def, "locked", "closed").unwrap();
        let previous = map
            .set_component_attribute_type(def, "key", AttributeType::Int)
            .unwrap();
        assert_eq!(previous, Attribute::from("gold"));

        let instance = map.meta().components().find(def).unwrap();
        assert!(instance.attributes().contains("closed"));
        assert!(!instance.attributes().contains("locked"));
        assert_eq!(instance.attributes().get("key"), Some(&Attribute::from(0)));

        assert!(map.rename_component_attribute(def, "closed", "key").is_err());
        map.remove_component_attribute(def, "key").unwrap();
        assert!(!map.meta().components().find(def).unwrap().attributes().contains("key"));

        let values = map.reset_component(ctx, def).unwrap();
        assert!(values.contains("closed"));
        let detached = map.detach_component(ctx, def).unwrap();
        assert_eq!(detached.definition(), def);
        assert!(map.detach_component(ctx, def).is_err());
    }

    #[test]
    fn tileset_is_a_context() {
        let mut map = Map::new(1, 1).unwrap();
        let tileset = Tileset::new("ts", "ts.png", 8, 8, 1, 1);
        let id = tileset.uuid();
        map.tilesets_mut().attach(tileset).unwrap();
        map.find_context_mut(id)
            .unwrap()
            .properties_mut()
            .add("biome", "forest")
            .unwrap();
        assert!(map.find_context(id).unwrap().properties().contains("biome"));
        assert!(map.find_context(Uuid::new_v4()).is_none());
    }
}
