use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::MapError;

use super::{GroupLayer, Layer, ObjectLayer, PersistentIds, TileLayer};

/// Callbacks for a typed pre-order walk over a [`LayerTree`].
pub trait LayerVisitor {
    fn visit_tile_layer(&mut self, _layer: &TileLayer) {}
    fn visit_object_layer(&mut self, _layer: &ObjectLayer) {}
    fn visit_group_layer(&mut self, _layer: &GroupLayer) {}
}

#[derive(Debug)]
struct Node {
    parent: Uuid,
    layer: Layer,
}

/// A layer and all of its descendants, detached from any tree.
///
/// Returned by [`LayerTree::remove_layer`] so the caller (typically an undo
/// command) owns the removed nodes until it either drops them or inserts the
/// subtree again.
#[derive(Debug)]
pub struct LayerSubtree {
    root: Layer,
    descendants: HashMap<Uuid, Layer>,
}

impl LayerSubtree {
    #[inline]
    pub fn root_uuid(&self) -> Uuid {
        self.root.uuid()
    }

    /// The topmost layer of the subtree.
    #[inline]
    pub fn layer(&self) -> &Layer {
        &self.root
    }

    pub fn get(&self, uuid: Uuid) -> Option<&Layer> {
        if uuid == self.root.uuid() {
            Some(&self.root)
        } else {
            self.descendants.get(&uuid)
        }
    }

    /// Number of layers, the root included.
    pub fn len(&self) -> usize {
        1 + self.descendants.len()
    }

    /// Always `false`; a subtree holds at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every layer in no particular order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::once(&self.root).chain(self.descendants.values())
    }

    pub(crate) fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        std::iter::once(&mut self.root).chain(self.descendants.values_mut())
    }

    fn uuids(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.root.uuid()).chain(self.descendants.keys().copied())
    }
}

impl From<Layer> for LayerSubtree {
    fn from(root: Layer) -> Self {
        Self {
            root,
            descendants: HashMap::new(),
        }
    }
}

impl From<TileLayer> for LayerSubtree {
    fn from(layer: TileLayer) -> Self {
        Layer::Tile(layer).into()
    }
}

impl From<ObjectLayer> for LayerSubtree {
    fn from(layer: ObjectLayer) -> Self {
        Layer::Object(layer).into()
    }
}

impl From<GroupLayer> for LayerSubtree {
    fn from(layer: GroupLayer) -> Self {
        Layer::Group(layer).into()
    }
}

/// Arena of layers forming a strict tree under an implicit root group.
///
/// The root is a valid parent for every operation but is never returned by
/// lookups and is not counted or visited. Lookups and traversals are linear in
/// the size of the tree.
#[derive(Debug)]
pub struct LayerTree {
    root: GroupLayer,
    nodes: HashMap<Uuid, Node>,
}

impl Default for LayerTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTree {
    pub fn new() -> Self {
        Self {
            root: GroupLayer::new("root"),
            nodes: HashMap::new(),
        }
    }

    /// Id of the implicit root group.
    #[inline]
    pub fn root_uuid(&self) -> Uuid {
        self.root.delegate().meta().uuid()
    }

    /// The implicit root group.
    #[inline]
    pub fn root(&self) -> &GroupLayer {
        &self.root
    }

    /// Number of layers, excluding the root.
    #[inline]
    pub fn layer_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn top_level_layer_count(&self) -> usize {
        self.root.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, uuid: Uuid) -> bool {
        self.nodes.contains_key(&uuid)
    }

    fn children_of(&self, group: Uuid) -> Option<&Vec<Uuid>> {
        if group == self.root_uuid() {
            return Some(&self.root.children);
        }
        self.nodes
            .get(&group)?
            .layer
            .as_group_layer()
            .map(|g| &g.children)
    }

    fn children_of_mut(&mut self, group: Uuid) -> Result<&mut Vec<Uuid>, MapError> {
        if group == self.root_uuid() {
            return Ok(&mut self.root.children);
        }
        let node = self
            .nodes
            .get_mut(&group)
            .ok_or(MapError::LayerNotFound(group))?;
        match &mut node.layer {
            Layer::Group(g) => Ok(&mut g.children),
            _ => Err(MapError::NotAGroup(group)),
        }
    }

    /// Pre-order ids of every descendant of `from`, `from` itself excluded.
    fn descendants_of(&self, from: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut stack: Vec<Uuid> = self
            .children_of(from)
            .map(|c| c.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(children) = self.children_of(id) {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// Every layer id in pre-order, root excluded.
    pub fn layer_ids(&self) -> Vec<Uuid> {
        self.descendants_of(self.root_uuid())
    }

    // -- Insertion --

    /// Adds a layer (or detached subtree) as the last top-level layer.
    pub fn append_layer(&mut self, layer: impl Into<LayerSubtree>) -> Result<Uuid, MapError> {
        let index = self.root.len();
        self.attach(self.root_uuid(), layer.into(), index)
    }

    /// Adds a layer as the last child of the group `parent`.
    pub fn append_layer_to(
        &mut self,
        parent: Uuid,
        layer: impl Into<LayerSubtree>,
    ) -> Result<Uuid, MapError> {
        let index = self.child_count(parent)?;
        self.attach(parent, layer.into(), index)
    }

    /// Inserts a top-level layer at `index`, which must lie in `[0, count]`.
    pub fn insert_layer(
        &mut self,
        layer: impl Into<LayerSubtree>,
        index: usize,
    ) -> Result<Uuid, MapError> {
        self.attach(self.root_uuid(), layer.into(), index)
    }

    /// Inserts a layer into the group `parent` at `index`, which must lie in `[0, count]`.
    pub fn insert_layer_to(
        &mut self,
        parent: Uuid,
        layer: impl Into<LayerSubtree>,
        index: usize,
    ) -> Result<Uuid, MapError> {
        self.attach(parent, layer.into(), index)
    }

    fn missing_group(&self, uuid: Uuid) -> MapError {
        if self.nodes.contains_key(&uuid) {
            MapError::NotAGroup(uuid)
        } else {
            MapError::LayerNotFound(uuid)
        }
    }

    /// Number of children of the group `parent` (the root included).
    pub(crate) fn child_count(&self, parent: Uuid) -> Result<usize, MapError> {
        self.children_of(parent)
            .map(Vec::len)
            .ok_or_else(|| self.missing_group(parent))
    }

    /// Every reason [`attach`](Self::attach) could fail, checked without
    /// taking the subtree.
    pub(crate) fn check_attach(
        &self,
        parent: Uuid,
        subtree: &LayerSubtree,
        index: usize,
    ) -> Result<(), MapError> {
        let len = self.child_count(parent)?;
        if index > len {
            return Err(MapError::IndexOutOfRange { index, len });
        }
        let root_uuid = self.root_uuid();
        if let Some(taken) = subtree
            .uuids()
            .find(|id| *id == root_uuid || self.nodes.contains_key(id))
        {
            return Err(MapError::LayerAlreadyPresent(taken));
        }
        Ok(())
    }

    fn attach(&mut self, parent: Uuid, subtree: LayerSubtree, index: usize) -> Result<Uuid, MapError> {
        self.check_attach(parent, &subtree, index)?;
        Ok(self.attach_checked(parent, subtree, index))
    }

    /// Links a subtree that already passed [`check_attach`](Self::check_attach).
    pub(crate) fn attach_checked(&mut self, parent: Uuid, subtree: LayerSubtree, index: usize) -> Uuid {
        let LayerSubtree { root, descendants } = subtree;
        let top = root.uuid();

        let mut parents = HashMap::new();
        for layer in std::iter::once(&root).chain(descendants.values()) {
            if let Layer::Group(group) = layer {
                for child in &group.children {
                    parents.insert(*child, layer.uuid());
                }
            }
        }

        let added = 1 + descendants.len();
        for (id, layer) in descendants {
            let parent = parents.get(&id).copied().unwrap_or(top);
            self.nodes.insert(id, Node { parent, layer });
        }
        self.nodes.insert(top, Node { parent, layer: root });
        if let Ok(siblings) = self.children_of_mut(parent) {
            siblings.insert(index, top);
        }

        debug!(layer = %top, %parent, index, added, "inserted layer");
        top
    }

    // -- Removal & duplication --

    /// Detaches a layer and its descendants, handing them to the caller.
    pub fn remove_layer(&mut self, uuid: Uuid) -> Option<LayerSubtree> {
        if !self.nodes.contains_key(&uuid) {
            return None;
        }
        let ids = self.descendants_of(uuid);
        let node = self.nodes.remove(&uuid)?;
        if let Ok(siblings) = self.children_of_mut(node.parent) {
            siblings.retain(|id| *id != uuid);
        }
        let descendants: HashMap<Uuid, Layer> = ids
            .into_iter()
            .filter_map(|id| self.nodes.remove(&id).map(|n| (id, n.layer)))
            .collect();

        debug!(layer = %uuid, removed = 1 + descendants.len(), "removed layer");
        Some(LayerSubtree {
            root: node.layer,
            descendants,
        })
    }

    /// Deep-copies a layer with fresh UUIDs and persistent ids and inserts the
    /// copy right after the source. Returns the id of the copy.
    pub fn duplicate_layer(&mut self, uuid: Uuid, ids: &mut PersistentIds) -> Option<Uuid> {
        let parent = self.nodes.get(&uuid)?.parent;
        let index = self.children_of(parent)?.iter().position(|id| *id == uuid)?;

        let mut descendants = HashMap::new();
        let root = self.clone_node(uuid, ids, &mut descendants)?;
        let copy = self
            .attach(parent, LayerSubtree { root, descendants }, index + 1)
            .ok()?;

        debug!(source = %uuid, copy = %copy, "duplicated layer");
        Some(copy)
    }

    fn clone_node(
        &self,
        uuid: Uuid,
        ids: &mut PersistentIds,
        out: &mut HashMap<Uuid, Layer>,
    ) -> Option<Layer> {
        let persistent_id = ids.next_layer().ok()?;
        let mut copy = match &self.nodes.get(&uuid)?.layer {
            Layer::Tile(layer) => Layer::Tile(layer.duplicate()),
            Layer::Object(layer) => Layer::Object(layer.duplicate(|| ids.next_object()).ok()?),
            Layer::Group(layer) => {
                let mut group = layer.duplicate_empty();
                for child in &layer.children {
                    let child_copy = self.clone_node(*child, ids, out)?;
                    group.children.push(child_copy.uuid());
                    out.insert(child_copy.uuid(), child_copy);
                }
                Layer::Group(group)
            }
        };
        copy.set_persistent_id(Some(persistent_id));
        Some(copy)
    }

    // -- Reordering --

    pub fn can_move_layer_up(&self, uuid: Uuid) -> bool {
        self.local_index(uuid).is_some_and(|i| i > 0)
    }

    pub fn can_move_layer_down(&self, uuid: Uuid) -> bool {
        match (self.local_index(uuid), self.parent_of(uuid).and_then(|p| self.children_of(p))) {
            (Some(i), Some(siblings)) => i + 1 < siblings.len(),
            _ => false,
        }
    }

    /// Swaps a layer with its previous sibling. Returns whether anything moved.
    pub fn move_layer_up(&mut self, uuid: Uuid) -> bool {
        if !self.can_move_layer_up(uuid) {
            return false;
        }
        self.swap_with_sibling(uuid, -1)
    }

    /// Swaps a layer with its next sibling. Returns whether anything moved.
    pub fn move_layer_down(&mut self, uuid: Uuid) -> bool {
        if !self.can_move_layer_down(uuid) {
            return false;
        }
        self.swap_with_sibling(uuid, 1)
    }

    fn swap_with_sibling(&mut self, uuid: Uuid, offset: isize) -> bool {
        let Some(parent) = self.parent_of(uuid) else {
            return false;
        };
        let Ok(siblings) = self.children_of_mut(parent) else {
            return false;
        };
        let Some(index) = siblings.iter().position(|id| *id == uuid) else {
            return false;
        };
        let other = index.saturating_add_signed(offset);
        siblings.swap(index, other);
        debug!(layer = %uuid, from = index, to = other, "moved layer");
        true
    }

    /// Moves a layer to `index` among its siblings; `index` must be in `[0, count)`.
    pub fn set_layer_index(&mut self, uuid: Uuid, index: usize) -> Result<(), MapError> {
        let parent = self.parent_of(uuid).ok_or(MapError::LayerNotFound(uuid))?;
        let siblings = self.children_of_mut(parent)?;
        let len = siblings.len();
        if index >= len {
            return Err(MapError::IndexOutOfRange { index, len });
        }
        let current = siblings
            .iter()
            .position(|id| *id == uuid)
            .ok_or(MapError::LayerNotFound(uuid))?;
        let id = siblings.remove(current);
        siblings.insert(index, id);
        debug!(layer = %uuid, from = current, to = index, "moved layer");
        Ok(())
    }

    // -- Queries --

    /// Position of a layer among its siblings.
    pub fn local_index(&self, uuid: Uuid) -> Option<usize> {
        let parent = self.nodes.get(&uuid)?.parent;
        self.children_of(parent)?.iter().position(|id| *id == uuid)
    }

    /// Position of a layer in a pre-order walk of the whole tree, root excluded.
    pub fn global_index(&self, uuid: Uuid) -> Option<usize> {
        if !self.nodes.contains_key(&uuid) {
            return None;
        }
        self.layer_ids().iter().position(|id| *id == uuid)
    }

    /// Top-level layer at `index`.
    pub fn layer_at_index(&self, index: usize) -> Option<&Layer> {
        let id = self.root.children.get(index)?;
        self.find_layer(*id)
    }

    /// Id of the group that directly contains `uuid` (the root id for top-level layers).
    pub fn parent_of(&self, uuid: Uuid) -> Option<Uuid> {
        self.nodes.get(&uuid).map(|n| n.parent)
    }

    /// The group that directly contains `uuid`; `None` for the root or unknown ids.
    pub fn find_parent_layer(&self, uuid: Uuid) -> Option<&GroupLayer> {
        let parent = self.parent_of(uuid)?;
        if parent == self.root_uuid() {
            Some(&self.root)
        } else {
            self.find_group_layer(parent)
        }
    }

    pub fn find_layer(&self, uuid: Uuid) -> Option<&Layer> {
        self.nodes.get(&uuid).map(|n| &n.layer)
    }

    pub fn find_layer_mut(&mut self, uuid: Uuid) -> Option<&mut Layer> {
        self.nodes.get_mut(&uuid).map(|n| &mut n.layer)
    }

    pub fn find_tile_layer(&self, uuid: Uuid) -> Option<&TileLayer> {
        self.find_layer(uuid)?.as_tile_layer()
    }

    pub fn find_tile_layer_mut(&mut self, uuid: Uuid) -> Option<&mut TileLayer> {
        self.find_layer_mut(uuid)?.as_tile_layer_mut()
    }

    pub fn find_object_layer(&self, uuid: Uuid) -> Option<&ObjectLayer> {
        self.find_layer(uuid)?.as_object_layer()
    }

    pub fn find_object_layer_mut(&mut self, uuid: Uuid) -> Option<&mut ObjectLayer> {
        self.find_layer_mut(uuid)?.as_object_layer_mut()
    }

    pub fn find_group_layer(&self, uuid: Uuid) -> Option<&GroupLayer> {
        self.find_layer(uuid)?.as_group_layer()
    }

    pub fn find_group_layer_mut(&mut self, uuid: Uuid) -> Option<&mut GroupLayer> {
        self.find_layer_mut(uuid)?.as_group_layer_mut()
    }

    // -- Traversal --

    /// Calls `f` for every layer in pre-order, root excluded.
    pub fn each(&self, mut f: impl FnMut(&Layer)) {
        for id in self.layer_ids() {
            if let Some(layer) = self.find_layer(id) {
                f(layer);
            }
        }
    }

    /// Mutable variant of [`each`](Self::each).
    pub fn each_mut(&mut self, mut f: impl FnMut(&mut Layer)) {
        for id in self.layer_ids() {
            if let Some(layer) = self.find_layer_mut(id) {
                f(layer);
            }
        }
    }

    /// Dispatches every layer, in pre-order, to the matching visitor callback.
    pub fn visit_layers<V: LayerVisitor + ?Sized>(&self, visitor: &mut V) {
        self.each(|layer| match layer {
            Layer::Tile(l) => visitor.visit_tile_layer(l),
            Layer::Object(l) => visitor.visit_object_layer(l),
            Layer::Group(l) => visitor.visit_group_layer(l),
        });
    }
}
