//! Conversion between a live [`Map`] and its [`IrMap`] snapshot.

use std::collections::{BTreeMap, HashMap};

use macroquad::math::{vec2, IVec2, IVec3, IVec4, Vec2, Vec3, Vec4};
use tracing::debug;
use uuid::Uuid;

use crate::attribute::{color_from_hex, color_to_hex, Attribute, ObjectRef};
use crate::component::{Component, ComponentIndex};
use crate::config::MapConfig;
use crate::error::MapError;
use crate::ir_map::*;
use crate::layer::{GroupLayer, Layer, LayerTree, Object, ObjectKind, ObjectLayer, PersistentIds, TileLayer};
use crate::map::Map;
use crate::meta::{AttributeMap, Metadata};
use crate::spatial::{TileExtent, TileId, TileMatrix};
use crate::tileset::{Tileset, TilesetBundle};

impl From<&Attribute> for IrAttribute {
    fn from(attr: &Attribute) -> Self {
        match attr {
            Attribute::String(v) => IrAttribute::String(v.clone()),
            Attribute::Int(v) => IrAttribute::Int(*v),
            Attribute::Int2(v) => IrAttribute::Int2(v.to_array()),
            Attribute::Int3(v) => IrAttribute::Int3(v.to_array()),
            Attribute::Int4(v) => IrAttribute::Int4(v.to_array()),
            Attribute::Float(v) => IrAttribute::Float(*v),
            Attribute::Float2(v) => IrAttribute::Float2(v.to_array()),
            Attribute::Float3(v) => IrAttribute::Float3(v.to_array()),
            Attribute::Float4(v) => IrAttribute::Float4(v.to_array()),
            Attribute::Bool(v) => IrAttribute::Bool(*v),
            Attribute::Color(v) => IrAttribute::Color(color_to_hex(*v)),
            Attribute::Path(v) => IrAttribute::Path(v.clone()),
            Attribute::Object(v) => IrAttribute::Object(v.0),
        }
    }
}

impl TryFrom<IrAttribute> for Attribute {
    type Error = MapError;

    fn try_from(ir: IrAttribute) -> Result<Self, Self::Error> {
        Ok(match ir {
            IrAttribute::String(v) => Attribute::String(v),
            IrAttribute::Int(v) => Attribute::Int(v),
            IrAttribute::Int2(v) => Attribute::Int2(IVec2::from_array(v)),
            IrAttribute::Int3(v) => Attribute::Int3(IVec3::from_array(v)),
            IrAttribute::Int4(v) => Attribute::Int4(IVec4::from_array(v)),
            IrAttribute::Float(v) => Attribute::Float(v),
            IrAttribute::Float2(v) => Attribute::Float2(Vec2::from_array(v)),
            IrAttribute::Float3(v) => Attribute::Float3(Vec3::from_array(v)),
            IrAttribute::Float4(v) => Attribute::Float4(Vec4::from_array(v)),
            IrAttribute::Bool(v) => Attribute::Bool(v),
            IrAttribute::Color(hex) => Attribute::Color(
                color_from_hex(&hex)
                    .ok_or_else(|| MapError::InvalidMap(format!("invalid color '{hex}'")))?,
            ),
            IrAttribute::Path(v) => Attribute::Path(v),
            IrAttribute::Object(v) => Attribute::Object(ObjectRef(v)),
        })
    }
}

fn attributes_to_ir(attributes: &AttributeMap) -> BTreeMap<String, IrAttribute> {
    attributes
        .iter()
        .map(|(name, value)| (name.to_owned(), IrAttribute::from(value)))
        .collect()
}

fn attributes_from_ir(ir: BTreeMap<String, IrAttribute>) -> Result<AttributeMap, MapError> {
    let mut out = AttributeMap::new();
    for (name, value) in ir {
        out.insert(name, Attribute::try_from(value)?);
    }
    Ok(out)
}

fn metadata_to_ir(meta: &Metadata, index: &ComponentIndex) -> IrMetadata {
    IrMetadata {
        name: meta.name().to_owned(),
        properties: attributes_to_ir(meta.properties()),
        components: meta
            .components()
            .iter()
            .filter_map(|c| {
                let def = index.find(c.definition())?;
                Some((def.name().to_owned(), attributes_to_ir(c.attributes())))
            })
            .collect(),
    }
}

/// Fills `meta` from its IR form, resolving components by definition name.
fn metadata_from_ir(
    meta: &mut Metadata,
    ir: IrMetadata,
    definitions: &HashMap<String, Uuid>,
) -> Result<(), MapError> {
    meta.set_name(ir.name);
    *meta.properties_mut() = attributes_from_ir(ir.properties)?;
    for (name, values) in ir.components {
        let id = definitions
            .get(&name)
            .copied()
            .ok_or_else(|| MapError::InvalidMap(format!("unknown component '{name}'")))?;
        meta.components_mut()
            .add(Component::new(id, attributes_from_ir(values)?))?;
    }
    Ok(())
}

fn layer_to_ir(tree: &LayerTree, layer: &Layer, index: &ComponentIndex) -> IrLayer {
    let kind = match layer {
        Layer::Tile(tiles) => IrLayerKind::Tiles {
            rows: tiles.extent().rows,
            cols: tiles.extent().cols,
            data: tiles.matrix().as_slice().iter().map(|id| id.raw()).collect(),
        },
        Layer::Object(objects) => IrLayerKind::Objects {
            objects: objects
                .objects()
                .map(|obj| IrObject {
                    meta: metadata_to_ir(obj.meta(), index),
                    persistent_id: obj.persistent_id(),
                    shape: obj.kind().name().to_owned(),
                    x: obj.position().x,
                    y: obj.position().y,
                    width: obj.size().x,
                    height: obj.size().y,
                    tag: obj.tag().to_owned(),
                    visible: obj.is_visible(),
                })
                .collect(),
        },
        Layer::Group(group) => IrLayerKind::Group {
            layers: group
                .children()
                .iter()
                .filter_map(|id| tree.find_layer(*id))
                .map(|child| layer_to_ir(tree, child, index))
                .collect(),
        },
    };
    IrLayer {
        meta: metadata_to_ir(layer.meta(), index),
        persistent_id: layer.persistent_id(),
        opacity: layer.opacity(),
        visible: layer.is_visible(),
        kind,
    }
}

struct Builder<'a> {
    extent: TileExtent,
    definitions: &'a HashMap<String, Uuid>,
    tilesets: TilesetBundle,
}

impl Builder<'_> {
    /// Builds the layer node alone; group children are returned for the caller to insert.
    fn layer(&self, ir: IrLayer, map: &Map) -> Result<(Layer, Vec<IrLayer>), MapError> {
        let IrLayer {
            meta,
            persistent_id,
            opacity,
            visible,
            kind,
        } = ir;
        let mut children = Vec::new();
        let mut layer = match kind {
            IrLayerKind::Tiles { rows, cols, data } => {
                let extent = TileExtent::new(rows, cols);
                if extent != self.extent {
                    return Err(MapError::InvalidMap(format!(
                        "layer '{}' is {extent} but the map is {}",
                        meta.name, self.extent
                    )));
                }
                if let Some(&tile) = data
                    .iter()
                    .find(|&&raw| raw != 0 && !self.tilesets.is_valid_tile(TileId(raw)))
                {
                    return Err(MapError::InvalidTileId {
                        layer: meta.name.clone(),
                        tile,
                        max: self.tilesets.max_tile_id().map_or(0, TileId::raw),
                    });
                }
                let matrix = TileMatrix::from_raw(extent, data.into_iter().map(TileId).collect())?;
                Layer::Tile(TileLayer::with_matrix("", matrix))
            }
            IrLayerKind::Objects { objects } => {
                let mut layer = ObjectLayer::with_policy("", map.object_policy());
                for ir in objects {
                    layer.add_object(self.object(ir)?)?;
                }
                Layer::Object(layer)
            }
            IrLayerKind::Group { layers } => {
                children = layers;
                Layer::Group(GroupLayer::new(""))
            }
        };
        metadata_from_ir(layer.meta_mut(), meta, self.definitions)?;
        layer.set_opacity(opacity);
        layer.set_visible(visible);
        layer.set_persistent_id(persistent_id);
        Ok((layer, children))
    }

    fn object(&self, ir: IrObject) -> Result<Object, MapError> {
        let kind = ObjectKind::from_name(&ir.shape)
            .ok_or_else(|| MapError::InvalidMap(format!("unknown object shape '{}'", ir.shape)))?;
        let mut object = Object::new(kind);
        metadata_from_ir(object.meta_mut(), ir.meta, self.definitions)?;
        object.set_position(vec2(ir.x, ir.y));
        if kind != ObjectKind::Point {
            object.set_size(vec2(ir.width, ir.height));
        }
        object.set_tag(ir.tag);
        object.set_visible(ir.visible);
        object.set_persistent_id(ir.persistent_id);
        Ok(object)
    }
}

fn insert_layers(
    map: &mut Map,
    builder: &Builder<'_>,
    parent: Option<Uuid>,
    layers: Vec<IrLayer>,
) -> Result<(), MapError> {
    for ir in layers {
        let (layer, children) = builder.layer(ir, map)?;
        let id = map.insert_loaded_layer(parent, layer)?;
        if !children.is_empty() {
            insert_layers(map, builder, Some(id), children)?;
        }
    }
    Ok(())
}

impl Map {
    /// Snapshots the document, visiting layers in pre-order.
    pub fn to_ir(&self) -> IrMap {
        let index = self.component_index();
        let tree = self.layers();
        let active = self.tilesets().active();
        let ids = self.persistent_ids();
        IrMap {
            version: FORMAT_VERSION,
            meta: metadata_to_ir(self.meta(), index),
            rows: self.row_count(),
            cols: self.column_count(),
            tile_width: self.tile_width(),
            tile_height: self.tile_height(),
            next_layer_id: ids.next_layer_id,
            next_object_id: ids.next_object_id,
            definitions: index
                .iter()
                .map(|def| IrComponent {
                    name: def.name().to_owned(),
                    attributes: attributes_to_ir(def.attributes()),
                })
                .collect(),
            tilesets: self
                .tilesets()
                .iter()
                .map(|r| {
                    let ts = r.tileset();
                    IrTilesetRef {
                        first_tile: r.first_tile().raw(),
                        meta: metadata_to_ir(ts.meta(), index),
                        image: ts.image_path.clone(),
                        tile_width: ts.tile_width,
                        tile_height: ts.tile_height,
                        tile_count: ts.tile_count,
                        column_count: ts.column_count,
                        active: active == Some(ts.uuid()),
                    }
                })
                .collect(),
            layers: tree
                .root()
                .children()
                .iter()
                .filter_map(|id| tree.find_layer(*id))
                .map(|layer| layer_to_ir(tree, layer, index))
                .collect(),
        }
    }

    /// Rebuilds a document from a snapshot. Every entity gets a fresh UUID;
    /// persistent ids and id counters are kept.
    pub fn from_ir(ir: IrMap) -> Result<Map, MapError> {
        if ir.version > FORMAT_VERSION {
            return Err(MapError::InvalidMap(format!(
                "document version {} is newer than supported version {FORMAT_VERSION}",
                ir.version
            )));
        }
        let mut map = Map::with_config(&MapConfig {
            rows: ir.rows,
            cols: ir.cols,
            tile_width: ir.tile_width,
            tile_height: ir.tile_height,
            ..MapConfig::default()
        })?;

        let mut definitions = HashMap::new();
        for def in ir.definitions {
            let id = map.define_component(def.name.clone())?;
            for (name, value) in def.attributes {
                map.add_component_attribute(id, &name, Attribute::try_from(value)?)?;
            }
            definitions.insert(def.name, id);
        }

        let mut active = None;
        for ts in ir.tilesets {
            let mut tileset = Tileset::new(
                "",
                ts.image,
                ts.tile_width,
                ts.tile_height,
                ts.tile_count,
                ts.column_count,
            );
            metadata_from_ir(tileset.meta_mut(), ts.meta, &definitions)?;
            if ts.active {
                active = Some(tileset.uuid());
            }
            map.tilesets_mut().attach_at(tileset, TileId(ts.first_tile))?;
        }
        if let Some(id) = active {
            map.tilesets_mut().select(id)?;
        }

        metadata_from_ir(map.meta_mut(), ir.meta, &definitions)?;

        let builder = Builder {
            extent: map.extent(),
            definitions: &definitions,
            tilesets: map.tilesets().clone(),
        };
        insert_layers(&mut map, &builder, None, ir.layers)?;

        // Counters never fall behind an id already in use.
        let (mut max_layer, mut max_object) = (0, 0);
        map.each(|layer| {
            max_layer = max_layer.max(layer.persistent_id().unwrap_or(0));
            if let Some(objects) = layer.as_object_layer() {
                for object in objects.objects() {
                    max_object = max_object.max(object.persistent_id().unwrap_or(0));
                }
            }
        });
        let after = |max: i32, kind: &'static str| {
            max.checked_add(1).ok_or(MapError::IdsExhausted { kind })
        };
        map.set_persistent_ids(PersistentIds {
            next_layer_id: ir.next_layer_id.max(after(max_layer, "layer")?),
            next_object_id: ir.next_object_id.max(after(max_object, "object")?),
        });
        map.assign_missing_persistent_ids()?;
        debug!(layers = map.layer_count(), extent = %map.extent(), "built map from IR");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::TilePos;
    use macroquad::color::Color;

    fn sample_map() -> Map {
        let mut map = Map::new(2, 3).unwrap();
        map.tilesets_mut()
            .attach(Tileset::new("terrain", "terrain.png", 16, 16, 6, 3))
            .unwrap();
        let def = map.define_component("Loot").unwrap();
        map.add_component_attribute(def, "gold", 5).unwrap();

        let group = map.add_group_layer(None).unwrap();
        let tiles = map.add_tile_layer(Some(group)).unwrap();
        map.find_tile_layer_mut(tiles)
            .unwrap()
            .set_tile(TilePos::new(1, 2), TileId(4));
        let objects = map.add_object_layer(None).unwrap();
        let chest = map
            .add_object(objects, ObjectKind::Rect, vec2(8.0, 8.0), vec2(16.0, 16.0))
            .unwrap();
        map.attach_component(chest, def).unwrap();
        map.meta_mut()
            .properties_mut()
            .add("tint", Color::from_rgba(255, 0, 0, 255))
            .unwrap();
        map
    }

    #[test]
    fn snapshot_follows_tree_order() {
        let map = sample_map();
        let ir = map.to_ir();
        assert_eq!(ir.layers.len(), 2);
        match &ir.layers[0].kind {
            IrLayerKind::Group { layers } => {
                assert_eq!(layers[0].meta.name, "Tile Layer 1");
                match &layers[0].kind {
                    IrLayerKind::Tiles { data, .. } => assert_eq!(data[5], 4),
                    other => panic!("expected tiles, got {other:?}"),
                }
            }
            other => panic!("expected group, got {other:?}"),
        }
        assert!(ir.meta.properties.contains_key("tint"));
        assert_eq!(ir.definitions[0].name, "Loot");
    }

    #[test]
    fn rebuild_preserves_content_and_counters() {
        let map = sample_map();
        let ir = map.to_ir();
        let rebuilt = Map::from_ir(ir.clone()).unwrap();

        assert_eq!(rebuilt.to_ir(), ir);
        assert_eq!(rebuilt.layer_count(), 3);
        assert_eq!(rebuilt.persistent_ids(), map.persistent_ids());
        assert_ne!(rebuilt.uuid(), map.uuid());

        let mut rebuilt = rebuilt;
        let next = rebuilt.add_tile_layer(None).unwrap();
        assert_eq!(rebuilt.find_layer(next).unwrap().name(), "Tile Layer 2");
    }

    #[test]
    fn object_order_survives_repeated_rebuilds() {
        let mut map = Map::new(4, 4).unwrap();
        let layer = map.add_object_layer(None).unwrap();
        for i in 0..8 {
            let x = (7 - i) as f32 * 4.0;
            map.add_object(layer, ObjectKind::Rect, vec2(x, 0.0), vec2(4.0, 4.0))
                .unwrap();
        }
        let ir = map.to_ir();
        let once = Map::from_ir(ir.clone()).unwrap();
        assert_eq!(once.to_ir(), ir);
        assert_eq!(Map::from_ir(once.to_ir()).unwrap().to_ir(), ir);
    }

    fn layer_ir(name: &str, persistent_id: Option<i32>, kind: IrLayerKind) -> IrLayer {
        IrLayer {
            meta: IrMetadata {
                name: name.to_owned(),
                ..IrMetadata::default()
            },
            persistent_id,
            opacity: 1.0,
            visible: true,
            kind,
        }
    }

    fn object_ir(persistent_id: Option<i32>) -> IrObject {
        IrObject {
            meta: IrMetadata::default(),
            persistent_id,
            shape: "point".to_owned(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            tag: String::new(),
            visible: true,
        }
    }

    fn bare_ir(layers: Vec<IrLayer>) -> IrMap {
        let mut ir = Map::new(1, 1).unwrap().to_ir();
        ir.layers = layers;
        ir
    }

    #[test]
    fn counters_skip_past_loaded_ids() {
        let ir = bare_ir(vec![layer_ir(
            "things",
            Some(7),
            IrLayerKind::Objects {
                objects: vec![object_ir(Some(3)), object_ir(Some(12))],
            },
        )]);
        assert_eq!(ir.next_layer_id, 1);

        let mut map = Map::from_ir(ir).unwrap();
        assert_eq!(
            map.persistent_ids(),
            PersistentIds {
                next_layer_id: 8,
                next_object_id: 13,
            }
        );
        let group = map.add_group_layer(None).unwrap();
        assert_eq!(map.find_layer(group).unwrap().persistent_id(), Some(8));
    }

    #[test]
    fn missing_ids_are_assigned_after_loaded_ones() {
        let ir = bare_ir(vec![
            layer_ir("first", None, IrLayerKind::Group { layers: vec![
                layer_ir("inner", Some(4), IrLayerKind::Objects {
                    objects: vec![object_ir(None), object_ir(Some(2)), object_ir(None)],
                }),
            ]}),
            layer_ir("last", None, IrLayerKind::Objects { objects: vec![] }),
        ]);
        let map = Map::from_ir(ir).unwrap();

        let mut layer_ids = Vec::new();
        let mut object_ids = Vec::new();
        map.each(|layer| {
            layer_ids.push(layer.persistent_id());
            if let Some(objects) = layer.as_object_layer() {
                object_ids.extend(objects.objects().map(Object::persistent_id));
            }
        });
        assert_eq!(layer_ids, vec![Some(5), Some(4), Some(6)]);
        assert_eq!(object_ids, vec![Some(3), Some(2), Some(4)]);
        assert_eq!(map.persistent_ids().next_layer_id, 7);
        assert_eq!(map.persistent_ids().next_object_id, 5);
    }

    #[test]
    fn hostile_numbers_are_errors_not_panics() {
        let mut ir = sample_map().to_ir();
        ir.tilesets[0].first_tile = i32::MAX;
        ir.tilesets[0].tile_count = 5;
        assert!(matches!(Map::from_ir(ir), Err(MapError::InvalidMap(_))));

        let mut ir = bare_ir(Vec::new());
        ir.rows = usize::MAX;
        ir.cols = 2;
        assert!(matches!(Map::from_ir(ir), Err(MapError::ExtentTooLarge { .. })));

        let ir = bare_ir(vec![layer_ir(
            "tiles",
            None,
            IrLayerKind::Tiles { rows: usize::MAX, cols: 2, data: vec![0, 0] },
        )]);
        assert!(matches!(Map::from_ir(ir), Err(MapError::InvalidMap(_))));

        let ir = bare_ir(vec![layer_ir(
            "things",
            Some(i32::MAX),
            IrLayerKind::Objects { objects: vec![] },
        )]);
        assert!(matches!(
            Map::from_ir(ir),
            Err(MapError::IdsExhausted { kind: "layer" })
        ));

        let mut ir = bare_ir(vec![layer_ir("tiles", None, IrLayerKind::Objects { objects: vec![] })]);
        ir.next_layer_id = i32::MAX;
        assert!(matches!(
            Map::from_ir(ir),
            Err(MapError::IdsExhausted { kind: "layer" })
        ));
    }

    #[test]
    fn rejects_unknown_tile_ids_and_wrong_extents() {
        let mut ir = sample_map().to_ir();
        if let IrLayerKind::Group { layers } = &mut ir.layers[0].kind {
            if let IrLayerKind::Tiles { data, .. } = &mut layers[0].kind {
                data[0] = 99;
            }
        }
        assert!(matches!(
            Map::from_ir(ir),
            Err(MapError::InvalidTileId { tile: 99, max: 6, .. })
        ));

        let mut ir = sample_map().to_ir();
        ir.rows = 4;
        assert!(matches!(Map::from_ir(ir), Err(MapError::InvalidMap(_))));
    }

    #[test]
    fn rejects_unknown_component_and_newer_version() {
        let mut ir = sample_map().to_ir();
        ir.meta.components.insert("Ghost".to_owned(), BTreeMap::new());
        assert!(matches!(Map::from_ir(ir), Err(MapError::InvalidMap(_))));

        let mut ir = sample_map().to_ir();
        ir.version = FORMAT_VERSION + 1;
        assert!(Map::from_ir(ir).is_err());
    }
}
