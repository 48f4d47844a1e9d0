use macroquad::math::{Rect, Vec2};

use crate::meta::Metadata;

/// Shape of a map object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Point,
    Rect,
    Ellipse,
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Point => "point",
            ObjectKind::Rect => "rect",
            ObjectKind::Ellipse => "ellipse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "point" => Some(ObjectKind::Point),
            "rect" => Some(ObjectKind::Rect),
            "ellipse" => Some(ObjectKind::Ellipse),
            _ => None,
        }
    }
}

/// A free-floating shape placed on an [`ObjectLayer`](super::ObjectLayer).
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    meta: Metadata,
    kind: ObjectKind,
    position: Vec2,
    size: Vec2,
    tag: String,
    visible: bool,
    persistent_id: Option<i32>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            meta: Metadata::new(""),
            kind,
            position: Vec2::ZERO,
            size: Vec2::ZERO,
            tag: String::new(),
            visible: true,
            persistent_id: None,
        }
    }

    #[inline] pub fn uuid(&self) -> uuid::Uuid { self.meta.uuid() }
    #[inline] pub fn meta(&self) -> &Metadata { &self.meta }
    #[inline] pub fn meta_mut(&mut self) -> &mut Metadata { &mut self.meta }
    #[inline] pub fn kind(&self) -> ObjectKind { self.kind }
    #[inline] pub fn position(&self) -> Vec2 { self.position }
    #[inline] pub fn size(&self) -> Vec2 { self.size }
    #[inline] pub fn tag(&self) -> &str { &self.tag }
    #[inline] pub fn is_visible(&self) -> bool { self.visible }
    #[inline] pub fn persistent_id(&self) -> Option<i32> { self.persistent_id }

    /// Changing to [`ObjectKind::Point`] zeroes the size.
    pub fn set_kind(&mut self, kind: ObjectKind) {
        self.kind = kind;
        if kind == ObjectKind::Point {
            self.size = Vec2::ZERO;
        }
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_persistent_id(&mut self, id: Option<i32>) {
        self.persistent_id = id;
    }

    /// Axis-aligned hit box. Points get a square half a tile wide centred on
    /// their position.
    pub fn bounds(&self, tile_size: Vec2) -> Rect {
        match self.kind {
            ObjectKind::Point => {
                let side = tile_size.x.min(tile_size.y) * 0.5;
                Rect::new(
                    self.position.x - side * 0.5,
                    self.position.y - side * 0.5,
                    side,
                    side,
                )
            }
            ObjectKind::Rect | ObjectKind::Ellipse => {
                Rect::new(self.position.x, self.position.y, self.size.x, self.size.y)
            }
        }
    }

    pub(crate) fn duplicate(&self) -> Self {
        Self {
            meta: self.meta.duplicate(),
            persistent_id: None,
            ..self.clone()
        }
    }
}
