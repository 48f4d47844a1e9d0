//! Tagged attribute values used for user properties and component fields.
//!
//! An [`Attribute`] always holds exactly one value of one [`AttributeType`].
//! The kind and value live in the same enum variant, so replacing one always
//! replaces the other.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use macroquad::color::{Color, BLACK};
use macroquad::math::{IVec2, IVec3, IVec4, Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::error::MapError;

/// The closed set of value kinds an [`Attribute`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeType {
    /// UTF-8 string
    String,
    /// 32-bit signed integer
    Int,
    /// 2D integer vector
    Int2,
    /// 3D integer vector
    Int3,
    /// 4D integer vector
    Int4,
    /// 32-bit float
    Float,
    /// 2D float vector
    Float2,
    /// 3D float vector
    Float3,
    /// 4D float vector
    Float4,
    /// Boolean
    Bool,
    /// RGBA color
    Color,
    /// File path
    Path,
    /// Reference to a map object by persistent id
    Object,
}

impl AttributeType {
    /// Every kind, in declaration order.
    pub const ALL: [AttributeType; 13] = [
        AttributeType::String,
        AttributeType::Int,
        AttributeType::Int2,
        AttributeType::Int3,
        AttributeType::Int4,
        AttributeType::Float,
        AttributeType::Float2,
        AttributeType::Float3,
        AttributeType::Float4,
        AttributeType::Bool,
        AttributeType::Color,
        AttributeType::Path,
        AttributeType::Object,
    ];

    /// Stable lowercase name, used by the IR and for display.
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Int => "int",
            AttributeType::Int2 => "int2",
            AttributeType::Int3 => "int3",
            AttributeType::Int4 => "int4",
            AttributeType::Float => "float",
            AttributeType::Float2 => "float2",
            AttributeType::Float3 => "float3",
            AttributeType::Float4 => "float4",
            AttributeType::Bool => "bool",
            AttributeType::Color => "color",
            AttributeType::Path => "path",
            AttributeType::Object => "object",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown attribute type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown attribute type '{0}'")]
pub struct UnknownAttributeType(pub String);

impl FromStr for AttributeType {
    type Err = UnknownAttributeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeType::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownAttributeType(s.to_owned()))
    }
}

/// Reference to a map object, by the object's persistent id. Zero means "none".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub i32);

/// A value of one of the [`AttributeType`] kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// String value
    String(String),
    /// Integer value
    Int(i32),
    /// 2D integer vector value
    Int2(IVec2),
    /// 3D integer vector value
    Int3(IVec3),
    /// 4D integer vector value
    Int4(IVec4),
    /// Float value
    Float(f32),
    /// 2D float vector value
    Float2(Vec2),
    /// 3D float vector value
    Float3(Vec3),
    /// 4D float vector value
    Float4(Vec4),
    /// Boolean value
    Bool(bool),
    /// Color value
    Color(Color),
    /// File path value
    Path(PathBuf),
    /// Object reference value
    Object(ObjectRef),
}

impl Default for Attribute {
    fn default() -> Self {
        Attribute::String(String::new())
    }
}

impl Attribute {
    /// Creates an attribute holding the default value of `kind`.
    pub fn new(kind: AttributeType) -> Self {
        match kind {
            AttributeType::String => Attribute::String(String::new()),
            AttributeType::Int => Attribute::Int(0),
            AttributeType::Int2 => Attribute::Int2(IVec2::ZERO),
            AttributeType::Int3 => Attribute::Int3(IVec3::ZERO),
            AttributeType::Int4 => Attribute::Int4(IVec4::ZERO),
            AttributeType::Float => Attribute::Float(0.0),
            AttributeType::Float2 => Attribute::Float2(Vec2::ZERO),
            AttributeType::Float3 => Attribute::Float3(Vec3::ZERO),
            AttributeType::Float4 => Attribute::Float4(Vec4::ZERO),
            AttributeType::Bool => Attribute::Bool(false),
            AttributeType::Color => Attribute::Color(BLACK),
            AttributeType::Path => Attribute::Path(PathBuf::new()),
            AttributeType::Object => Attribute::Object(ObjectRef::default()),
        }
    }

    /// Replaces the value, and with it the kind.
    pub fn set(&mut self, value: impl Into<Attribute>) {
        *self = value.into();
    }

    /// Discards the current value and stores the default value of `kind`.
    pub fn reset(&mut self, kind: AttributeType) {
        *self = Attribute::new(kind);
    }

    /// Returns the active kind.
    pub fn kind(&self) -> AttributeType {
        match self {
            Attribute::String(_) => AttributeType::String,
            Attribute::Int(_) => AttributeType::Int,
            Attribute::Int2(_) => AttributeType::Int2,
            Attribute::Int3(_) => AttributeType::Int3,
            Attribute::Int4(_) => AttributeType::Int4,
            Attribute::Float(_) => AttributeType::Float,
            Attribute::Float2(_) => AttributeType::Float2,
            Attribute::Float3(_) => AttributeType::Float3,
            Attribute::Float4(_) => AttributeType::Float4,
            Attribute::Bool(_) => AttributeType::Bool,
            Attribute::Color(_) => AttributeType::Color,
            Attribute::Path(_) => AttributeType::Path,
            Attribute::Object(_) => AttributeType::Object,
        }
    }

    /// Whether the value equals the default value of the active kind.
    pub fn has_default_value(&self) -> bool {
        *self == Attribute::new(self.kind())
    }

    fn mismatch(&self, expected: AttributeType) -> MapError {
        MapError::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }

    /// Returns the string value.
    pub fn as_string(&self) -> Result<&str, MapError> {
        match self {
            Attribute::String(s) => Ok(s),
            other => Err(other.mismatch(AttributeType::String)),
        }
    }

    /// Returns the integer value.
    pub fn as_int(&self) -> Result<i32, MapError> {
        match self {
            Attribute::Int(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Int)),
        }
    }

    /// Returns the 2D integer vector value.
    pub fn as_int2(&self) -> Result<IVec2, MapError> {
        match self {
            Attribute::Int2(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Int2)),
        }
    }

    /// Returns the 3D integer vector value.
    pub fn as_int3(&self) -> Result<IVec3, MapError> {
        match self {
            Attribute::Int3(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Int3)),
        }
    }

    /// Returns the 4D integer vector value.
    pub fn as_int4(&self) -> Result<IVec4, MapError> {
        match self {
            Attribute::Int4(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Int4)),
        }
    }

    /// Returns the float value.
    pub fn as_float(&self) -> Result<f32, MapError> {
        match self {
            Attribute::Float(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Float)),
        }
    }

    /// Returns the 2D float vector value.
    pub fn as_float2(&self) -> Result<Vec2, MapError> {
        match self {
            Attribute::Float2(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Float2)),
        }
    }

    /// Returns the 3D float vector value.
    pub fn as_float3(&self) -> Result<Vec3, MapError> {
        match self {
            Attribute::Float3(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Float3)),
        }
    }

    /// Returns the 4D float vector value.
    pub fn as_float4(&self) -> Result<Vec4, MapError> {
        match self {
            Attribute::Float4(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Float4)),
        }
    }

    /// Returns the boolean value.
    pub fn as_bool(&self) -> Result<bool, MapError> {
        match self {
            Attribute::Bool(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Bool)),
        }
    }

    /// Returns the color value.
    pub fn as_color(&self) -> Result<Color, MapError> {
        match self {
            Attribute::Color(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Color)),
        }
    }

    /// Returns the path value.
    pub fn as_path(&self) -> Result<&Path, MapError> {
        match self {
            Attribute::Path(v) => Ok(v),
            other => Err(other.mismatch(AttributeType::Path)),
        }
    }

    /// Returns the object reference value.
    pub fn as_object(&self) -> Result<ObjectRef, MapError> {
        match self {
            Attribute::Object(v) => Ok(*v),
            other => Err(other.mismatch(AttributeType::Object)),
        }
    }
}

/// Packs a color into 8-bit RGBA channels.
pub fn color_to_rgba8(color: Color) -> [u8; 4] {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [
        channel(color.r),
        channel(color.g),
        channel(color.b),
        channel(color.a),
    ]
}

/// Formats a color as `#RRGGBBAA`.
pub fn color_to_hex(color: Color) -> String {
    let [r, g, b, a] = color_to_rgba8(color);
    format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
pub fn color_from_hex(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if !digits.is_ascii() || (digits.len() != 6 && digits.len() != 8) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
    Some(Color::from_rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::String(v) => write!(f, "{v}"),
            Attribute::Int(v) => write!(f, "{v}"),
            Attribute::Int2(v) => write!(f, "{v}"),
            Attribute::Int3(v) => write!(f, "{v}"),
            Attribute::Int4(v) => write!(f, "{v}"),
            Attribute::Float(v) => write!(f, "{v}"),
            Attribute::Float2(v) => write!(f, "{v}"),
            Attribute::Float3(v) => write!(f, "{v}"),
            Attribute::Float4(v) => write!(f, "{v}"),
            Attribute::Bool(v) => write!(f, "{v}"),
            Attribute::Color(v) => f.write_str(&color_to_hex(*v)),
            Attribute::Path(v) => write!(f, "{}", v.display()),
            Attribute::Object(v) => write!(f, "object#{}", v.0),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Attribute {
                fn from(value: $ty) -> Self {
                    Attribute::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    String => String,
    i32 => Int,
    IVec2 => Int2,
    IVec3 => Int3,
    IVec4 => Int4,
    f32 => Float,
    Vec2 => Float2,
    Vec3 => Float3,
    Vec4 => Float4,
    bool => Bool,
    Color => Color,
    PathBuf => Path,
    ObjectRef => Object,
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::String(value.to_owned())
    }
}

impl From<&Path> for Attribute {
    fn from(value: &Path) -> Self {
        Attribute::Path(value.to_path_buf())
    }
}

impl From<AttributeType> for Attribute {
    fn from(kind: AttributeType) -> Self {
        Attribute::new(kind)
    }
}
