//! Element types a channel can hold.
//!
//! `ElementType` is the run-time tag, `ChannelValue` a single tagged value
//! (what callers pass in and get back), and [`Element`] binds a concrete
//! Rust type to its tag and to its slot in an [`ElementBuffer`].

use std::fmt;

use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

use crate::dynamic_array::ElementBuffer;

/// Run-time element type of a channel.
///
/// The numeric codes are part of the persisted layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElementType {
    #[default]
    Nil,
    Integer,
    Float,
    /// Three floats.
    Vector,
    /// Affine transform, twelve floats.
    Matrix,
    String,
}

impl ElementType {
    pub const ALL: [ElementType; 6] = [
        ElementType::Nil,
        ElementType::Integer,
        ElementType::Float,
        ElementType::Vector,
        ElementType::Matrix,
        ElementType::String,
    ];

    /// Persisted type code.
    pub fn code(self) -> i32 {
        match self {
            ElementType::Nil => 0,
            ElementType::Integer => 1,
            ElementType::Float => 2,
            ElementType::Vector => 3,
            ElementType::Matrix => 4,
            ElementType::String => 5,
        }
    }

    /// Inverse of [`code`](Self::code); `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Nil => "nil",
            ElementType::Integer => "integer",
            ElementType::Float => "float",
            ElementType::Vector => "vector",
            ElementType::Matrix => "matrix",
            ElementType::String => "string",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single type-tagged element value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ChannelValue {
    #[default]
    Nil,
    Integer(i32),
    Float(f32),
    Vector(Vec3),
    Matrix(Affine3A),
    String(String),
}

impl ChannelValue {
    pub fn element_type(&self) -> ElementType {
        match self {
            ChannelValue::Nil => ElementType::Nil,
            ChannelValue::Integer(_) => ElementType::Integer,
            ChannelValue::Float(_) => ElementType::Float,
            ChannelValue::Vector(_) => ElementType::Vector,
            ChannelValue::Matrix(_) => ElementType::Matrix,
            ChannelValue::String(_) => ElementType::String,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        i32::from_value(self)
    }

    pub fn as_f32(&self) -> Option<f32> {
        f32::from_value(self)
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        Vec3::from_value(self)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ChannelValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Nil => f.write_str("nil"),
            ChannelValue::Integer(v) => write!(f, "{}", v),
            ChannelValue::Float(v) => write!(f, "{}", v),
            ChannelValue::Vector(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            ChannelValue::Matrix(m) => write!(f, "{:?}", m.to_cols_array()),
            ChannelValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A Rust type that can be stored in a channel.
pub trait Element: Clone + PartialEq + 'static {
    /// Tag of this type.
    const TYPE: ElementType;

    fn slot(buffer: &ElementBuffer) -> Option<&Vec<Self>>;
    fn slot_mut(buffer: &mut ElementBuffer) -> Option<&mut Vec<Self>>;
    fn wrap(items: Vec<Self>) -> ElementBuffer;

    /// Convert a tagged value, if it can be translated to this type.
    fn from_value(value: &ChannelValue) -> Option<Self>;
    fn into_value(self) -> ChannelValue;
}

macro_rules! impl_element {
    ($ty:ty, $tag:ident) => {
        impl Element for $ty {
            const TYPE: ElementType = ElementType::$tag;

            fn slot(buffer: &ElementBuffer) -> Option<&Vec<Self>> {
                match buffer {
                    ElementBuffer::$tag(items) => Some(items),
                    _ => None,
                }
            }

            fn slot_mut(buffer: &mut ElementBuffer) -> Option<&mut Vec<Self>> {
                match buffer {
                    ElementBuffer::$tag(items) => Some(items),
                    _ => None,
                }
            }

            fn wrap(items: Vec<Self>) -> ElementBuffer {
                ElementBuffer::$tag(items)
            }

            fn from_value(value: &ChannelValue) -> Option<Self> {
                convert_from_value!($tag, value)
            }

            fn into_value(self) -> ChannelValue {
                ChannelValue::$tag(self)
            }
        }
    };
}

// Integer and Float translate into each other, everything else is exact.
macro_rules! convert_from_value {
    (Integer, $value:expr) => {
        match $value {
            ChannelValue::Integer(v) => Some(*v),
            ChannelValue::Float(v) => Some(*v as i32),
            _ => None,
        }
    };
    (Float, $value:expr) => {
        match $value {
            ChannelValue::Float(v) => Some(*v),
            ChannelValue::Integer(v) => Some(*v as f32),
            _ => None,
        }
    };
    ($tag:ident, $value:expr) => {
        match $value {
            ChannelValue::$tag(v) => Some(v.clone()),
            _ => None,
        }
    };
}

impl_element!(i32, Integer);
impl_element!(f32, Float);
impl_element!(Vec3, Vector);
impl_element!(Affine3A, Matrix);
impl_element!(String, String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_roundtrip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ElementType::from_code(6), None);
        assert_eq!(ElementType::from_code(-1), None);
    }

    #[test]
    fn test_numeric_translation() {
        assert_eq!(i32::from_value(&ChannelValue::Float(3.9)), Some(3));
        assert_eq!(f32::from_value(&ChannelValue::Integer(2)), Some(2.0));
        assert_eq!(Vec3::from_value(&ChannelValue::Integer(2)), None);
        assert_eq!(String::from_value(&ChannelValue::Nil), None);
    }

    #[test]
    fn test_value_tags() {
        assert_eq!(ChannelValue::Vector(Vec3::ONE).element_type(), ElementType::Vector);
        assert_eq!(ChannelValue::default().element_type(), ElementType::Nil);
        assert_eq!(ChannelValue::String("a".into()).as_str(), Some("a"));
    }
}
