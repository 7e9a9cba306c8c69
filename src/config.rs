//! Constants and per-channel defaults.
//!
//! Limits and file-format markers live here so that the store, the
//! persistence layer and the CLI agree on them.

use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

use crate::element::{ChannelValue, ElementType};

/// Upper bound for the number of sub-items per element.
pub const MAX_ITEM_LENGTH: usize = 16;

/// Byte boundary the default allocation policy rounds up to.
pub const DEFAULT_ALLOC_BOUNDARY: usize = 2048;

/// Leading bytes of a persisted node file.
pub const FILE_MAGIC: &[u8; 4] = b"CHNL";

/// Current node file layout version.
pub const FORMAT_VERSION: u32 = 1;

/// Clamp an item length into `[1, MAX_ITEM_LENGTH]`.
pub fn clamp_item_length(value: i64) -> usize {
    value.clamp(1, MAX_ITEM_LENGTH as i64) as usize
}

/// Fill values used whenever storage grows.
///
/// One value per element type; only the one matching the channel's
/// active type is ever used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementDefaults {
    pub integer: i32,
    pub float: f32,
    pub vector: Vec3,
    pub matrix: Affine3A,
    pub string: String,
}

impl Default for ElementDefaults {
    fn default() -> Self {
        Self {
            integer: 0,
            float: 0.0,
            vector: Vec3::ZERO,
            matrix: Affine3A::IDENTITY,
            string: String::new(),
        }
    }
}

impl ElementDefaults {
    /// Default value for `ty` as a tagged value (`Nil` for `Nil`).
    pub fn value_for(&self, ty: ElementType) -> ChannelValue {
        match ty {
            ElementType::Nil => ChannelValue::Nil,
            ElementType::Integer => ChannelValue::Integer(self.integer),
            ElementType::Float => ChannelValue::Float(self.float),
            ElementType::Vector => ChannelValue::Vector(self.vector),
            ElementType::Matrix => ChannelValue::Matrix(self.matrix),
            ElementType::String => ChannelValue::String(self.string.clone()),
        }
    }

    /// Replace the default for the value's type. `Nil` is ignored.
    pub fn set_value(&mut self, value: ChannelValue) {
        match value {
            ChannelValue::Nil => {}
            ChannelValue::Integer(v) => self.integer = v,
            ChannelValue::Float(v) => self.float = v,
            ChannelValue::Vector(v) => self.vector = v,
            ChannelValue::Matrix(v) => self.matrix = v,
            ChannelValue::String(v) => self.string = v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_item_length() {
        assert_eq!(clamp_item_length(0), 1);
        assert_eq!(clamp_item_length(-7), 1);
        assert_eq!(clamp_item_length(3), 3);
        assert_eq!(clamp_item_length(100), MAX_ITEM_LENGTH);
    }

    #[test]
    fn test_defaults_per_type() {
        let mut defaults = ElementDefaults::default();
        assert_eq!(defaults.value_for(ElementType::Matrix), ChannelValue::Matrix(Affine3A::IDENTITY));
        defaults.set_value(ChannelValue::Float(2.5));
        assert_eq!(defaults.value_for(ElementType::Float), ChannelValue::Float(2.5));
        assert_eq!(defaults.value_for(ElementType::Nil), ChannelValue::Nil);
    }
}
