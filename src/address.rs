//! Structured element addresses.
//!
//! An address has up to three levels: `(base, element + 1, sub_item + 1)`.
//! Levels two and three are 1-based because a zero level is reserved by the
//! parameter system the address comes from. Missing levels mean index 0.

use std::fmt;

/// Maximum number of levels an address may carry.
pub const MAX_DEPTH: usize = 3;

/// Parameter id addressing channel data.
pub const DATA_BASE: i32 = 4005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    levels: [i32; MAX_DEPTH + 1],
    depth: usize,
}

impl Address {
    /// Address from raw levels. Depths above [`MAX_DEPTH`] are kept so
    /// they can be rejected at resolution time.
    pub fn new(levels: &[i32]) -> Self {
        let depth = levels.len().min(MAX_DEPTH + 1);
        let mut buf = [0; MAX_DEPTH + 1];
        buf[..depth].copy_from_slice(&levels[..depth]);
        Self { levels: buf, depth }
    }

    /// Address of `(element, sub_item)` on the data parameter (0-based inputs).
    pub fn element(element: usize, sub_item: usize) -> Self {
        Self::new(&[DATA_BASE, level(element), level(sub_item)])
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn levels(&self) -> &[i32] {
        &self.levels[..self.depth]
    }

    /// Resolve to `(element, sub_item)`, or `None` if out of range.
    pub fn resolve(&self, count: usize, item_length: usize) -> Option<(usize, usize)> {
        if self.depth > MAX_DEPTH {
            return None;
        }
        let element = if self.depth >= 2 { i64::from(self.levels[1]) - 1 } else { 0 };
        let sub_item = if self.depth >= 3 { i64::from(self.levels[2]) - 1 } else { 0 };
        let element = usize::try_from(element).ok().filter(|e| *e < count)?;
        let sub_item = usize::try_from(sub_item).ok().filter(|s| *s < item_length)?;
        Some((element, sub_item))
    }

    /// Linear index `element * item_length + sub_item` within one frame.
    pub fn linear_index(&self, count: usize, item_length: usize) -> Option<usize> {
        self.resolve(count, item_length)
            .map(|(element, sub_item)| element * item_length + sub_item)
    }
}

fn level(index: usize) -> i32 {
    i32::try_from(index).map(|i| i.saturating_add(1)).unwrap_or(i32::MAX)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.levels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_level_mapping() {
        let addr = Address::new(&[DATA_BASE, 4, 2]);
        assert_eq!(addr.resolve(10, 3), Some((3, 1)));
        assert_eq!(addr.linear_index(10, 3), Some(10));
    }

    #[test]
    fn test_shallow_addresses_default_to_zero() {
        assert_eq!(Address::new(&[DATA_BASE]).linear_index(10, 3), Some(0));
        assert_eq!(Address::new(&[DATA_BASE, 2]).linear_index(10, 3), Some(3));
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        assert_eq!(Address::element(10, 0).linear_index(10, 3), None);
        assert_eq!(Address::element(0, 3).linear_index(10, 3), None);
        assert_eq!(Address::new(&[DATA_BASE, 0]).linear_index(10, 3), None);
        assert_eq!(Address::new(&[DATA_BASE, 1, 1, 1]).linear_index(10, 3), None);
        // Depth 1 on an empty channel still points past the end.
        assert_eq!(Address::new(&[DATA_BASE]).linear_index(0, 1), None);
    }

    #[test]
    fn test_element_constructor_is_one_based() {
        let addr = Address::element(3, 1);
        assert_eq!(addr.levels(), &[DATA_BASE, 4, 2]);
        assert_eq!(addr.to_string(), "[4005, 4, 2]");
    }
}
