//! Allocation policies for [`DynamicArray`](crate::dynamic_array::DynamicArray).
//!
//! A policy decides how many bytes to actually reserve for a requested
//! minimum. It is a pure function of its inputs so it can be swapped (or
//! tested) without touching the array.

use crate::config::DEFAULT_ALLOC_BOUNDARY;

/// Computes the reservation size for a buffer.
pub trait AllocationPolicy {
    /// From `min_bytes` (what the array needs now) and `prev_bytes` (what
    /// it currently holds), return the number of bytes to reserve.
    /// Must return at least `min_bytes`.
    fn alloc_size(&self, min_bytes: usize, prev_bytes: usize) -> usize;
}

/// Rounds reservations up to a multiple of `BOUNDARY` bytes.
///
/// Memory is only given back when the request drops to half of the
/// previous reservation or below; smaller reductions keep `prev_bytes`.
///
/// With `BOUNDARY = 1024`: 200 bytes reserve 1024, 1050 bytes reserve 2048.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryPolicy<const BOUNDARY: usize>;

/// Policy used by channels.
pub type DefaultAllocationPolicy = BoundaryPolicy<DEFAULT_ALLOC_BOUNDARY>;

impl<const BOUNDARY: usize> AllocationPolicy for BoundaryPolicy<BOUNDARY> {
    fn alloc_size(&self, min_bytes: usize, prev_bytes: usize) -> usize {
        let mut size = min_bytes;
        if size < prev_bytes && size > prev_bytes / 2 {
            size = prev_bytes;
        }
        if BOUNDARY == 0 {
            return size;
        }
        match size % BOUNDARY {
            0 => size,
            flood => size.saturating_add(BOUNDARY - flood),
        }
    }
}

/// Reserves exactly what is requested. Useful for tests and tight memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactPolicy;

impl AllocationPolicy for ExactPolicy {
    fn alloc_size(&self, min_bytes: usize, _prev_bytes: usize) -> usize {
        min_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_up_to_boundary() {
        let policy = BoundaryPolicy::<1024>;
        assert_eq!(policy.alloc_size(200, 0), 1024);
        assert_eq!(policy.alloc_size(1050, 0), 2048);
        assert_eq!(policy.alloc_size(2048, 0), 2048);
    }

    #[test]
    fn test_shrink_hysteresis() {
        let policy = DefaultAllocationPolicy::default();
        // Minor reduction keeps the previous reservation.
        assert_eq!(policy.alloc_size(39_600, 40_960), 40_960);
        // Half or less releases memory.
        assert_eq!(policy.alloc_size(20_480, 40_960), 20_480);
        assert_eq!(policy.alloc_size(4, 40_960), 2048);
    }

    #[test]
    fn test_never_below_minimum() {
        let policy = DefaultAllocationPolicy::default();
        for min in [1usize, 7, 2047, 2049, 100_000] {
            for prev in [0usize, 1024, 4096, 262_144] {
                assert!(policy.alloc_size(min, prev) >= min);
            }
        }
        assert_eq!(ExactPolicy.alloc_size(13, 4096), 13);
    }

    #[test]
    fn test_saturates_near_max() {
        let policy = DefaultAllocationPolicy::default();
        assert_eq!(policy.alloc_size(usize::MAX - 1, 0), usize::MAX);
    }
}
