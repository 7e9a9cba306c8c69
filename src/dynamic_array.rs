//! Resizable buffer whose element type is chosen at run time.
//!
//! The array holds at most one live element type. [`DynamicArray::resize`]
//! can be called repeatedly with the same type, or with a new type once
//! [`DynamicArray::destroy`] has dropped the old elements. How much memory
//! is reserved for a given size is delegated to an [`AllocationPolicy`].
//!
//! Typed views returned by [`DynamicArray::get`] borrow the array, so they
//! cannot outlive the next resize.

use std::fmt;
use std::mem;

use glam::{Affine3A, Vec3};
use log::warn;

use crate::alloc::{AllocationPolicy, DefaultAllocationPolicy};
use crate::element::{ChannelValue, Element, ElementType};
use crate::error::{ChannelError, ResizeError};

/// Per-type element storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ElementBuffer {
    #[default]
    Empty,
    Integer(Vec<i32>),
    Float(Vec<f32>),
    Vector(Vec<Vec3>),
    Matrix(Vec<Affine3A>),
    String(Vec<String>),
}

impl ElementBuffer {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementBuffer::Empty => ElementType::Nil,
            ElementBuffer::Integer(_) => ElementType::Integer,
            ElementBuffer::Float(_) => ElementType::Float,
            ElementBuffer::Vector(_) => ElementType::Vector,
            ElementBuffer::Matrix(_) => ElementType::Matrix,
            ElementBuffer::String(_) => ElementType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ElementBuffer::Empty => 0,
            ElementBuffer::Integer(v) => v.len(),
            ElementBuffer::Float(v) => v.len(),
            ElementBuffer::Vector(v) => v.len(),
            ElementBuffer::Matrix(v) => v.len(),
            ElementBuffer::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all elements, keeping the reserved capacity.
    fn clear(&mut self) {
        match self {
            ElementBuffer::Empty => {}
            ElementBuffer::Integer(v) => v.clear(),
            ElementBuffer::Float(v) => v.clear(),
            ElementBuffer::Vector(v) => v.clear(),
            ElementBuffer::Matrix(v) => v.clear(),
            ElementBuffer::String(v) => v.clear(),
        }
    }

    fn value_at(&self, index: usize) -> Option<ChannelValue> {
        match self {
            ElementBuffer::Empty => None,
            ElementBuffer::Integer(v) => v.get(index).map(|x| ChannelValue::Integer(*x)),
            ElementBuffer::Float(v) => v.get(index).map(|x| ChannelValue::Float(*x)),
            ElementBuffer::Vector(v) => v.get(index).map(|x| ChannelValue::Vector(*x)),
            ElementBuffer::Matrix(v) => v.get(index).map(|x| ChannelValue::Matrix(*x)),
            ElementBuffer::String(v) => v.get(index).map(|x| ChannelValue::String(x.clone())),
        }
    }
}

/// Run-time typed contiguous buffer.
#[derive(Debug, Clone, Default)]
pub struct DynamicArray<P: AllocationPolicy = DefaultAllocationPolicy> {
    policy: P,
    buffer: ElementBuffer,
    /// False after `destroy()`: the buffer may still hold capacity of the
    /// previous type, but no live elements.
    live: bool,
    alloc_bytes: usize,
}

impl DynamicArray {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: AllocationPolicy> DynamicArray<P> {
    pub fn with_policy(policy: P) -> Self {
        Self {
            policy,
            buffer: ElementBuffer::Empty,
            live: false,
            alloc_bytes: 0,
        }
    }

    /// Resize to `count` elements of `T`, filling new slots with `init`.
    ///
    /// On error the elements that were valid before the call are kept.
    pub fn resize<T: Element>(&mut self, count: usize, init: &T) -> Result<(), ResizeError> {
        let live_type = self.element_type();
        if self.live && live_type != T::TYPE {
            return Err(ResizeError::TypeMismatch {
                live: live_type,
                requested: T::TYPE,
            });
        }
        if T::slot(&self.buffer).is_none() {
            // Capacity held for a destroyed type cannot be reused by `T`.
            self.buffer = T::wrap(Vec::new());
        }

        let elem_size = mem::size_of::<T>().max(1);
        let min_bytes = count
            .max(1)
            .checked_mul(elem_size)
            .ok_or(ResizeError::CapacityOverflow)?;
        let mut real_bytes = self.policy.alloc_size(min_bytes, self.alloc_bytes);
        if real_bytes < min_bytes {
            warn!(
                "allocation policy returned {} bytes for a {} byte request",
                real_bytes, min_bytes
            );
            real_bytes = min_bytes;
        }
        let capacity = real_bytes / elem_size;

        let Some(items) = T::slot_mut(&mut self.buffer) else {
            return Err(ResizeError::TypeMismatch {
                live: self.buffer.element_type(),
                requested: T::TYPE,
            });
        };
        items.truncate(count);
        if capacity > items.capacity() {
            items.try_reserve_exact(capacity - items.len())?;
        } else if capacity < items.capacity() {
            items.shrink_to(capacity);
        }
        items.resize(count, init.clone());

        self.live = true;
        self.alloc_bytes = real_bytes;
        Ok(())
    }

    /// Drop all live elements and forget the active type.
    /// Reserved memory stays with the array.
    pub fn destroy(&mut self) {
        self.buffer.clear();
        self.live = false;
    }

    /// True if `index` addresses a live element.
    pub fn accessible(&self, index: usize) -> bool {
        self.live && index < self.buffer.len()
    }

    /// Typed view of the elements. `None` unless `T` is the live type.
    pub fn get<T: Element>(&self) -> Option<&[T]> {
        if !self.live {
            return None;
        }
        T::slot(&self.buffer).map(Vec::as_slice)
    }

    pub fn get_mut<T: Element>(&mut self) -> Option<&mut [T]> {
        if !self.live {
            return None;
        }
        T::slot_mut(&mut self.buffer).map(Vec::as_mut_slice)
    }

    /// Element at `index` as a tagged value.
    pub fn value_at(&self, index: usize) -> Option<ChannelValue> {
        if !self.live {
            return None;
        }
        self.buffer.value_at(index)
    }

    /// Store `value` at `index`, translating it to the live type.
    pub fn set_value_at(&mut self, index: usize, value: &ChannelValue) -> Result<(), ChannelError> {
        let len = self.len();
        if !self.accessible(index) {
            return Err(ChannelError::OutOfRange { index, len });
        }
        let channel = self.buffer.element_type();
        let mismatch = || ChannelError::TypeMismatch {
            value: value.element_type(),
            channel,
        };
        match &mut self.buffer {
            ElementBuffer::Empty => return Err(mismatch()),
            ElementBuffer::Integer(v) => v[index] = i32::from_value(value).ok_or_else(mismatch)?,
            ElementBuffer::Float(v) => v[index] = f32::from_value(value).ok_or_else(mismatch)?,
            ElementBuffer::Vector(v) => v[index] = Vec3::from_value(value).ok_or_else(mismatch)?,
            ElementBuffer::Matrix(v) => v[index] = Affine3A::from_value(value).ok_or_else(mismatch)?,
            ElementBuffer::String(v) => v[index] = String::from_value(value).ok_or_else(mismatch)?,
        }
        Ok(())
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        if self.live { self.buffer.len() } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False on a fresh or destroyed array.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Live element type, `Nil` if none.
    pub fn element_type(&self) -> ElementType {
        if self.live {
            self.buffer.element_type()
        } else {
            ElementType::Nil
        }
    }

    /// Bytes currently reserved according to the policy.
    pub fn alloc_bytes(&self) -> usize {
        self.alloc_bytes
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }
}

impl<P: AllocationPolicy> fmt::Display for DynamicArray<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DynamicArray(type={}, count={}, alloc_bytes={})",
            self.element_type(),
            self.len(),
            self.alloc_bytes
        )
    }
}
