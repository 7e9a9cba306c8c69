//! Channel storage engine.
//!
//! [`ChannelStore`] owns one [`DynamicArray`] and the attributes that size
//! it. Every size-relevant attribute write is followed by
//! [`ChannelStore::update`], which re-validates the storage against the
//! attributes, recomputes the [`ChannelState`] and bumps the dirty count when
//! anything observable changed.
//!
//! The store never looks at its siblings itself. The owning node resolves
//! the reference channel and passes the result in as a [`HostView`], then
//! broadcasts to the siblings if `update` asks for it.

use std::fmt;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::config::{ElementDefaults, MAX_ITEM_LENGTH};
use crate::dynamic_array::DynamicArray;
use crate::element::{ChannelValue, Element, ElementType};
use crate::error::{ChannelError, ResizeError};

/// Persistence mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Runtime only, never written with its elements.
    #[default]
    Floating,
    /// Elements are persisted; the channel may be locked.
    Permanent,
}

impl Mode {
    pub fn code(self) -> i32 {
        match self {
            Mode::Floating => 0,
            Mode::Permanent => 1,
        }
    }

    /// Unknown codes read as `Floating`.
    pub fn from_code(code: i32) -> Self {
        if code == 1 { Mode::Permanent } else { Mode::Floating }
    }
}

/// Outcome of the last validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelState {
    /// Type is `Nil`.
    #[default]
    Uninitialized,
    Initialized,
    /// Type code not supported.
    TypeError,
    /// Storage could not be allocated.
    MemoryError,
    /// Reference channel missing or not initialized.
    RefError,
    /// Not attached to a node.
    Unknown,
}

impl ChannelState {
    pub fn code(self) -> i32 {
        match self {
            ChannelState::Uninitialized => 0,
            ChannelState::Initialized => 1,
            ChannelState::TypeError => 2,
            ChannelState::MemoryError => 3,
            ChannelState::RefError => 4,
            ChannelState::Unknown => 5,
        }
    }

    /// True for the error states.
    pub fn is_error(self) -> bool {
        !matches!(self, ChannelState::Uninitialized | ChannelState::Initialized)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Uninitialized => "uninitialized",
            ChannelState::Initialized => "initialized",
            ChannelState::TypeError => "type error",
            ChannelState::MemoryError => "memory error",
            ChannelState::RefError => "reference error",
            ChannelState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// How an update pass reports changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Bump the dirty count on change but never notify siblings.
    Silent,
    /// Notify siblings if something changed.
    OnChange,
    /// Treat the pass as a change even if nothing differs.
    Force,
}

/// What the owner knows about the store's surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostView {
    /// No owning node.
    Detached,
    /// Owner exists but reference resolution is postponed (loading,
    /// cloning). The current count is kept.
    Deferred,
    /// Owner exists. `reference` is the channel the reference name
    /// resolved to, if any.
    Attached { reference: Option<ReferenceInfo> },
}

/// Snapshot of the reference channel taken before the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceInfo {
    pub state: ChannelState,
    pub count: usize,
}

/// Attributes whose editing controls can be enabled or disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Mode,
    Type,
    Reference,
    Reinitialize,
    Locked,
    Count,
    ItemLength,
    FrameCount,
    Frame,
    FrameOffset,
    State,
    Defaults,
}

/// Typed, resizable, multi-frame element storage of one channel.
#[derive(Debug)]
pub struct ChannelStore {
    pub(crate) mode: Mode,
    pub(crate) locked: bool,
    /// Requested type code, possibly unsupported.
    pub(crate) type_code: i32,
    /// Type code the storage was last committed with.
    pub(crate) data_code: i32,
    pub(crate) count: usize,
    pub(crate) item_length: usize,
    pub(crate) frame_count: usize,
    pub(crate) frame: i32,
    pub(crate) sync_frame: bool,
    pub(crate) frame_offset: i32,
    pub(crate) state: ChannelState,
    pub(crate) dirty_count: u32,
    pub(crate) reference: String,
    pub(crate) defaults: ElementDefaults,
    pub(crate) data: DynamicArray,
    /// Set while an update pass (including its broadcast) runs.
    pub(crate) updating: bool,
}

impl Default for ChannelStore {
    fn default() -> Self {
        Self {
            mode: Mode::Floating,
            locked: false,
            type_code: ElementType::Nil.code(),
            data_code: ElementType::Nil.code(),
            count: 0,
            item_length: 1,
            frame_count: 1,
            frame: 0,
            sync_frame: true,
            frame_offset: 0,
            state: ChannelState::Uninitialized,
            dirty_count: 0,
            reference: String::new(),
            defaults: ElementDefaults::default(),
            data: DynamicArray::new(),
            updating: false,
        }
    }
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Attribute getters ===

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Committed element type. `Nil` while an unsupported code is set.
    pub fn element_type(&self) -> ElementType {
        ElementType::from_code(self.data_code).unwrap_or(ElementType::Nil)
    }

    /// Committed type code as persisted.
    pub fn type_code(&self) -> i32 {
        self.data_code
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn item_length(&self) -> usize {
        self.item_length
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn sync_frame(&self) -> bool {
        self.sync_frame
    }

    pub fn frame_offset(&self) -> i32 {
        self.frame_offset
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn dirty_count(&self) -> u32 {
        self.dirty_count
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn defaults(&self) -> &ElementDefaults {
        &self.defaults
    }

    /// Elements per frame (`count * item_length`).
    pub fn frame_len(&self) -> usize {
        self.count.saturating_mul(self.item_length)
    }

    /// Elements over all frames, `None` on overflow.
    pub fn total_len(&self) -> Option<usize> {
        self.count
            .checked_mul(self.item_length)?
            .checked_mul(self.frame_count)
    }

    /// Live elements in storage.
    pub fn storage_len(&self) -> usize {
        self.data.len()
    }

    pub fn alloc_bytes(&self) -> usize {
        self.data.alloc_bytes()
    }

    /// Description of the backing array for display.
    pub fn memory_info(&self) -> String {
        self.data.to_string()
    }

    /// Index of the first element of the current frame window.
    ///
    /// Negative frames wrap: with 5 frames, frame -1 is window 4. `None`
    /// when the offset does not fit in `usize`.
    pub fn frame_offset_index(&self) -> Option<usize> {
        let frames = i64::try_from(self.frame_count.max(1)).unwrap_or(i64::MAX);
        let window = usize::try_from(i64::from(self.frame).rem_euclid(frames)).ok()?;
        window.checked_mul(self.count.checked_mul(self.item_length)?)
    }

    // === Attribute setters ===
    //
    // Setters only assign; the caller runs `update` afterwards when they
    // return `true`.

    fn check_unlocked(&self) -> Result<(), ChannelError> {
        if self.locked { Err(ChannelError::Locked) } else { Ok(()) }
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) -> Result<bool, ChannelError> {
        self.check_unlocked()?;
        Ok(assign(&mut self.mode, mode))
    }

    pub(crate) fn set_type_code(&mut self, code: i32) -> Result<bool, ChannelError> {
        self.check_unlocked()?;
        Ok(assign(&mut self.type_code, code))
    }

    pub(crate) fn set_count(&mut self, count: usize) -> Result<bool, ChannelError> {
        self.check_unlocked()?;
        Ok(assign(&mut self.count, count))
    }

    pub(crate) fn set_item_length(&mut self, item_length: usize) -> Result<bool, ChannelError> {
        self.check_unlocked()?;
        let value = item_length.clamp(1, MAX_ITEM_LENGTH);
        Ok(assign(&mut self.item_length, value))
    }

    pub(crate) fn set_frame_count(&mut self, frame_count: usize) -> Result<bool, ChannelError> {
        self.check_unlocked()?;
        Ok(assign(&mut self.frame_count, frame_count.max(1)))
    }

    pub(crate) fn set_reference(&mut self, name: &str) -> Result<bool, ChannelError> {
        self.check_unlocked()?;
        if self.reference == name {
            return Ok(false);
        }
        self.reference = name.to_string();
        Ok(true)
    }

    pub(crate) fn set_frame(&mut self, frame: i32) -> Result<bool, ChannelError> {
        if self.sync_frame {
            return Err(ChannelError::FrameSynced);
        }
        Ok(assign(&mut self.frame, frame))
    }

    pub(crate) fn set_sync_frame(&mut self, sync: bool) -> bool {
        assign(&mut self.sync_frame, sync)
    }

    /// Only has an effect on the frame while `sync_frame` is on.
    pub(crate) fn set_frame_offset(&mut self, offset: i32) -> bool {
        assign(&mut self.frame_offset, offset)
    }

    pub(crate) fn set_locked(&mut self, locked: bool) -> Result<bool, ChannelError> {
        if self.mode != Mode::Permanent {
            return if locked { Err(ChannelError::NotPermanent) } else { Ok(false) };
        }
        Ok(assign(&mut self.locked, locked))
    }

    pub(crate) fn set_defaults(&mut self, defaults: ElementDefaults) -> bool {
        assign(&mut self.defaults, defaults)
    }

    /// Follow the externally supplied time if the frame is synchronised.
    /// Returns `true` and bumps the dirty count when the frame moved.
    pub(crate) fn sync_to(&mut self, time_frame: i32) -> bool {
        if !self.sync_frame {
            return false;
        }
        let moved = assign(&mut self.frame, time_frame.saturating_add(self.frame_offset));
        if moved {
            self.touch();
        }
        moved
    }

    /// Record an observable change without touching storage.
    pub(crate) fn touch(&mut self) {
        self.dirty_count = self.dirty_count.wrapping_add(1);
    }

    // === Validation ===

    /// Drop all elements. With `reset_attribs`, type and count go back to
    /// `Nil` and 0 as well.
    pub(crate) fn flush(&mut self, reset_attribs: bool) {
        self.data.destroy();
        if reset_attribs {
            self.type_code = ElementType::Nil.code();
            self.count = 0;
        }
        self.data_code = ElementType::Nil.code();
        self.state = ChannelState::Uninitialized;
    }

    /// Re-validate storage against the attributes.
    ///
    /// Returns `true` if the owner should notify the siblings.
    pub(crate) fn update(&mut self, host: HostView, mode: UpdateMode) -> bool {
        let mut changed = mode == UpdateMode::Force;

        let reference = match host {
            HostView::Detached => {
                let was_unknown = self.state == ChannelState::Unknown;
                self.flush(false);
                self.state = ChannelState::Unknown;
                if changed || !was_unknown {
                    self.touch();
                    return mode != UpdateMode::Silent;
                }
                return false;
            }
            HostView::Deferred => None,
            HostView::Attached { reference } => Some(reference),
        };

        if self.type_code != self.data_code {
            debug!("channel type {} -> {}", self.data_code, self.type_code);
            self.flush(false);
            self.data_code = self.type_code;
            changed = true;
        }

        let mut new_state = None;
        if !self.reference.is_empty() {
            match reference {
                // Deferred: keep the count until the owner resolves it.
                None => {}
                Some(Some(info)) if info.state == ChannelState::Initialized => {
                    changed |= assign(&mut self.count, info.count);
                }
                Some(_) => {
                    warn!("reference channel '{}' unavailable", self.reference);
                    changed |= assign(&mut self.count, 0);
                    new_state = Some(ChannelState::RefError);
                }
            }
        }

        let new_state = new_state.unwrap_or_else(|| self.resize_storage());
        if self.state != new_state {
            self.state = new_state;
            changed = true;
        }
        if changed {
            self.touch();
        }
        changed && mode != UpdateMode::Silent
    }

    fn resize_storage(&mut self) -> ChannelState {
        let Some(ty) = ElementType::from_code(self.data_code) else {
            warn!("unsupported channel type code {}", self.data_code);
            return ChannelState::TypeError;
        };
        let Some(target) = self.total_len() else {
            warn!("channel size overflows");
            return ChannelState::MemoryError;
        };
        let defaults = &self.defaults;
        let result = match ty {
            ElementType::Nil => return ChannelState::Uninitialized,
            ElementType::Integer => self.data.resize(target, &defaults.integer),
            ElementType::Float => self.data.resize(target, &defaults.float),
            ElementType::Vector => self.data.resize(target, &defaults.vector),
            ElementType::Matrix => self.data.resize(target, &defaults.matrix),
            ElementType::String => self.data.resize(target, &defaults.string),
        };
        match result {
            Ok(()) => ChannelState::Initialized,
            Err(ResizeError::TypeMismatch { live, requested }) => {
                error!("storage holds {} while committing {}", live, requested);
                ChannelState::MemoryError
            }
            Err(e) => {
                warn!("resize to {} {} elements failed: {}", target, ty, e);
                ChannelState::MemoryError
            }
        }
    }

    // === Element access ===

    /// Flat storage index of `address` inside the current frame window.
    pub fn storage_index(&self, address: &Address) -> Result<usize, ChannelError> {
        let invalid = || ChannelError::InvalidAddress {
            levels: address.levels().to_vec(),
            count: self.count,
            item_length: self.item_length,
        };
        let index = address
            .linear_index(self.count, self.item_length)
            .ok_or_else(invalid)?;
        self.frame_offset_index()
            .and_then(|offset| offset.checked_add(index))
            .ok_or_else(invalid)
    }

    /// Read the element at `address` in the current frame.
    pub fn get_element(&self, address: &Address) -> Result<ChannelValue, ChannelError> {
        let index = self.storage_index(address).inspect_err(|e| error!("get element: {}", e))?;
        self.value_at(index).ok_or(ChannelError::OutOfRange {
            index,
            len: self.data.len(),
        })
    }

    /// Write the element at `address` in the current frame.
    pub fn set_element(&mut self, address: &Address, value: &ChannelValue) -> Result<(), ChannelError> {
        self.check_unlocked()?;
        let index = self.storage_index(address).inspect_err(|e| error!("set element: {}", e))?;
        self.data.set_value_at(index, value)
    }

    /// Element by flat storage index (frame-major, then element, then sub-item).
    pub fn value_at(&self, index: usize) -> Option<ChannelValue> {
        self.data.value_at(index)
    }

    /// Write by flat storage index.
    pub fn set_value_at(&mut self, index: usize, value: &ChannelValue) -> Result<(), ChannelError> {
        self.check_unlocked()?;
        self.data.set_value_at(index, value)
    }

    /// Whole storage as a typed slice.
    pub fn data<T: Element>(&self) -> Option<&[T]> {
        self.data.get::<T>()
    }

    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T], ChannelError> {
        self.check_unlocked()?;
        let channel = self.element_type();
        self.data.get_mut::<T>().ok_or(ChannelError::TypeMismatch {
            value: T::TYPE,
            channel,
        })
    }

    /// Typed slice of the current frame window.
    pub fn frame_data<T: Element>(&self) -> Option<&[T]> {
        let start = self.frame_offset_index()?;
        let end = start.checked_add(self.count.checked_mul(self.item_length)?)?;
        self.data.get::<T>()?.get(start..end)
    }

    /// Fill value for the committed type.
    pub fn default_value(&self) -> ChannelValue {
        self.defaults.value_for(self.element_type())
    }

    // === UI helpers ===

    /// Whether the editing control for `attr` should be enabled.
    pub fn is_editable(&self, attr: Attribute) -> bool {
        match attr {
            Attribute::Mode | Attribute::Type | Attribute::Reference | Attribute::Reinitialize => {
                !self.locked
            }
            Attribute::Locked => self.mode == Mode::Permanent,
            Attribute::Frame => !self.sync_frame,
            Attribute::FrameOffset => self.sync_frame,
            Attribute::State => false,
            Attribute::Count | Attribute::ItemLength | Attribute::FrameCount => {
                !self.locked && self.reference.is_empty() && self.type_code != ElementType::Nil.code()
            }
            Attribute::Defaults => self.shows_type_controls(),
        }
    }

    /// Type-specific controls are hidden while the channel is in an error state.
    pub fn shows_type_controls(&self) -> bool {
        !self.state.is_error()
    }
}

/// Copy contract: scalars and defaults are copied, the storage type is
/// re-committed from scratch (without notifying anyone), then elements are
/// copied until either side runs out.
impl Clone for ChannelStore {
    fn clone(&self) -> Self {
        let mut dest = ChannelStore {
            mode: self.mode,
            locked: self.locked,
            type_code: self.data_code,
            data_code: ElementType::Nil.code(),
            count: self.count,
            item_length: self.item_length,
            frame_count: self.frame_count,
            frame: self.frame,
            sync_frame: self.sync_frame,
            frame_offset: self.frame_offset,
            reference: self.reference.clone(),
            defaults: self.defaults.clone(),
            ..ChannelStore::default()
        };
        dest.update(HostView::Deferred, UpdateMode::Silent);
        let Some(total) = self.total_len() else {
            return dest;
        };
        for index in 0..total {
            let Some(value) = self.value_at(index) else { break };
            if dest.data.set_value_at(index, &value).is_err() {
                break;
            }
        }
        dest
    }
}

fn assign<T: PartialEq>(dest: &mut T, value: T) -> bool {
    if *dest != value {
        *dest = value;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn attached() -> HostView {
        HostView::Attached { reference: None }
    }

    fn store(ty: ElementType, count: usize, item_length: usize) -> ChannelStore {
        let mut s = ChannelStore::new();
        s.set_type_code(ty.code()).unwrap();
        s.set_count(count).unwrap();
        s.set_item_length(item_length).unwrap();
        s.update(attached(), UpdateMode::OnChange);
        s
    }

    #[test]
    fn test_fresh_store() {
        let mut s = ChannelStore::new();
        assert_eq!(s.state(), ChannelState::Uninitialized);
        assert!(!s.update(attached(), UpdateMode::OnChange));
        assert_eq!(s.dirty_count(), 0);
        assert_eq!(s.element_type(), ElementType::Nil);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut s = store(ElementType::Float, 10, 2);
        assert_eq!(s.state(), ChannelState::Initialized);
        assert_eq!(s.storage_len(), 20);
        let dirty = s.dirty_count();
        assert!(!s.update(attached(), UpdateMode::OnChange));
        assert!(!s.update(attached(), UpdateMode::OnChange));
        assert_eq!(s.dirty_count(), dirty);
    }

    #[test]
    fn test_force_always_counts() {
        let mut s = store(ElementType::Integer, 3, 1);
        let dirty = s.dirty_count();
        assert!(s.update(attached(), UpdateMode::Force));
        assert_eq!(s.dirty_count(), dirty + 1);
    }

    #[test]
    fn test_type_switch_resets_to_defaults() {
        let mut s = store(ElementType::Integer, 4, 1);
        s.set_value_at(2, &ChannelValue::Integer(42)).unwrap();
        s.defaults.float = 0.5;

        s.set_type_code(ElementType::Float.code()).unwrap();
        s.update(attached(), UpdateMode::OnChange);
        assert_eq!(s.element_type(), ElementType::Float);
        assert_eq!(s.data::<f32>(), Some(&[0.5, 0.5, 0.5, 0.5][..]));
    }

    #[test]
    fn test_unsupported_type_code() {
        let mut s = store(ElementType::Integer, 4, 1);
        s.set_type_code(99).unwrap();
        s.update(attached(), UpdateMode::OnChange);
        assert_eq!(s.state(), ChannelState::TypeError);
        assert_eq!(s.type_code(), 99);
        assert_eq!(s.element_type(), ElementType::Nil);
        assert_eq!(s.storage_len(), 0);
        assert!(!s.shows_type_controls());
    }

    #[test]
    fn test_nil_type_is_uninitialized() {
        let mut s = store(ElementType::Nil, 5, 1);
        assert_eq!(s.state(), ChannelState::Uninitialized);
        assert_eq!(s.storage_len(), 0);
        s.set_type_code(ElementType::Vector.code()).unwrap();
        s.update(attached(), UpdateMode::OnChange);
        assert_eq!(s.state(), ChannelState::Initialized);
        assert_eq!(s.data::<Vec3>().map(|d| d.len()), Some(5));
    }

    #[test]
    fn test_oversized_window_does_not_panic() {
        let mut s = store(ElementType::Integer, 2, 1);
        s.set_count(1 << 31).unwrap();
        s.set_item_length(16).unwrap();
        s.set_frame_count(1 << 31).unwrap();
        s.update(attached(), UpdateMode::Force);
        assert_eq!(s.state(), ChannelState::MemoryError);

        s.set_sync_frame(false);
        s.set_frame(i32::MAX).unwrap();
        assert_eq!(s.frame_offset_index(), None);
        assert!(matches!(
            s.get_element(&Address::element(0, 0)),
            Err(ChannelError::InvalidAddress { .. })
        ));
        assert!(s.set_element(&Address::element(0, 0), &ChannelValue::Integer(1)).is_err());
        assert_eq!(s.frame_data::<i32>(), None);
    }

    #[test]
    fn test_size_overflow_is_memory_error() {
        let mut s = store(ElementType::Integer, 3, 1);
        s.set_value_at(0, &ChannelValue::Integer(9)).unwrap();
        s.set_count(usize::MAX / 2).unwrap();
        s.update(attached(), UpdateMode::Force);
        assert_eq!(s.state(), ChannelState::MemoryError);
        // Last good storage survives.
        assert_eq!(s.value_at(0), Some(ChannelValue::Integer(9)));

        s.set_count(3).unwrap();
        s.update(attached(), UpdateMode::Force);
        assert_eq!(s.state(), ChannelState::Initialized);
    }

    #[test]
    fn test_frame_wraparound() {
        let mut s = ChannelStore::new();
        s.set_type_code(ElementType::Integer.code()).unwrap();
        s.set_count(2).unwrap();
        s.set_item_length(3).unwrap();
        s.set_frame_count(5).unwrap();
        s.update(attached(), UpdateMode::OnChange);
        s.set_sync_frame(false);

        let window = |s: &ChannelStore| s.frame_offset_index().unwrap() / s.frame_len();
        s.set_frame(-1).unwrap();
        assert_eq!(window(&s), 4);
        s.set_frame(5).unwrap();
        assert_eq!(window(&s), 0);
        s.set_frame(11).unwrap();
        assert_eq!(window(&s), 1);
        assert_eq!(s.frame_offset_index(), Some(6));
    }

    #[test]
    fn test_frame_windowed_access() {
        let mut s = store(ElementType::Integer, 2, 1);
        s.set_frame_count(3).unwrap();
        s.update(attached(), UpdateMode::Force);
        s.set_sync_frame(false);
        s.set_frame(2).unwrap();
        s.set_element(&Address::element(1, 0), &ChannelValue::Integer(7)).unwrap();
        assert_eq!(s.value_at(5), Some(ChannelValue::Integer(7)));
        assert_eq!(s.frame_data::<i32>(), Some(&[0, 7][..]));

        s.set_frame(0).unwrap();
        assert_eq!(s.get_element(&Address::element(1, 0)).unwrap(), ChannelValue::Integer(0));
    }

    #[test]
    fn test_sync_frame_gates_writes() {
        let mut s = ChannelStore::new();
        assert!(matches!(s.set_frame(3), Err(ChannelError::FrameSynced)));
        s.set_frame_offset(10);
        assert!(s.sync_to(5));
        assert_eq!(s.frame(), 15);
        assert!(!s.sync_to(5));

        s.set_sync_frame(false);
        assert!(!s.sync_to(100));
        assert_eq!(s.frame(), 15);
        s.set_frame(3).unwrap();
        assert_eq!(s.frame(), 3);
    }

    #[test]
    fn test_invalid_address() {
        let mut s = store(ElementType::Float, 10, 3);
        assert_eq!(s.storage_index(&Address::element(3, 1)).unwrap(), 10);
        assert!(matches!(
            s.get_element(&Address::element(10, 0)),
            Err(ChannelError::InvalidAddress { .. })
        ));
        assert!(matches!(
            s.set_element(&Address::element(0, 3), &ChannelValue::Float(1.0)),
            Err(ChannelError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_lock_gating() {
        let mut s = store(ElementType::Integer, 4, 1);
        assert!(matches!(s.set_locked(true), Err(ChannelError::NotPermanent)));
        assert!(!s.is_locked());

        s.set_mode(Mode::Permanent).unwrap();
        assert!(s.set_locked(true).unwrap());
        let dirty = s.dirty_count();
        assert!(matches!(s.set_count(9), Err(ChannelError::Locked)));
        assert!(matches!(s.set_item_length(2), Err(ChannelError::Locked)));
        assert!(matches!(s.set_frame_count(2), Err(ChannelError::Locked)));
        assert!(matches!(s.set_reference("other"), Err(ChannelError::Locked)));
        assert!(matches!(s.set_type_code(2), Err(ChannelError::Locked)));
        assert!(matches!(s.set_mode(Mode::Floating), Err(ChannelError::Locked)));
        assert!(matches!(
            s.set_element(&Address::element(0, 0), &ChannelValue::Integer(1)),
            Err(ChannelError::Locked)
        ));
        assert!(s.data_mut::<i32>().is_err());
        assert_eq!(s.dirty_count(), dirty);
        assert_eq!(s.count(), 4);
    }

    #[test]
    fn test_reference_resolution() {
        let mut s = store(ElementType::Integer, 2, 1);
        s.set_reference("A").unwrap();

        let found = HostView::Attached {
            reference: Some(ReferenceInfo { state: ChannelState::Initialized, count: 7 }),
        };
        assert!(s.update(found, UpdateMode::Force));
        assert_eq!(s.count(), 7);
        assert_eq!(s.storage_len(), 7);

        let broken = HostView::Attached {
            reference: Some(ReferenceInfo { state: ChannelState::RefError, count: 7 }),
        };
        s.update(broken, UpdateMode::OnChange);
        assert_eq!(s.state(), ChannelState::RefError);
        assert_eq!(s.count(), 0);

        // Staying broken is not a change.
        let dirty = s.dirty_count();
        assert!(!s.update(attached(), UpdateMode::OnChange));
        assert_eq!(s.dirty_count(), dirty);

        assert!(s.update(found, UpdateMode::OnChange));
        assert_eq!(s.state(), ChannelState::Initialized);
        assert_eq!(s.count(), 7);
    }

    #[test]
    fn test_deferred_keeps_count() {
        let mut s = ChannelStore::new();
        s.set_type_code(ElementType::Float.code()).unwrap();
        s.set_reference("A").unwrap();
        s.set_count(4).unwrap();
        s.update(HostView::Deferred, UpdateMode::OnChange);
        assert_eq!(s.count(), 4);
        assert_eq!(s.state(), ChannelState::Initialized);
    }

    #[test]
    fn test_detached_is_unknown_once() {
        let mut s = store(ElementType::Integer, 4, 1);
        assert!(s.update(HostView::Detached, UpdateMode::OnChange));
        assert_eq!(s.state(), ChannelState::Unknown);
        assert_eq!(s.storage_len(), 0);
        assert_eq!(s.count(), 4);
        let dirty = s.dirty_count();
        assert!(!s.update(HostView::Detached, UpdateMode::OnChange));
        assert_eq!(s.dirty_count(), dirty);

        // Recovers once attached again.
        s.update(attached(), UpdateMode::OnChange);
        assert_eq!(s.state(), ChannelState::Initialized);
        assert_eq!(s.storage_len(), 4);
    }

    #[test]
    fn test_clone_contract() {
        let mut s = store(ElementType::String, 3, 2);
        s.set_value_at(5, &ChannelValue::String("last".into())).unwrap();
        s.set_mode(Mode::Permanent).unwrap();
        s.set_locked(true).unwrap();

        let c = s.clone();
        assert_eq!(c.element_type(), ElementType::String);
        assert_eq!(c.count(), 3);
        assert_eq!(c.item_length(), 2);
        assert!(c.is_locked());
        assert_eq!(c.state(), ChannelState::Initialized);
        assert_eq!(c.value_at(5), Some(ChannelValue::String("last".into())));
        assert_eq!(c.data::<String>(), s.data::<String>());
    }

    #[test]
    fn test_clone_of_broken_reference_copies_nothing() {
        let mut s = store(ElementType::Integer, 3, 1);
        s.set_reference("missing").unwrap();
        s.update(attached(), UpdateMode::OnChange);
        let c = s.clone();
        assert_eq!(c.count(), 0);
        assert_eq!(c.storage_len(), 0);
    }

    #[test]
    fn test_editability() {
        let mut s = ChannelStore::new();
        assert!(!s.is_editable(Attribute::Count));
        assert!(!s.is_editable(Attribute::State));
        assert!(!s.is_editable(Attribute::Frame));
        assert!(s.is_editable(Attribute::FrameOffset));
        assert!(!s.is_editable(Attribute::Locked));

        s.set_type_code(ElementType::Integer.code()).unwrap();
        assert!(s.is_editable(Attribute::Count));
        s.set_reference("A").unwrap();
        assert!(!s.is_editable(Attribute::Count));

        s.set_mode(Mode::Permanent).unwrap();
        assert!(s.is_editable(Attribute::Locked));
        s.set_locked(true).unwrap();
        assert!(!s.is_editable(Attribute::Type));
        assert!(!s.is_editable(Attribute::Reinitialize));
    }

    #[test]
    fn test_memory_info() {
        let s = store(ElementType::Integer, 10_000, 1);
        assert_eq!(s.alloc_bytes(), 40_960);
        assert_eq!(s.memory_info(), "DynamicArray(type=integer, count=10000, alloc_bytes=40960)");
        assert_eq!(s.default_value(), ChannelValue::Integer(0));
    }
}
