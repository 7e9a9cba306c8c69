//! Channel facade.
//!
//! A [`Channel`] is a named [`ChannelStore`] with a stable id. Reading goes
//! through the channel directly; every write goes through
//! [`ChannelMut`](crate::node::ChannelMut) so the owning node can re-validate
//! and notify the siblings.

pub mod message;
pub mod store;

use uuid::Uuid;

pub use message::ChannelMessage;
pub use store::{Attribute, ChannelState, ChannelStore, HostView, Mode, ReferenceInfo, UpdateMode};

use crate::address::Address;
use crate::element::{ChannelValue, Element, ElementType};
use crate::error::ChannelError;

#[derive(Debug, Clone)]
pub struct Channel {
    id: Uuid,
    name: String,
    store: ChannelStore,
}

impl Channel {
    /// Empty detached channel (`Nil`, count 0).
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            store: ChannelStore::new(),
        }
    }

    pub(crate) fn from_parts(id: Uuid, name: String, store: ChannelStore) -> Self {
        Self { id, name, store }
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_uuid(&mut self, id: Uuid) {
        self.id = id;
    }

    /// Full attribute and storage state.
    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ChannelStore {
        &mut self.store
    }

    pub fn state(&self) -> ChannelState {
        self.store.state()
    }

    pub fn element_type(&self) -> ElementType {
        self.store.element_type()
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn item_length(&self) -> usize {
        self.store.item_length()
    }

    pub fn frame_count(&self) -> usize {
        self.store.frame_count()
    }

    pub fn frame(&self) -> i32 {
        self.store.frame()
    }

    pub fn mode(&self) -> Mode {
        self.store.mode()
    }

    pub fn is_locked(&self) -> bool {
        self.store.is_locked()
    }

    pub fn reference(&self) -> &str {
        self.store.reference()
    }

    pub fn dirty_count(&self) -> u32 {
        self.store.dirty_count()
    }

    /// True if the channel has exactly this type and item length.
    pub fn check(&self, ty: ElementType, item_length: usize) -> bool {
        self.store.type_code() == ty.code() && self.store.item_length() == item_length
    }

    /// Name and optional type / item-length filter used by sibling lookup.
    pub(crate) fn matches(&self, name: &str, ty: Option<ElementType>, item_length: Option<usize>) -> bool {
        self.name == name
            && ty.is_none_or(|t| self.store.type_code() == t.code())
            && item_length.is_none_or(|il| self.store.item_length() == il)
    }

    /// Typed view of every element of every frame.
    pub fn data<T: Element>(&self) -> Option<&[T]> {
        self.store.data::<T>()
    }

    /// Typed view of the current frame window.
    pub fn frame_data<T: Element>(&self) -> Option<&[T]> {
        self.store.frame_data::<T>()
    }

    /// Element at `address` in the current frame.
    pub fn get(&self, address: &Address) -> Result<ChannelValue, ChannelError> {
        self.store.get_element(address)
    }

    /// Element `(element, sub_item)` in the current frame.
    pub fn get_item(&self, element: usize, sub_item: usize) -> Result<ChannelValue, ChannelError> {
        self.get(&Address::element(element, sub_item))
    }

    pub fn is_editable(&self, attr: Attribute) -> bool {
        self.store.is_editable(attr)
    }

    pub fn memory_info(&self) -> String {
        self.store.memory_info()
    }
}
