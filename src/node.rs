//! Node: the owner of a sibling chain of channels.
//!
//! Channels attached to the same node find each other by name and are
//! notified through a flood broadcast whenever one of them changes size.
//! The chain is an ordered `Vec<Channel>`; lookups and broadcasts work on
//! indices so no channel ever holds a pointer to another.
//!
//! Broadcast order follows the chain: predecessors (nearest first), then
//! successors. A channel that is in the middle of its own validation pass
//! ignores size notifications, which also stops ping-pong between channels
//! that reference each other.

use log::{debug, trace};
use uuid::Uuid;

use crate::address::Address;
use crate::channel::{
    Channel, ChannelMessage, ChannelStore, HostView, Mode, ReferenceInfo, UpdateMode,
};
use crate::config::ElementDefaults;
use crate::element::{ChannelValue, Element, ElementType};
use crate::error::ChannelError;

#[derive(Debug, Clone)]
pub struct Node {
    id: Uuid,
    name: String,
    channels: Vec<Channel>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Channels in chain order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, id: Uuid) -> Option<&Channel> {
        self.channels.iter().find(|c| c.uuid() == id)
    }

    /// First channel named `name` in chain order.
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    fn index_of(&self, id: Uuid) -> Result<usize, ChannelError> {
        self.channels
            .iter()
            .position(|c| c.uuid() == id)
            .ok_or_else(|| ChannelError::NotFound(id.to_string()))
    }

    // === Attach / detach ===

    /// Append `channel` to the chain and validate it. Returns its id.
    pub fn attach(&mut self, channel: Channel) -> Uuid {
        let id = channel.uuid();
        debug!("attach channel '{}' to node '{}'", channel.name(), self.name);
        self.channels.push(channel);
        self.update_channel(self.channels.len() - 1, UpdateMode::OnChange);
        id
    }

    /// Remove a channel from the chain. The returned channel is flushed and
    /// in the `Unknown` state; the remaining channels are notified.
    pub fn detach(&mut self, id: Uuid) -> Result<Channel, ChannelError> {
        let index = self.index_of(id)?;
        let mut channel = self.channels.remove(index);
        debug!("detach channel '{}' from node '{}'", channel.name(), self.name);
        if channel.store_mut().update(HostView::Detached, UpdateMode::OnChange) {
            for i in 0..self.channels.len() {
                self.deliver(i, ChannelMessage::SizeChanged);
            }
        }
        Ok(channel)
    }

    /// Attach a copy of a channel under a new id, right after the end of
    /// the chain.
    pub fn duplicate(&mut self, id: Uuid) -> Result<Uuid, ChannelError> {
        let index = self.index_of(id)?;
        let mut copy = self.channels[index].clone();
        copy.set_uuid(Uuid::new_v4());
        Ok(self.attach(copy))
    }

    // === Lookup ===

    /// Search the chain starting at `from`: predecessors first (nearest
    /// first), then `from` itself and its successors.
    fn find_index(
        &self,
        from: usize,
        name: &str,
        ty: Option<ElementType>,
        item_length: Option<usize>,
    ) -> Option<usize> {
        let from = from.min(self.channels.len());
        (0..from)
            .rev()
            .chain(from..self.channels.len())
            .find(|&i| self.channels[i].matches(name, ty, item_length))
    }

    /// Find a sibling of channel `from` by name, optionally filtered by
    /// type and item length. `from` itself may match.
    pub fn find(
        &self,
        from: Uuid,
        name: &str,
        ty: Option<ElementType>,
        item_length: Option<usize>,
    ) -> Option<&Channel> {
        let from = self.index_of(from).ok()?;
        self.find_index(from, name, ty, item_length)
            .map(|i| &self.channels[i])
    }

    /// Channel the reference name of `id` currently resolves to.
    pub fn reference_target(&self, id: Uuid) -> Option<&Channel> {
        let index = self.index_of(id).ok()?;
        let reference = self.channels[index].reference();
        if reference.is_empty() {
            return None;
        }
        self.find_index(index, reference, None, None)
            .map(|i| &self.channels[i])
    }

    fn host_view(&self, index: usize) -> HostView {
        let reference = self.channels[index].reference();
        if reference.is_empty() {
            return HostView::Attached { reference: None };
        }
        let info = self.find_index(index, reference, None, None).map(|i| {
            let target = &self.channels[i];
            ReferenceInfo {
                state: target.state(),
                count: target.count(),
            }
        });
        HostView::Attached { reference: info }
    }

    // === Validation and messaging ===

    /// Validate one channel and broadcast if it changed.
    fn update_channel(&mut self, index: usize, mode: UpdateMode) -> bool {
        if self.channels[index].store().updating {
            trace!("channel '{}' already updating", self.channels[index].name());
            return false;
        }
        let host = self.host_view(index);
        let store = self.channels[index].store_mut();
        store.updating = true;
        let notify = store.update(host, mode);
        if notify {
            self.broadcast(index, ChannelMessage::SizeChanged);
        }
        self.channels[index].store_mut().updating = false;
        notify
    }

    /// Deliver `message` to every channel but `from`.
    fn broadcast(&mut self, from: usize, message: ChannelMessage) {
        debug!(
            "broadcast {} from '{}' to {} siblings",
            message,
            self.channels[from].name(),
            self.channels.len() - 1
        );
        let targets: Vec<usize> = (0..from).rev().chain(from + 1..self.channels.len()).collect();
        for i in targets {
            self.deliver(i, message);
        }
    }

    fn deliver(&mut self, index: usize, message: ChannelMessage) {
        match message {
            ChannelMessage::Changed => self.channels[index].store_mut().touch(),
            ChannelMessage::SizeChanged => {
                self.update_channel(index, UpdateMode::OnChange);
            }
            ChannelMessage::Reinitialize => {
                if self.channels[index].is_locked() {
                    debug!("reinitialize ignored on locked channel '{}'", self.channels[index].name());
                    return;
                }
                self.channels[index].store_mut().flush(false);
                self.update_channel(index, UpdateMode::OnChange);
            }
        }
    }

    /// Send a notification to one channel.
    pub fn send(&mut self, id: Uuid, message: ChannelMessage) -> Result<(), ChannelError> {
        let index = self.index_of(id)?;
        self.deliver(index, message);
        Ok(())
    }

    /// Re-run validation on every channel in chain order.
    pub fn revalidate(&mut self) {
        for i in 0..self.channels.len() {
            self.update_channel(i, UpdateMode::OnChange);
        }
    }

    /// Execution pass: frame-synced channels follow `time`. A channel whose
    /// frame moved counts as changed.
    pub fn execute(&mut self, time: i32) {
        for channel in &mut self.channels {
            if channel.store_mut().sync_to(time) {
                trace!("channel '{}' now at frame {}", channel.name(), channel.frame());
            }
        }
    }

    // === Mutation ===

    pub fn channel_mut(&mut self, id: Uuid) -> Result<ChannelMut<'_>, ChannelError> {
        let index = self.index_of(id)?;
        Ok(ChannelMut { node: self, index })
    }

    /// Mutable facade of the first channel named `name`.
    pub fn channel_mut_by_name(&mut self, name: &str) -> Result<ChannelMut<'_>, ChannelError> {
        let index = self
            .channels
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| ChannelError::NotFound(name.to_string()))?;
        Ok(ChannelMut { node: self, index })
    }

    /// Append an already populated channel without validating it.
    pub(crate) fn push_loaded(&mut self, channel: Channel) {
        self.channels.push(channel);
    }
}

/// Write access to one channel of a node.
///
/// Size-relevant setters re-validate the channel and notify its siblings.
/// Every setter fails with [`ChannelError::Locked`] on a locked channel,
/// except `set_locked`, the frame controls and `touch`.
pub struct ChannelMut<'a> {
    node: &'a mut Node,
    index: usize,
}

impl ChannelMut<'_> {
    pub fn channel(&self) -> &Channel {
        &self.node.channels[self.index]
    }

    fn store(&mut self) -> &mut ChannelStore {
        self.node.channels[self.index].store_mut()
    }

    /// Re-run validation on demand. Returns whether siblings were notified.
    pub fn update(&mut self, mode: UpdateMode) -> bool {
        self.node.update_channel(self.index, mode)
    }

    fn update_if(&mut self, changed: bool) {
        if changed {
            self.update(UpdateMode::Force);
        }
    }

    fn touch_if(&mut self, changed: bool) {
        if changed {
            self.store().touch();
        }
    }

    pub fn set_type(&mut self, ty: ElementType) -> Result<(), ChannelError> {
        self.set_type_code(ty.code())
    }

    /// Raw type code. Unsupported codes put the channel in `TypeError`.
    pub fn set_type_code(&mut self, code: i32) -> Result<(), ChannelError> {
        self.store().set_type_code(code)?;
        self.update(UpdateMode::OnChange);
        Ok(())
    }

    pub fn set_count(&mut self, count: usize) -> Result<(), ChannelError> {
        let changed = self.store().set_count(count)?;
        self.update_if(changed);
        Ok(())
    }

    /// Clamped into `[1, MAX_ITEM_LENGTH]`.
    pub fn set_item_length(&mut self, item_length: usize) -> Result<(), ChannelError> {
        let changed = self.store().set_item_length(item_length)?;
        self.update_if(changed);
        Ok(())
    }

    /// At least 1.
    pub fn set_frame_count(&mut self, frame_count: usize) -> Result<(), ChannelError> {
        let changed = self.store().set_frame_count(frame_count)?;
        self.update_if(changed);
        Ok(())
    }

    /// Mirror the count of the named sibling. Empty clears the reference.
    pub fn set_reference(&mut self, name: &str) -> Result<(), ChannelError> {
        let changed = self.store().set_reference(name)?;
        self.update_if(changed);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), ChannelError> {
        let changed = self.store().set_mode(mode)?;
        self.touch_if(changed);
        Ok(())
    }

    pub fn set_locked(&mut self, locked: bool) -> Result<(), ChannelError> {
        let changed = self.store().set_locked(locked)?;
        self.touch_if(changed);
        Ok(())
    }

    /// Rejected while the frame is synced.
    pub fn set_frame(&mut self, frame: i32) -> Result<(), ChannelError> {
        let changed = self.store().set_frame(frame)?;
        self.touch_if(changed);
        Ok(())
    }

    pub fn set_sync_frame(&mut self, sync: bool) {
        let changed = self.store().set_sync_frame(sync);
        self.touch_if(changed);
    }

    pub fn set_frame_offset(&mut self, offset: i32) {
        let changed = self.store().set_frame_offset(offset);
        self.touch_if(changed);
    }

    /// Replace all fill values. Existing elements keep their values.
    pub fn set_defaults(&mut self, defaults: ElementDefaults) {
        let changed = self.store().set_defaults(defaults);
        self.touch_if(changed);
    }

    /// Replace the fill value of one type.
    pub fn set_default(&mut self, value: ChannelValue) {
        let mut defaults = self.channel().store().defaults().clone();
        defaults.set_value(value);
        self.set_defaults(defaults);
    }

    /// Rename the channel. Siblings re-resolve their references.
    pub fn rename(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.channel().name() == name {
            return;
        }
        self.node.channels[self.index].set_name(name);
        self.store().touch();
        self.node.broadcast(self.index, ChannelMessage::SizeChanged);
    }

    /// Write the element at `address` in the current frame.
    pub fn set(&mut self, address: &Address, value: &ChannelValue) -> Result<(), ChannelError> {
        self.store().set_element(address, value)
    }

    pub fn set_item(&mut self, element: usize, sub_item: usize, value: &ChannelValue) -> Result<(), ChannelError> {
        self.set(&Address::element(element, sub_item), value)
    }

    /// Write by flat storage index.
    pub fn set_value_at(&mut self, index: usize, value: &ChannelValue) -> Result<(), ChannelError> {
        self.store().set_value_at(index, value)
    }

    /// Mutable typed view of the whole storage.
    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T], ChannelError> {
        self.store().data_mut::<T>()
    }

    /// Drop all elements and refill them with the defaults.
    pub fn reinitialize(&mut self) {
        self.node.deliver(self.index, ChannelMessage::Reinitialize);
    }

    /// Record an external change (bumps the dirty count only).
    pub fn touch(&mut self) {
        self.node.deliver(self.index, ChannelMessage::Changed);
    }
}
