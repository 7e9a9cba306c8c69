//! JSON snapshots of a node.
//!
//! A snapshot carries every channel attribute and, for Permanent channels,
//! the flat element list. Importing a snapshot rebuilds the node the same
//! way a binary load does: channels first, then one validation pass over
//! the chain.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::{Channel, ChannelState, ChannelStore, HostView, Mode, UpdateMode};
use crate::config::{ElementDefaults, clamp_item_length};
use crate::element::ChannelValue;
use crate::error::{ChannelError, PersistError};
use crate::node::Node;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub channels: Vec<ChannelSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub locked: bool,
    /// Raw type code (see `ElementType::code`).
    #[serde(default)]
    pub type_code: i32,
    #[serde(default)]
    pub count: usize,
    #[serde(default = "one")]
    pub item_length: usize,
    #[serde(default = "one")]
    pub frame_count: usize,
    #[serde(default)]
    pub frame: i32,
    #[serde(default = "yes")]
    pub sync_frame: bool,
    #[serde(default)]
    pub frame_offset: i32,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub defaults: ElementDefaults,
    /// Informational; recomputed on import.
    #[serde(default, skip_deserializing)]
    pub state: ChannelState,
    /// Flat elements, Permanent channels only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<ChannelValue>>,
}

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

impl ChannelSnapshot {
    pub fn from_channel(channel: &Channel) -> Self {
        let store = channel.store();
        let elements = (store.mode() == Mode::Permanent).then(|| {
            (0..store.storage_len())
                .filter_map(|i| store.value_at(i))
                .collect()
        });
        Self {
            id: channel.uuid(),
            name: channel.name().to_string(),
            mode: store.mode(),
            locked: store.is_locked(),
            type_code: store.type_code(),
            count: store.count(),
            item_length: store.item_length(),
            frame_count: store.frame_count(),
            frame: store.frame(),
            sync_frame: store.sync_frame(),
            frame_offset: store.frame_offset(),
            reference: store.reference().to_string(),
            defaults: store.defaults().clone(),
            state: store.state(),
            elements,
        }
    }

    /// Build a detached channel. References stay unresolved until the
    /// channel is part of a node.
    pub fn to_channel(&self) -> Channel {
        let mut store = ChannelStore {
            mode: self.mode,
            type_code: self.type_code,
            count: self.count,
            item_length: clamp_item_length(i64::try_from(self.item_length).unwrap_or(i64::MAX)),
            frame_count: self.frame_count.max(1),
            frame: self.frame,
            sync_frame: self.sync_frame,
            frame_offset: self.frame_offset,
            reference: self.reference.clone(),
            defaults: self.defaults.clone(),
            ..ChannelStore::default()
        };
        store.update(HostView::Deferred, UpdateMode::Silent);
        if let Some(elements) = &self.elements {
            for (index, value) in elements.iter().enumerate() {
                if let Err(e) = store.data.set_value_at(index, value) {
                    warn!("channel '{}': dropping elements from {}: {}", self.name, index, e);
                    break;
                }
            }
        }
        store.locked = self.locked && self.mode == Mode::Permanent;
        Channel::from_parts(self.id, self.name.clone(), store)
    }
}

impl NodeSnapshot {
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.uuid(),
            name: node.name().to_string(),
            channels: node.channels().iter().map(ChannelSnapshot::from_channel).collect(),
        }
    }

    pub fn to_node(&self) -> Node {
        let mut node = Node::with_id(self.id, self.name.clone());
        for channel in &self.channels {
            node.push_loaded(channel.to_channel());
        }
        node.revalidate();
        node
    }

    pub fn to_string_pretty(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn parse(json: &str) -> Result<Self, ChannelError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save as pretty JSON. A missing `.json` extension is added.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ChannelError> {
        let json = self.to_string_pretty()?;
        let path = path.as_ref();
        let path = if path.extension().and_then(|s| s.to_str()) != Some("json") {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };
        fs::write(&path, json).map_err(PersistError::from)?;
        info!("snapshot of '{}' written to {}", self.name, path.display());
        Ok(())
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, ChannelError> {
        let json = fs::read_to_string(path.as_ref()).map_err(PersistError::from)?;
        Self::parse(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use glam::Vec3;

    fn sample() -> Node {
        let mut node = Node::new("cloud");
        let pos = node.attach(Channel::new("pos"));
        {
            let mut ch = node.channel_mut(pos).unwrap();
            ch.set_mode(Mode::Permanent).unwrap();
            ch.set_type(ElementType::Vector).unwrap();
            ch.set_count(2).unwrap();
            ch.set_item(1, 0, &ChannelValue::Vector(Vec3::new(1.0, 2.0, 3.0))).unwrap();
            ch.set_locked(true).unwrap();
        }
        let scale = node.attach(Channel::new("scale"));
        {
            let mut ch = node.channel_mut(scale).unwrap();
            ch.set_type(ElementType::Float).unwrap();
            ch.set_reference("pos").unwrap();
        }
        node
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let node = sample();
        let snap = NodeSnapshot::from_node(&node);
        let json = snap.to_string_pretty().unwrap();
        let back = NodeSnapshot::parse(&json).unwrap();
        assert_eq!(back.channels.len(), 2);
        // State is not read back.
        assert_eq!(back.channels[0].state, ChannelState::Uninitialized);

        let rebuilt = back.to_node();
        assert_eq!(rebuilt.uuid(), node.uuid());
        let pos = rebuilt.get("pos").unwrap();
        assert!(pos.is_locked());
        assert_eq!(pos.state(), ChannelState::Initialized);
        assert_eq!(pos.data::<Vec3>(), node.get("pos").unwrap().data::<Vec3>());

        let scale = rebuilt.get("scale").unwrap();
        assert_eq!(scale.count(), 2);
        assert_eq!(scale.state(), ChannelState::Initialized);
    }

    #[test]
    fn test_floating_elements_not_exported() {
        let node = sample();
        let snap = NodeSnapshot::from_node(&node);
        assert!(snap.channels[1].elements.is_none());
        assert_eq!(snap.channels[0].elements.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "name": "n",
            "channels": [
                { "id": "67e55044-10b1-426f-9247-bb680e5fe0c9", "name": "c",
                  "type_code": 1, "count": 3, "item_length": 99 }
            ]
        }"#;
        let node = NodeSnapshot::parse(json).unwrap().to_node();
        let ch = node.get("c").unwrap();
        assert_eq!(ch.item_length(), 16);
        assert_eq!(ch.frame_count(), 1);
        assert!(ch.store().sync_frame());
        assert_eq!(ch.data::<i32>().map(|d| d.len()), Some(48));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(NodeSnapshot::parse("{"), Err(ChannelError::Snapshot(_))));
    }
}
