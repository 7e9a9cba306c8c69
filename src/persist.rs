//! Binary persistence of channels and nodes.
//!
//! All fields are little-endian: `i32`/`u32`/`f32` as 4 bytes, `bool` as one
//! byte, strings as a `u32` byte length followed by UTF-8.
//!
//! Channel layout:
//!
//! ```text
//! mode i32, type i32, count i32, item_length i32, frame_count i32,
//! frame i32, sync_frame bool, frame_offset i32, reference string,
//! [payload: count * item_length * frame_count elements, Permanent only]
//! ```
//!
//! Node file:
//!
//! ```text
//! b"CHNL", version u32, node id [16], node name string, channel count u32,
//! { channel id [16], channel name string, locked bool, defaults, channel layout }*
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{Affine3A, Vec3};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{Channel, ChannelStore, HostView, Mode, UpdateMode};
use crate::config::{ElementDefaults, FILE_MAGIC, FORMAT_VERSION, clamp_item_length};
use crate::element::{ChannelValue, ElementType};
use crate::error::PersistError;
use crate::node::Node;

/// Writes primitive fields to a byte stream.
pub struct FieldWriter<W: Write> {
    inner: W,
}

impl<W: Write> FieldWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PersistError> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), PersistError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), PersistError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<(), PersistError> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), PersistError> {
        self.write_bytes(&[u8::from(v)])
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), PersistError> {
        self.write_u32(to_u32("string length", s.len())?)?;
        self.write_bytes(s.as_bytes())
    }

    /// `usize` field stored as `i32`.
    pub fn write_len(&mut self, field: &'static str, v: usize) -> Result<(), PersistError> {
        let v = i32::try_from(v).map_err(|_| overflow(field, v))?;
        self.write_i32(v)
    }

    pub fn write_vec3(&mut self, v: Vec3) -> Result<(), PersistError> {
        v.to_array().into_iter().try_for_each(|x| self.write_f32(x))
    }

    pub fn write_matrix(&mut self, m: &Affine3A) -> Result<(), PersistError> {
        m.to_cols_array().into_iter().try_for_each(|x| self.write_f32(x))
    }

    /// Element payload. `Nil` has no encoding and writes nothing.
    pub fn write_value(&mut self, value: &ChannelValue) -> Result<(), PersistError> {
        match value {
            ChannelValue::Nil => Ok(()),
            ChannelValue::Integer(v) => self.write_i32(*v),
            ChannelValue::Float(v) => self.write_f32(*v),
            ChannelValue::Vector(v) => self.write_vec3(*v),
            ChannelValue::Matrix(m) => self.write_matrix(m),
            ChannelValue::String(s) => self.write_string(s),
        }
    }

    pub fn flush(&mut self) -> Result<(), PersistError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Reads primitive fields from a byte stream.
pub struct FieldReader<R: Read> {
    inner: R,
}

impl<R: Read> FieldReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PersistError> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_i32(&mut self) -> Result<i32, PersistError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, PersistError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, PersistError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, PersistError> {
        let [b] = self.read_array::<1>()?;
        Ok(b != 0)
    }

    pub fn read_string(&mut self) -> Result<String, PersistError> {
        let len = self.read_u32()? as usize;
        let mut buf = Vec::new();
        // Bounded read: a corrupt length fails with EOF instead of a huge allocation.
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        String::from_utf8(buf).map_err(|_| PersistError::InvalidUtf8)
    }

    /// `i32` field that must not be negative.
    pub fn read_len(&mut self, field: &'static str) -> Result<usize, PersistError> {
        let v = self.read_i32()?;
        usize::try_from(v).map_err(|_| PersistError::Overflow {
            field,
            value: i64::from(v),
        })
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, PersistError> {
        Ok(Uuid::from_bytes(self.read_array()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, PersistError> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_matrix(&mut self) -> Result<Affine3A, PersistError> {
        let mut cols = [0f32; 12];
        for c in &mut cols {
            *c = self.read_f32()?;
        }
        Ok(Affine3A::from_cols_array(&cols))
    }

    /// One element of type `ty`. `Nil` and `None` read nothing.
    pub fn read_value(&mut self, ty: Option<ElementType>) -> Result<ChannelValue, PersistError> {
        Ok(match ty {
            None | Some(ElementType::Nil) => ChannelValue::Nil,
            Some(ElementType::Integer) => ChannelValue::Integer(self.read_i32()?),
            Some(ElementType::Float) => ChannelValue::Float(self.read_f32()?),
            Some(ElementType::Vector) => ChannelValue::Vector(self.read_vec3()?),
            Some(ElementType::Matrix) => ChannelValue::Matrix(self.read_matrix()?),
            Some(ElementType::String) => ChannelValue::String(self.read_string()?),
        })
    }
}

fn overflow(field: &'static str, v: usize) -> PersistError {
    PersistError::Overflow {
        field,
        value: i64::try_from(v).unwrap_or(i64::MAX),
    }
}

fn to_u32(field: &'static str, v: usize) -> Result<u32, PersistError> {
    u32::try_from(v).map_err(|_| overflow(field, v))
}

// === Channel layout ===

impl ChannelStore {
    /// Write the channel layout. Elements follow only in Permanent mode;
    /// slots that cannot be read are written as the type's default.
    pub fn write_to<W: Write>(&self, w: &mut FieldWriter<W>) -> Result<(), PersistError> {
        w.write_i32(self.mode.code())?;
        w.write_i32(self.data_code)?;
        w.write_len("count", self.count)?;
        w.write_len("item_length", self.item_length)?;
        w.write_len("frame_count", self.frame_count)?;
        w.write_i32(self.frame)?;
        w.write_bool(self.sync_frame)?;
        w.write_i32(self.frame_offset)?;
        w.write_string(&self.reference)?;

        if self.mode == Mode::Permanent {
            let total = self.total_len().ok_or_else(|| overflow("payload", usize::MAX))?;
            if total > 0 && ElementType::from_code(self.data_code).is_none() {
                return Err(PersistError::UnsupportedType(self.data_code));
            }
            let fill = self.default_value();
            for index in 0..total {
                match self.value_at(index) {
                    Some(value) => w.write_value(&value)?,
                    None => w.write_value(&fill)?,
                }
            }
        }
        Ok(())
    }

    /// Read a channel layout into a fresh store using `defaults` as fill.
    ///
    /// Reference resolution is deferred: the persisted count is kept until
    /// the owning node re-validates. Any read failure aborts the whole
    /// channel.
    pub fn read_from<R: Read>(
        r: &mut FieldReader<R>,
        defaults: ElementDefaults,
    ) -> Result<ChannelStore, PersistError> {
        let mut store = ChannelStore {
            defaults,
            ..ChannelStore::default()
        };
        store.mode = Mode::from_code(r.read_i32()?);
        store.type_code = r.read_i32()?;
        store.count = r.read_len("count")?;
        store.item_length = clamp_item_length(i64::from(r.read_i32()?));
        store.frame_count = r.read_len("frame_count")?.max(1);
        store.frame = r.read_i32()?;
        store.sync_frame = r.read_bool()?;
        store.frame_offset = r.read_i32()?;
        store.reference = r.read_string()?;
        store.update(HostView::Deferred, UpdateMode::Silent);

        if store.mode == Mode::Permanent {
            let total = store.total_len().ok_or_else(|| overflow("payload", usize::MAX))?;
            let ty = ElementType::from_code(store.data_code);
            if total > 0 && ty.is_none() {
                return Err(PersistError::UnsupportedType(store.data_code));
            }
            for index in 0..total {
                let value = r.read_value(ty)?;
                if let Err(e) = store.data.set_value_at(index, &value) {
                    if index == 0 {
                        warn!("dropping persisted elements: {}", e);
                    }
                }
            }
        }
        Ok(store)
    }
}

/// Channel layout of a single store, for callers that manage their own
/// framing.
pub fn write_channel<W: Write>(store: &ChannelStore, out: W) -> Result<W, PersistError> {
    let mut w = FieldWriter::new(out);
    store.write_to(&mut w)?;
    Ok(w.into_inner())
}

pub fn read_channel<R: Read>(input: R) -> Result<ChannelStore, PersistError> {
    ChannelStore::read_from(&mut FieldReader::new(input), ElementDefaults::default())
}

// === Node file ===

fn write_defaults<W: Write>(w: &mut FieldWriter<W>, d: &ElementDefaults) -> Result<(), PersistError> {
    w.write_i32(d.integer)?;
    w.write_f32(d.float)?;
    w.write_vec3(d.vector)?;
    w.write_matrix(&d.matrix)?;
    w.write_string(&d.string)
}

fn read_defaults<R: Read>(r: &mut FieldReader<R>) -> Result<ElementDefaults, PersistError> {
    Ok(ElementDefaults {
        integer: r.read_i32()?,
        float: r.read_f32()?,
        vector: r.read_vec3()?,
        matrix: r.read_matrix()?,
        string: r.read_string()?,
    })
}

/// Write a whole node: header, then every channel in chain order.
pub fn write_node<W: Write>(node: &Node, out: W) -> Result<W, PersistError> {
    let mut w = FieldWriter::new(out);
    w.write_bytes(FILE_MAGIC)?;
    w.write_u32(FORMAT_VERSION)?;
    w.write_bytes(node.uuid().as_bytes())?;
    w.write_string(node.name())?;
    w.write_u32(to_u32("channel count", node.len())?)?;
    for channel in node.channels() {
        w.write_bytes(channel.uuid().as_bytes())?;
        w.write_string(channel.name())?;
        w.write_bool(channel.is_locked())?;
        write_defaults(&mut w, channel.store().defaults())?;
        channel.store().write_to(&mut w)?;
    }
    w.flush()?;
    Ok(w.into_inner())
}

/// Read a node and re-validate all channels once the chain is complete,
/// so references may point at channels stored after them.
pub fn read_node<R: Read>(input: R) -> Result<Node, PersistError> {
    let mut r = FieldReader::new(input);
    let magic: [u8; 4] = r.read_array()?;
    if &magic != FILE_MAGIC {
        return Err(PersistError::BadMagic);
    }
    let version = r.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }
    let mut node = Node::with_id(r.read_uuid()?, r.read_string()?);
    let count = r.read_u32()?;
    for _ in 0..count {
        let id = r.read_uuid()?;
        let name = r.read_string()?;
        let locked = r.read_bool()?;
        let defaults = read_defaults(&mut r)?;
        let mut store = ChannelStore::read_from(&mut r, defaults)?;
        store.locked = locked && store.mode == Mode::Permanent;
        debug!("loaded channel '{}' ({})", name, store.memory_info());
        node.push_loaded(Channel::from_parts(id, name, store));
    }
    node.revalidate();
    Ok(node)
}

pub fn save_node(node: &Node, path: &Path) -> Result<(), PersistError> {
    let file = File::create(path)?;
    write_node(node, BufWriter::new(file))?;
    info!("saved node '{}' to {}", node.name(), path.display());
    Ok(())
}

pub fn load_node(path: &Path) -> Result<Node, PersistError> {
    let file = File::open(path)?;
    let node = read_node(BufReader::new(file))?;
    info!("loaded node '{}' ({} channels) from {}", node.name(), node.len(), path.display());
    Ok(node)
}
