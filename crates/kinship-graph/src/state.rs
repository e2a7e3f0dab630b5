//! Append-only binary state stream used by commands to snapshot what they
//! mutate.
//!
//! A [`BinaryState`] is a growable byte buffer with an independent read
//! cursor. Writers append; readers consume from the cursor in the same order
//! the values were written. Integers are little-endian, strings and blobs are
//! prefixed with a `u32` length, and component values are encoded with
//! `bincode`'s serde path.
//!
//! The format is stable only within one process's undo/redo session. It is not
//! an on-disk format.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::identity::Reference;
use crate::schema::TypeTag;
use crate::StructuralError;

const NONE_MARKER: u8 = 0;
const SOME_MARKER: u8 = 1;

/// A byte stream with separate write end and read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryState {
    bytes: Vec<u8>,
    read_pos: usize,
}

impl BinaryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of bytes written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes left between the read cursor and the end of the stream.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.read_pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Drop all content and reset the read cursor.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.read_pos = 0;
    }

    /// Move the read cursor back to the start of the stream.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    // -- writing ------------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a `usize` as `u32`. Row counts and list positions never exceed
    /// the slot space of an [`EntityId`](crate::entity::EntityId).
    pub fn write_len(&mut self, value: usize) {
        self.write_u32(value as u32);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_len(value.len());
        self.bytes.extend_from_slice(value);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write a reference, or the "none" sentinel.
    pub fn write_reference(&mut self, reference: Option<&Reference>) {
        match reference {
            None => self.write_u8(NONE_MARKER),
            Some(reference) => {
                self.write_u8(SOME_MARKER);
                self.write_u32(reference.type_tag.0);
                self.write_str(&reference.name);
            }
        }
    }

    /// Encode a serde value as a length-prefixed bincode blob.
    pub fn write_value<T: Serialize>(&mut self, value: &T) -> Result<(), StructuralError> {
        let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| StructuralError::CorruptState(format!("encode failed: {e}")))?;
        self.write_bytes(&encoded);
        Ok(())
    }

    // -- reading ------------------------------------------------------------

    fn take(&mut self, count: usize) -> Result<&[u8], StructuralError> {
        if self.remaining() < count {
            return Err(StructuralError::CorruptState(format!(
                "read of {count} bytes at offset {} overruns stream of {} bytes",
                self.read_pos,
                self.bytes.len()
            )));
        }
        let start = self.read_pos;
        self.read_pos += count;
        Ok(&self.bytes[start..self.read_pos])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], StructuralError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, StructuralError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, StructuralError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StructuralError::CorruptState(format!(
                "invalid bool byte {other}"
            ))),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, StructuralError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, StructuralError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_len(&mut self) -> Result<usize, StructuralError> {
        Ok(self.read_u32()? as usize)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, StructuralError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_str(&mut self) -> Result<String, StructuralError> {
        String::from_utf8(self.read_bytes()?)
            .map_err(|e| StructuralError::CorruptState(format!("invalid utf-8 name: {e}")))
    }

    pub fn read_reference(&mut self) -> Result<Option<Reference>, StructuralError> {
        match self.read_u8()? {
            NONE_MARKER => Ok(None),
            SOME_MARKER => {
                let type_tag = TypeTag(self.read_u32()?);
                let name = self.read_str()?;
                Ok(Some(Reference { type_tag, name }))
            }
            other => Err(StructuralError::CorruptState(format!(
                "invalid reference marker {other}"
            ))),
        }
    }

    /// Decode the next length-prefixed bincode blob.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> Result<T, StructuralError> {
        let blob = self.read_bytes()?;
        let (value, _) = bincode::serde::decode_from_slice(&blob, bincode::config::standard())
            .map_err(|e| StructuralError::CorruptState(format!("decode failed: {e}")))?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
