//! Little-endian decoder for nested compound/sequence records.
//!
//! Types are built by [`crate::io::schema`] from an external description;
//! the decoder only knows leaf sizes and how sequence lengths are obtained.
//! Every read goes through a [`ByteSource`], so the same code decodes a
//! record buffer in memory, a file handle, or a windowed scan over a file.
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding records
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("Short read: {len} bytes at offset {offset} exceed source length {available}")]
    OutOfRange { offset: u64, len: usize, available: u64 },
    #[error("Member `{0}` cannot be used as a sequence count")]
    NotACount(String),
    #[error("Member index {index} out of range for compound `{compound}`")]
    NoSuchMember { compound: String, index: usize },
    #[error("Sequence element {index} out of range (length {len})")]
    NoSuchElement { index: usize, len: usize },
    #[error("Sequence length of `{0}` depends on a field outside its compound")]
    DetachedSequence(String),
}

/// Random-access byte provider
pub trait ByteSource {
    fn len(&self) -> u64;
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        let end = offset.checked_add(buf.len() as u64);
        match end {
            Some(end) if end <= <[u8]>::len(self) as u64 => {
                buf.copy_from_slice(&self[offset as usize..end as usize]);
                Ok(())
            }
            _ => Err(DecodeError::OutOfRange {
                offset,
                len: buf.len(),
                available: <[u8]>::len(self) as u64,
            }),
        }
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        self.as_slice().read_at(offset, buf)
    }
}

/// File handle shared by all readers of one product. Reads are serialized
/// through the mutex; independent products use independent handles.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        if offset.saturating_add(buf.len() as u64) > self.len {
            return Err(DecodeError::OutOfRange {
                offset,
                len: buf.len(),
                available: self.len,
            });
        }
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(buf))
            .map_err(|source| DecodeError::Io { offset, source })
    }
}

struct Window {
    start: u64,
    data: Vec<u8>,
}

/// Read-ahead window for sequential scans over a larger source.
pub struct WindowedSource<'a, S: ByteSource + ?Sized> {
    inner: &'a S,
    capacity: usize,
    window: RefCell<Window>,
}

impl<'a, S: ByteSource + ?Sized> WindowedSource<'a, S> {
    pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

    pub fn new(inner: &'a S) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: &'a S, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(64),
            window: RefCell::new(Window {
                start: 0,
                data: Vec::new(),
            }),
        }
    }
}

impl<S: ByteSource + ?Sized> ByteSource for WindowedSource<'_, S> {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        if buf.len() > self.capacity {
            return self.inner.read_at(offset, buf);
        }
        let mut window = self.window.borrow_mut();
        let end = offset + buf.len() as u64;
        let cached = offset >= window.start && end <= window.start + window.data.len() as u64;
        if !cached {
            let available = self.inner.len().saturating_sub(offset);
            if available < buf.len() as u64 {
                return Err(DecodeError::OutOfRange {
                    offset,
                    len: buf.len(),
                    available: self.inner.len(),
                });
            }
            let len = (self.capacity as u64).min(available) as usize;
            window.data.resize(len, 0);
            if let Err(e) = self.inner.read_at(offset, &mut window.data) {
                window.data.clear();
                return Err(e);
            }
            window.start = offset;
        }
        let from = (offset - window.start) as usize;
        buf.copy_from_slice(&window.data[from..from + buf.len()]);
        Ok(())
    }
}

/// Primitive member types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl LeafType {
    pub const fn size(self) -> usize {
        match self {
            LeafType::I8 | LeafType::U8 => 1,
            LeafType::I16 | LeafType::U16 => 2,
            LeafType::I32 | LeafType::U32 | LeafType::F32 => 4,
            LeafType::I64 | LeafType::U64 | LeafType::F64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, LeafType::F32 | LeafType::F64)
    }

    pub fn is_64bit_integer(self) -> bool {
        matches!(self, LeafType::I64 | LeafType::U64)
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "i8" => LeafType::I8,
            "u8" => LeafType::U8,
            "i16" => LeafType::I16,
            "u16" => LeafType::U16,
            "i32" => LeafType::I32,
            "u32" => LeafType::U32,
            "i64" => LeafType::I64,
            "u64" => LeafType::U64,
            "f32" => LeafType::F32,
            "f64" => LeafType::F64,
            _ => return None,
        })
    }
}

/// A decoded leaf value
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Value {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Decode from little-endian bytes; `bytes` holds at least `leaf.size()` bytes.
    pub fn decode(leaf: LeafType, bytes: &[u8]) -> Value {
        fn arr<const N: usize>(bytes: &[u8]) -> [u8; N] {
            let mut out = [0u8; N];
            out.copy_from_slice(&bytes[..N]);
            out
        }
        match leaf {
            LeafType::I8 => Value::I8(bytes[0] as i8),
            LeafType::U8 => Value::U8(bytes[0]),
            LeafType::I16 => Value::I16(i16::from_le_bytes(arr(bytes))),
            LeafType::U16 => Value::U16(u16::from_le_bytes(arr(bytes))),
            LeafType::I32 => Value::I32(i32::from_le_bytes(arr(bytes))),
            LeafType::U32 => Value::U32(u32::from_le_bytes(arr(bytes))),
            LeafType::I64 => Value::I64(i64::from_le_bytes(arr(bytes))),
            LeafType::U64 => Value::U64(u64::from_le_bytes(arr(bytes))),
            LeafType::F32 => Value::F32(f32::from_le_bytes(arr(bytes))),
            LeafType::F64 => Value::F64(f64::from_le_bytes(arr(bytes))),
        }
    }

    pub fn leaf_type(&self) -> LeafType {
        match self {
            Value::I8(_) => LeafType::I8,
            Value::U8(_) => LeafType::U8,
            Value::I16(_) => LeafType::I16,
            Value::U16(_) => LeafType::U16,
            Value::I32(_) => LeafType::I32,
            Value::U32(_) => LeafType::U32,
            Value::I64(_) => LeafType::I64,
            Value::U64(_) => LeafType::U64,
            Value::F32(_) => LeafType::F32,
            Value::F64(_) => LeafType::F64,
        }
    }

    /// Append the little-endian encoding.
    pub fn write_le(&self, out: &mut Vec<u8>) {
        match *self {
            Value::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U8(v) => out.push(v),
            Value::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Build an integer value of the given leaf type; `None` if it does not fit.
    pub fn integer(leaf: LeafType, v: u64) -> Option<Value> {
        Some(match leaf {
            LeafType::I8 => Value::I8(i8::try_from(v).ok()?),
            LeafType::U8 => Value::U8(u8::try_from(v).ok()?),
            LeafType::I16 => Value::I16(i16::try_from(v).ok()?),
            LeafType::U16 => Value::U16(u16::try_from(v).ok()?),
            LeafType::I32 => Value::I32(i32::try_from(v).ok()?),
            LeafType::U32 => Value::U32(u32::try_from(v).ok()?),
            LeafType::I64 => Value::I64(i64::try_from(v).ok()?),
            LeafType::U64 => Value::U64(v),
            LeafType::F32 | LeafType::F64 => return None,
        })
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::I8(v) => v as f64,
            Value::U8(v) => v as f64,
            Value::I16(v) => v as f64,
            Value::U16(v) => v as f64,
            Value::I32(v) => v as f64,
            Value::U32(v) => v as f64,
            Value::I64(v) => v as f64,
            Value::U64(v) => v as f64,
            Value::F32(v) => v as f64,
            Value::F64(v) => v,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::U8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U64(v) => i64::try_from(v).ok(),
            Value::F32(_) | Value::F64(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            Value::F32(_) | Value::F64(_) => None,
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Raw 64-bit pattern of an integer value (two's complement for signed).
    pub fn bits64(&self) -> Option<u64> {
        match *self {
            Value::I64(v) => Some(v as u64),
            Value::U64(v) => Some(v),
            Value::F32(_) | Value::F64(_) => None,
            other => other.as_i64().map(|v| v as u64),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Value::I8(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
        }
    }
}

/// Member or element type
#[derive(Debug, Clone)]
pub enum TypeRef {
    Leaf(LeafType),
    Compound(Arc<CompoundType>),
    Sequence(Arc<SequenceType>),
}

impl TypeRef {
    pub fn fixed_size(&self) -> Option<u64> {
        match self {
            TypeRef::Leaf(leaf) => Some(leaf.size() as u64),
            TypeRef::Compound(c) => c.fixed_size(),
            TypeRef::Sequence(s) => s.fixed_size(),
        }
    }

    pub fn as_leaf(&self) -> Option<LeafType> {
        match self {
            TypeRef::Leaf(leaf) => Some(*leaf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub ty: TypeRef,
}

/// How many elements a sequence holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqLength {
    Static(usize),
    /// Value of an earlier integer member of the enclosing compound
    Field(usize),
}

#[derive(Debug)]
pub struct SequenceType {
    pub element: TypeRef,
    pub length: SeqLength,
}

impl SequenceType {
    pub fn fixed_size(&self) -> Option<u64> {
        match self.length {
            SeqLength::Static(n) => self.element.fixed_size().map(|s| s * n as u64),
            SeqLength::Field(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct CompoundType {
    name: String,
    members: Vec<Member>,
    // offsets of members 0..=len while all previous members are fixed-size
    static_offsets: Vec<u64>,
}

impl CompoundType {
    pub fn new(name: impl Into<String>, members: Vec<Member>) -> Self {
        let mut static_offsets = vec![0u64];
        let mut pos = 0u64;
        for member in &members {
            match member.ty.fixed_size() {
                Some(size) => {
                    pos += size;
                    static_offsets.push(pos);
                }
                None => break,
            }
        }
        Self {
            name: name.into(),
            members,
            static_offsets,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    /// Offset of member `index` from the start of the compound, when it does
    /// not depend on data. `index == members().len()` gives the size.
    pub fn static_offset(&self, index: usize) -> Option<u64> {
        self.static_offsets.get(index).copied()
    }

    pub fn fixed_size(&self) -> Option<u64> {
        self.static_offset(self.members.len())
    }
}

/// Fully decoded value tree
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Leaf(Value),
    Compound(Vec<Datum>),
    Sequence(Vec<Datum>),
}

impl Datum {
    pub fn leaf(&self) -> Option<Value> {
        match self {
            Datum::Leaf(v) => Some(*v),
            _ => None,
        }
    }

    pub fn member(&self, index: usize) -> Option<&Datum> {
        match self {
            Datum::Compound(members) => members.get(index),
            _ => None,
        }
    }

    pub fn elements(&self) -> &[Datum] {
        match self {
            Datum::Sequence(items) => items,
            _ => &[],
        }
    }
}

/// Decoder over a byte source
pub struct Decoder<'a, S: ByteSource + ?Sized> {
    src: &'a S,
}

impl<'a, S: ByteSource + ?Sized> Decoder<'a, S> {
    pub fn new(src: &'a S) -> Self {
        Self { src }
    }

    pub fn source(&self) -> &'a S {
        self.src
    }

    pub fn read_value(&self, offset: u64, leaf: LeafType) -> Result<Value, DecodeError> {
        let mut buf = [0u8; 8];
        let n = leaf.size();
        self.src.read_at(offset, &mut buf[..n])?;
        Ok(Value::decode(leaf, &buf[..n]))
    }

    /// Size in bytes of a standalone type starting at `offset`.
    pub fn type_size(&self, offset: u64, ty: &TypeRef) -> Result<u64, DecodeError> {
        if let Some(size) = ty.fixed_size() {
            return Ok(size);
        }
        match ty {
            TypeRef::Leaf(leaf) => Ok(leaf.size() as u64),
            TypeRef::Compound(c) => self.compound_size(offset, c),
            TypeRef::Sequence(seq) => match seq.length {
                SeqLength::Static(n) => self.sequence_size(offset, seq, n),
                SeqLength::Field(_) => {
                    Err(DecodeError::DetachedSequence(format!("{:?}", seq.element)))
                }
            },
        }
    }

    pub fn compound_size(&self, offset: u64, compound: &CompoundType) -> Result<u64, DecodeError> {
        let end = self.member_offset(offset, compound, compound.members().len())?;
        Ok(end - offset)
    }

    /// Absolute offset of member `index` of the compound starting at `offset`.
    pub fn member_offset(
        &self,
        offset: u64,
        compound: &CompoundType,
        index: usize,
    ) -> Result<u64, DecodeError> {
        if index > compound.members().len() {
            return Err(DecodeError::NoSuchMember {
                compound: compound.name().to_string(),
                index,
            });
        }
        if let Some(rel) = compound.static_offset(index) {
            return Ok(offset + rel);
        }
        // walk from the first variable-size member
        let first_dynamic = compound.static_offsets.len() - 1;
        let mut pos = offset + compound.static_offsets[first_dynamic];
        for i in first_dynamic..index {
            pos += self.member_size(offset, compound, i, pos)?;
        }
        Ok(pos)
    }

    fn member_size(
        &self,
        compound_offset: u64,
        compound: &CompoundType,
        index: usize,
        pos: u64,
    ) -> Result<u64, DecodeError> {
        match &compound.members()[index].ty {
            TypeRef::Sequence(seq) => {
                let n = self.sequence_len(compound_offset, compound, seq)?;
                self.sequence_size(pos, seq, n)
            }
            ty => self.type_size(pos, ty),
        }
    }

    /// Number of elements of a sequence member of the compound at `compound_offset`.
    pub fn sequence_len(
        &self,
        compound_offset: u64,
        compound: &CompoundType,
        seq: &SequenceType,
    ) -> Result<usize, DecodeError> {
        match seq.length {
            SeqLength::Static(n) => Ok(n),
            SeqLength::Field(idx) => {
                let member = compound.member(idx).ok_or_else(|| DecodeError::NoSuchMember {
                    compound: compound.name().to_string(),
                    index: idx,
                })?;
                let leaf = member
                    .ty
                    .as_leaf()
                    .filter(|l| l.is_integer())
                    .ok_or_else(|| DecodeError::NotACount(member.name.clone()))?;
                let at = self.member_offset(compound_offset, compound, idx)?;
                let count = self.read_value(at, leaf)?;
                count
                    .as_u64()
                    .map(|n| n as usize)
                    .ok_or_else(|| DecodeError::NotACount(member.name.clone()))
            }
        }
    }

    /// Size of `count` elements starting at `pos`.
    pub fn sequence_size(
        &self,
        pos: u64,
        seq: &SequenceType,
        count: usize,
    ) -> Result<u64, DecodeError> {
        if let Some(size) = seq.element.fixed_size() {
            return Ok(size * count as u64);
        }
        let mut cursor = pos;
        for _ in 0..count {
            cursor += self.type_size(cursor, &seq.element)?;
        }
        Ok(cursor - pos)
    }

    /// Absolute offset of element `index` of a sequence starting at `pos`.
    pub fn element_offset(
        &self,
        pos: u64,
        seq: &SequenceType,
        count: usize,
        index: usize,
    ) -> Result<u64, DecodeError> {
        if index >= count {
            return Err(DecodeError::NoSuchElement { index, len: count });
        }
        match seq.element.fixed_size() {
            Some(size) => Ok(pos + size * index as u64),
            None => Ok(pos + self.sequence_size(pos, seq, index)?),
        }
    }

    /// Decode the full value tree of `ty` at `offset`.
    pub fn read_datum(&self, offset: u64, ty: &TypeRef) -> Result<Datum, DecodeError> {
        self.decode_at(offset, ty).map(|(datum, _)| datum)
    }

    fn decode_at(&self, offset: u64, ty: &TypeRef) -> Result<(Datum, u64), DecodeError> {
        match ty {
            TypeRef::Leaf(leaf) => {
                let value = self.read_value(offset, *leaf)?;
                Ok((Datum::Leaf(value), leaf.size() as u64))
            }
            TypeRef::Compound(c) => self.decode_compound(offset, c),
            TypeRef::Sequence(seq) => match seq.length {
                SeqLength::Static(n) => self.decode_sequence(offset, seq, n),
                SeqLength::Field(_) => {
                    Err(DecodeError::DetachedSequence(format!("{:?}", seq.element)))
                }
            },
        }
    }

    fn decode_compound(
        &self,
        offset: u64,
        compound: &CompoundType,
    ) -> Result<(Datum, u64), DecodeError> {
        let mut pos = offset;
        let mut values: Vec<Datum> = Vec::with_capacity(compound.members().len());
        for member in compound.members() {
            let (datum, size) = match &member.ty {
                TypeRef::Sequence(seq) => {
                    let count = match seq.length {
                        SeqLength::Static(n) => n,
                        SeqLength::Field(idx) => values
                            .get(idx)
                            .and_then(Datum::leaf)
                            .and_then(|v| v.as_u64())
                            .map(|n| n as usize)
                            .ok_or_else(|| DecodeError::NotACount(member.name.clone()))?,
                    };
                    self.decode_sequence(pos, seq, count)?
                }
                ty => self.decode_at(pos, ty)?,
            };
            values.push(datum);
            pos += size;
        }
        Ok((Datum::Compound(values), pos - offset))
    }

    fn decode_sequence(
        &self,
        offset: u64,
        seq: &SequenceType,
        count: usize,
    ) -> Result<(Datum, u64), DecodeError> {

        let mut pos = offset;
        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let (datum, size) = self.decode_at(pos, &seq.element)?;
            items.push(datum);
            pos += size;
        }
        Ok((Datum::Sequence(items), pos - offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation_type() -> Arc<CompoundType> {
        Arc::new(CompoundType::new(
            "Obs",
            vec![
                Member {
                    name: "Flags".into(),
                    ty: TypeRef::Leaf(LeafType::U16),
                },
                Member {
                    name: "Value".into(),
                    ty: TypeRef::Leaf(LeafType::F32),
                },
            ],
        ))
    }

    fn point_type() -> CompoundType {
        CompoundType::new(
            "Point",
            vec![
                Member {
                    name: "Id".into(),
                    ty: TypeRef::Leaf(LeafType::U32),
                },
                Member {
                    name: "Counter".into(),
                    ty: TypeRef::Leaf(LeafType::U8),
                },
                Member {
                    name: "Obs".into(),
                    ty: TypeRef::Sequence(Arc::new(SequenceType {
                        element: TypeRef::Compound(observation_type()),
                        length: SeqLength::Field(1),
                    })),
                },
                Member {
                    name: "Tail".into(),
                    ty: TypeRef::Leaf(LeafType::I16),
                },
            ],
        )
    }

    fn encode_point(id: u32, obs: &[(u16, f32)], tail: i16) -> Vec<u8> {
        let mut out = Vec::new();
        Value::U32(id).write_le(&mut out);
        Value::U8(obs.len() as u8).write_le(&mut out);
        for (flags, value) in obs {
            Value::U16(*flags).write_le(&mut out);
            Value::F32(*value).write_le(&mut out);
        }
        Value::I16(tail).write_le(&mut out);
        out
    }

    #[test]
    fn leaf_round_trip_at_offsets() {
        let values = [
            Value::I8(-7),
            Value::U8(250),
            Value::I16(-12345),
            Value::U16(54321),
            Value::I32(-2_000_000_000),
            Value::U32(4_000_000_000),
            Value::I64(-9_000_000_000_000_000_000),
            Value::U64(0x1122_3344_5566_7788),
            Value::F32(-273.15),
            Value::F64(std::f64::consts::PI),
            Value::F64(f64::from_bits(0x7FEF_FFFF_FFFF_FFFF)),
        ];
        for offset in [0usize, 1, 3, 7] {
            for v in values {
                let mut buf = vec![0xAAu8; offset];
                v.write_le(&mut buf);
                buf.extend_from_slice(&[0x55; 3]);
                let decoded = Decoder::new(&buf).read_value(offset as u64, v.leaf_type()).unwrap();
                assert_eq!(decoded, v, "offset {offset}");
            }
        }
    }

    #[test]
    fn split_64bit_field_halves() {
        let mut buf = vec![0u8; 5];
        Value::U64(0xDEAD_BEEF_0BAD_F00D).write_le(&mut buf);
        let dec = Decoder::new(&buf);
        assert_eq!(dec.read_value(5, LeafType::U32).unwrap(), Value::U32(0x0BAD_F00D));
        assert_eq!(dec.read_value(9, LeafType::U32).unwrap(), Value::U32(0xDEAD_BEEF));
        let full = dec.read_value(5, LeafType::U64).unwrap();
        assert_eq!(full.bits64(), Some(0xDEAD_BEEF_0BAD_F00D));
    }

    #[test]
    fn counted_sequence_offsets() {
        let point = point_type();
        assert_eq!(point.static_offset(2), Some(5));
        assert_eq!(point.static_offset(3), None);
        assert_eq!(point.fixed_size(), None);

        let buf = encode_point(42, &[(0, 1.5), (1, 2.5), (2, 3.5)], -9);
        let dec = Decoder::new(&buf);
        assert_eq!(dec.compound_size(0, &point).unwrap(), 4 + 1 + 3 * 6 + 2);
        let tail_at = dec.member_offset(0, &point, 3).unwrap();
        assert_eq!(dec.read_value(tail_at, LeafType::I16).unwrap(), Value::I16(-9));

        let TypeRef::Sequence(seq) = &point.members()[2].ty else {
            panic!("sequence expected")
        };
        let n = dec.sequence_len(0, &point, seq).unwrap();
        assert_eq!(n, 3);
        let second = dec.element_offset(5, seq, n, 1).unwrap();
        assert_eq!(dec.read_value(second + 2, LeafType::F32).unwrap(), Value::F32(2.5));
        assert!(matches!(
            dec.element_offset(5, seq, n, 3),
            Err(DecodeError::NoSuchElement { .. })
        ));
    }

    #[test]
    fn datum_tree_decode() {
        let point = Arc::new(point_type());
        let buf = encode_point(7, &[(3, 9.0)], 11);
        let datum = Decoder::new(&buf)
            .read_datum(0, &TypeRef::Compound(point))
            .unwrap();
        assert_eq!(datum.member(0).and_then(Datum::leaf), Some(Value::U32(7)));
        let obs = datum.member(2).unwrap().elements();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].member(1).and_then(Datum::leaf), Some(Value::F32(9.0)));
        assert_eq!(datum.member(3).and_then(Datum::leaf), Some(Value::I16(11)));
    }

    #[test]
    fn short_read_is_an_error() {
        let point = point_type();
        let mut buf = encode_point(1, &[(0, 1.0), (0, 2.0)], 0);
        buf.truncate(10);
        let dec = Decoder::new(&buf);
        // sizing reads only the counter: 4 + 1 + 2 * 6 + 2
        assert_eq!(dec.compound_size(0, &point).unwrap(), 19);
        let no_counter = &buf[..4];
        assert!(matches!(
            Decoder::new(no_counter).compound_size(0, &point),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            dec.read_datum(0, &TypeRef::Compound(Arc::new(point))),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            dec.read_value(9, LeafType::U32),
            Err(DecodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn windowed_source_matches_direct_reads() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let windowed = WindowedSource::with_capacity(&data, 64);
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        for offset in [0u64, 60, 500, 984] {
            windowed.read_at(offset, &mut a).unwrap();
            data.read_at(offset, &mut b).unwrap();
            assert_eq!(a, b);
        }
        assert!(windowed.read_at(990, &mut a).is_err());
    }
}
