//! Dataset blocks and their binary format.
//!
//! A block is a big-endian header followed by the compressed payload:
//!
//! | field         | type           | present        |
//! |---------------|----------------|----------------|
//! | mode          | `i16`          | always         |
//! | rank          | `i32`          | always         |
//! | dimensions    | `i32[rank]`    | modes 0 and 1  |
//! | num_elements  | `i32`          | mode 1         |
//! | payload       | bytes          | always         |
use std::io::Read;

use bytes::{Buf, BufMut, Bytes};

use crate::codec::Compression;
use crate::metadata::{DataType, DatasetAttributes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Numeric block with as many elements as its dimensions describe.
    Default,
    /// Numeric block with an explicit element count.
    VarLen { num_elements: u32 },
    /// Object block, encoded by the data type's object codec.
    Object,
}

impl BlockMode {
    fn discriminant(&self) -> i16 {
        match self {
            BlockMode::Default => 0,
            BlockMode::VarLen { .. } => 1,
            BlockMode::Object => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub mode: BlockMode,
    pub rank: u32,
    /// Empty for object blocks.
    pub shape: Vec<u32>,
}

fn need(remaining: usize, n: usize, what: &str) -> crate::Result<()> {
    if remaining < n {
        return Err(crate::Error::format(format!(
            "block header truncated while reading {what}"
        )));
    }
    Ok(())
}

fn get_count(buf: &mut impl Buf, what: &str) -> crate::Result<u32> {
    need(buf.remaining(), size_of::<i32>(), what)?;
    let n = buf.get_i32();
    u32::try_from(n).map_err(|_| crate::Error::format(format!("negative {what} {n}")))
}

fn to_i32(n: u32, what: &str) -> crate::Result<i32> {
    i32::try_from(n)
        .map_err(|_| crate::Error::general(format!("{what} {n} does not fit in a block header")))
}

impl BlockHeader {
    pub fn read_from(buf: &mut impl Buf) -> crate::Result<Self> {
        need(buf.remaining(), size_of::<i16>(), "mode")?;
        let mode_num = buf.get_i16();
        let rank = get_count(buf, "rank")?;
        let with_shape = match mode_num {
            0 | 1 => true,
            2 => false,
            n => return Err(crate::Error::format(format!("invalid N5 block mode {n}"))),
        };
        let mut shape = Vec::new();
        if with_shape {
            shape.reserve((rank as usize).min(buf.remaining() / size_of::<i32>()));
            for _ in 0..rank {
                shape.push(get_count(buf, "dimension")?);
            }
        }
        let mode = match mode_num {
            0 => BlockMode::Default,
            1 => BlockMode::VarLen {
                num_elements: get_count(buf, "element count")?,
            },
            _ => BlockMode::Object,
        };
        Ok(BlockHeader { mode, rank, shape })
    }

    pub fn write_to(&self, out: &mut impl BufMut) -> crate::Result<()> {
        out.put_i16(self.mode.discriminant());
        out.put_i32(to_i32(self.rank, "rank")?);
        if !matches!(self.mode, BlockMode::Object) {
            for &d in &self.shape {
                out.put_i32(to_i32(d, "dimension")?);
            }
        }
        if let BlockMode::VarLen { num_elements } = self.mode {
            out.put_i32(to_i32(num_elements, "element count")?);
        }
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        size_of::<i16>()  // mode
            + size_of::<i32>() // rank
            + match self.mode {
                BlockMode::Default => self.shape.len() * size_of::<i32>(),
                BlockMode::VarLen { .. } => (self.shape.len() + 1) * size_of::<i32>(),
                BlockMode::Object => 0,
            }
    }
}

/// Numeric element types with a fixed big-endian encoding.
pub trait Element: Copy {
    const DATA_TYPE: DataType;

    fn put(self, out: &mut impl BufMut);

    fn get(buf: &mut impl Buf) -> Self;
}

macro_rules! impl_element {
    ($t:ty, $dt:ident, $put:ident, $get:ident) => {
        impl Element for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn put(self, out: &mut impl BufMut) {
                out.$put(self)
            }

            fn get(buf: &mut impl Buf) -> Self {
                buf.$get()
            }
        }
    };
}

impl_element!(u8, Uint8, put_u8, get_u8);
impl_element!(u16, Uint16, put_u16, get_u16);
impl_element!(u32, Uint32, put_u32, get_u32);
impl_element!(u64, Uint64, put_u64, get_u64);
impl_element!(i8, Int8, put_i8, get_i8);
impl_element!(i16, Int16, put_i16, get_i16);
impl_element!(i32, Int32, put_i32, get_i32);
impl_element!(i64, Int64, put_i64, get_i64);
impl_element!(f32, Float32, put_f32, get_f32);
impl_element!(f64, Float64, put_f64, get_f64);

#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    /// Big-endian element bytes.
    Numeric { data_type: DataType, bytes: Bytes },
    Strings(Vec<String>),
}

/// One block of a dataset, addressed by its position in the block grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    grid_position: Vec<u64>,
    size: Vec<u32>,
    data: BlockData,
}

impl DataBlock {
    /// A numeric block from raw big-endian element bytes.
    pub fn numeric(
        grid_position: Vec<u64>,
        size: Vec<u32>,
        data_type: DataType,
        bytes: impl Into<Bytes>,
    ) -> crate::Result<Self> {
        let bytes = bytes.into();
        let Some(el_size) = data_type.size() else {
            return Err(crate::Error::general(format!(
                "{data_type} blocks hold objects, not raw elements"
            )));
        };
        if bytes.len() % el_size != 0 {
            return Err(crate::Error::general(format!(
                "{} bytes is not a whole number of {data_type} elements",
                bytes.len()
            )));
        }
        Ok(Self {
            grid_position,
            size,
            data: BlockData::Numeric { data_type, bytes },
        })
    }

    pub fn from_elements<T: Element>(grid_position: Vec<u64>, size: Vec<u32>, elements: &[T]) -> Self {
        let mut bytes = Vec::with_capacity(size_of_val(elements));
        for &e in elements {
            e.put(&mut bytes);
        }
        Self {
            grid_position,
            size,
            data: BlockData::Numeric {
                data_type: T::DATA_TYPE,
                bytes: bytes.into(),
            },
        }
    }

    pub fn strings(grid_position: Vec<u64>, size: Vec<u32>, strings: Vec<String>) -> Self {
        Self {
            grid_position,
            size,
            data: BlockData::Strings(strings),
        }
    }

    pub fn grid_position(&self) -> &[u64] {
        &self.grid_position
    }

    pub fn size(&self) -> &[u32] {
        &self.size
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub fn num_elements(&self) -> usize {
        match &self.data {
            BlockData::Numeric { data_type, bytes } => {
                bytes.len() / data_type.size().unwrap_or(1)
            }
            BlockData::Strings(s) => s.len(),
        }
    }

    /// Decode the elements of a numeric block of type `T`.
    pub fn to_elements<T: Element>(&self) -> crate::Result<Vec<T>> {
        match &self.data {
            BlockData::Numeric { data_type, bytes } if *data_type == T::DATA_TYPE => {
                let mut buf = bytes.clone();
                let mut out = Vec::with_capacity(self.num_elements());
                while buf.has_remaining() {
                    out.push(T::get(&mut buf));
                }
                Ok(out)
            }
            BlockData::Numeric { data_type, .. } => Err(crate::Error::general(format!(
                "block holds {data_type}, not {}",
                T::DATA_TYPE
            ))),
            BlockData::Strings(_) => Err(crate::Error::general("block holds objects")),
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.data {
            BlockData::Strings(s) => Some(s),
            BlockData::Numeric { .. } => None,
        }
    }
}

/// Key of the block at `grid_position` within the dataset at `dataset_key`.
pub fn block_key(dataset_key: &str, grid_position: &[u64]) -> String {
    std::iter::once(dataset_key.trim_end_matches('/').to_owned())
        .chain(grid_position.iter().map(u64::to_string))
        .collect::<Vec<_>>()
        .join("/")
}

fn check_shape(attributes: &DatasetAttributes, shape: &[u32]) -> Result<(), String> {
    if shape.len() != attributes.rank() {
        return Err(format!(
            "block has rank {}, dataset has rank {}",
            shape.len(),
            attributes.rank()
        ));
    }
    if let Some((axis, (d, b))) = shape
        .iter()
        .zip(&attributes.block_size)
        .enumerate()
        .find(|(_, (d, b))| d > b)
    {
        return Err(format!(
            "block dimension {d} exceeds block size {b} on axis {axis}"
        ));
    }
    Ok(())
}

/// Serialize a block of the dataset described by `attributes`.
pub fn encode_block(attributes: &DatasetAttributes, block: &DataBlock) -> crate::Result<Vec<u8>> {
    attributes.check_grid_position(&block.grid_position)?;
    check_shape(attributes, &block.size).map_err(crate::Error::General)?;
    let rank = block.size.len() as u32;

    let (header, raw) = match &block.data {
        BlockData::Numeric { data_type, bytes } => {
            if *data_type != attributes.data_type {
                return Err(crate::Error::general(format!(
                    "cannot write {data_type} block to {} dataset",
                    attributes.data_type
                )));
            }
            let num_elements = block.num_elements();
            let nominal: usize = block.size.iter().map(|&d| d as usize).product();
            let mode = if num_elements == nominal {
                BlockMode::Default
            } else {
                BlockMode::VarLen {
                    num_elements: u32::try_from(num_elements)
                        .map_err(|_| crate::Error::general("too many elements for one block"))?,
                }
            };
            let header = BlockHeader {
                mode,
                rank,
                shape: block.size.clone(),
            };
            (header, bytes.to_vec())
        }
        BlockData::Strings(strings) => {
            let codec = attributes.data_type.object_codec()?;
            let header = BlockHeader {
                mode: BlockMode::Object,
                rank,
                shape: Vec::new(),
            };
            (header, codec.encode(strings)?)
        }
    };

    let payload = attributes.compression.encode(&raw)?;
    let mut out = Vec::with_capacity(header.encoded_len() + payload.len());
    header.write_to(&mut out)?;
    out.put_slice(&payload);
    Ok(out)
}

/// Deserialize the block at `grid_position` of the dataset described by `attributes`.
///
/// The header is validated against the dataset; any mismatch is a [crate::Error::Format].
pub fn decode_block(
    attributes: &DatasetAttributes,
    grid_position: &[u64],
    bytes: &[u8],
) -> crate::Result<DataBlock> {
    attributes.check_grid_position(grid_position)?;
    let mut buf = bytes;
    let header = BlockHeader::read_from(&mut buf)?;
    if header.rank as usize != attributes.rank() {
        return Err(crate::Error::format(format!(
            "block has rank {}, dataset has rank {}",
            header.rank,
            attributes.rank()
        )));
    }
    let raw = attributes.compression.decode(buf)?;

    let data_type = attributes.data_type;
    match header.mode {
        BlockMode::Default | BlockMode::VarLen { .. } => {
            check_shape(attributes, &header.shape).map_err(crate::Error::Format)?;
            let Some(el_size) = data_type.size() else {
                return Err(crate::Error::format(format!(
                    "numeric block in {data_type} dataset"
                )));
            };
            let num_elements = match header.mode {
                BlockMode::VarLen { num_elements } => num_elements as usize,
                _ => header.shape.iter().map(|&d| d as usize).product(),
            };
            if raw.len() != num_elements * el_size {
                return Err(crate::Error::format(format!(
                    "expected {num_elements} {data_type} elements, payload has {} bytes",
                    raw.len()
                )));
            }
            DataBlock::numeric(grid_position.to_vec(), header.shape, data_type, raw)
        }
        BlockMode::Object => {
            if !data_type.is_object() {
                return Err(crate::Error::format(format!(
                    "object block in {data_type} dataset"
                )));
            }
            let strings = data_type.object_codec()?.decode(&raw)?;
            Ok(DataBlock::strings(
                grid_position.to_vec(),
                attributes.block_shape(grid_position),
                strings,
            ))
        }
    }
}

/// Read a whole block from `input`.
pub fn read_block(
    input: &mut impl Read,
    attributes: &DatasetAttributes,
    grid_position: &[u64],
) -> crate::Result<DataBlock> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    log::trace!("read block {grid_position:?} ({} bytes)", bytes.len());
    decode_block(attributes, grid_position, &bytes)
}
