use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zarrs::array::codec::{Bz2Codec, Bz2CompressionLevel, GzipCodec};

use crate::object::ObjectCodec;

/// Attribute keys reserved for [DatasetAttributes].
pub const DIMENSIONS_KEY: &str = "dimensions";
pub const BLOCK_SIZE_KEY: &str = "blockSize";
pub const DATA_TYPE_KEY: &str = "dataType";
pub const COMPRESSION_KEY: &str = "compression";

/// Representation of N5 dataset metadata.
///
/// Stored alongside any other attributes in the dataset's `attributes.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetAttributes {
    /// Array shape. N5 uses F order.
    pub dimensions: Vec<u64>,
    /// Block shape. N5 uses F order.
    pub block_size: Vec<u32>,
    pub data_type: DataType,
    #[serde(default)]
    pub compression: N5Compression,
}

impl DatasetAttributes {
    pub fn new(
        dimensions: Vec<u64>,
        block_size: Vec<u32>,
        data_type: DataType,
        compression: N5Compression,
    ) -> crate::Result<Self> {
        let out = Self {
            dimensions,
            block_size,
            data_type,
            compression,
        };
        out.validate()?;
        Ok(out)
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// Check that dimensions and block size agree.
    pub fn validate(&self) -> crate::Result<()> {
        if self.block_size.len() != self.dimensions.len() {
            return Err(crate::Error::general(format!(
                "block size {:?} does not match rank of dimensions {:?}",
                self.block_size, self.dimensions
            )));
        }
        if self.block_size.contains(&0) {
            return Err(crate::Error::general("zero block size"));
        }
        Ok(())
    }

    /// Number of blocks along each axis.
    pub fn grid_size(&self) -> Vec<u64> {
        self.dimensions
            .iter()
            .zip(&self.block_size)
            .map(|(&d, &b)| d.div_ceil(u64::from(b)))
            .collect()
    }

    /// Check that `grid_position` addresses a block of this dataset.
    pub fn check_grid_position(&self, grid_position: &[u64]) -> crate::Result<()> {
        let grid = self.grid_size();
        let inside = grid_position.len() == grid.len()
            && grid_position.iter().zip(&grid).all(|(p, g)| p < g);
        if inside {
            Ok(())
        } else {
            Err(crate::Error::BlockOutOfBounds {
                grid_position: grid_position.to_vec(),
                grid,
            })
        }
    }

    /// Shape of the block at `grid_position`: the block size, clipped at the array's upper edge.
    pub fn block_shape(&self, grid_position: &[u64]) -> Vec<u32> {
        self.dimensions
            .iter()
            .zip(&self.block_size)
            .zip(grid_position)
            .map(|((&d, &b), &p)| {
                let start = p * u64::from(b);
                d.saturating_sub(start).min(u64::from(b)) as u32
            })
            .collect()
    }
}

/// N5 element data types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Variable-length strings, stored as object blocks.
    String,
    /// Arbitrary serialized objects, stored as object blocks.
    Object,
}

impl DataType {
    /// Size of one element in bytes, or `None` for object types.
    pub fn size(&self) -> Option<usize> {
        let s = match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Uint64 | DataType::Int64 | DataType::Float64 => 8,
            DataType::String | DataType::Object => return None,
        };
        Some(s)
    }

    pub fn is_object(&self) -> bool {
        self.size().is_none()
    }

    /// Codec for the blocks of an object type.
    pub fn object_codec(&self) -> crate::Result<&'static ObjectCodec> {
        let tag = match self {
            DataType::String => crate::vlen::VL_STRING_TAG,
            DataType::Object => crate::object::JSON_TAG,
            t => {
                return Err(crate::Error::general(format!(
                    "{t} is not an object data type"
                )));
            }
        };
        ObjectCodec::find(tag)
            .ok_or_else(|| crate::Error::general(format!("no object codec registered as {tag:?}")))
    }

    fn as_str(&self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Uint64 => "uint64",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Object => "object",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map_err(|_| crate::Error::general(format!("unsupported data type: {s}")))
    }
}

/// N5 block compression configuration.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Copy)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum N5Compression {
    /// Uncompressed.
    #[default]
    Raw,
    Bzip2 {
        /// Default 9. Must be in the range 1..=9.
        #[serde(rename = "blockSize", default = "default_bzip2_block_size")]
        block_size: u8,
    },
    Gzip {
        /// Default -1, meaning "implementation default" (usually 6).
        #[serde(default = "default_gzip_level")]
        level: i8,
    },
    Lz4 {
        /// Default 65536. Must be a positive integer.
        #[serde(rename = "blockSize", default = "default_lz4_block_size")]
        block_size: u64,
    },
    Xz {
        /// Default 6.
        #[serde(default = "default_xz_preset")]
        preset: u32,
    },
}

fn default_bzip2_block_size() -> u8 {
    9
}

fn default_gzip_level() -> i8 {
    -1
}

fn default_lz4_block_size() -> u64 {
    65536
}

fn default_xz_preset() -> u32 {
    6
}

impl N5Compression {
    /// Convert to a bytes-to-bytes codec; `None` for raw.
    pub fn to_bytes_to_bytes_codec(
        &self,
    ) -> crate::Result<Option<Arc<dyn zarrs_codec::BytesToBytesCodecTraits>>> {
        match self {
            N5Compression::Raw => Ok(None),
            N5Compression::Bzip2 { block_size } => Ok(Some(Arc::new(Bz2Codec::new(
                Bz2CompressionLevel::new(u32::from(*block_size))
                    .map_err(|n| crate::Error::general(format!("invalid bz2 block size {n}")))?,
            )))),
            N5Compression::Gzip { level } => {
                let lvl_int: u32 = match level {
                    -1 => 6,
                    n if *n >= 0 => *n as u32,
                    n => {
                        return Err(crate::Error::general(format!(
                            "invalid gzip compression level {n}"
                        )));
                    }
                };
                Ok(Some(Arc::new(
                    GzipCodec::new(lvl_int).map_err(crate::Error::wrap)?,
                )))
            }
            c => Err(crate::Error::general(format!(
                "unsupported N5 compression: {c:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_n5_json() {
        let attrs: DatasetAttributes = serde_json::from_value(json!({
            "dimensions": [100, 30],
            "blockSize": [64, 16],
            "dataType": "uint16",
            "compression": {"type": "bzip2"},
            "other": "ignored",
        }))
        .unwrap();
        assert_eq!(attrs.data_type, DataType::Uint16);
        assert_eq!(attrs.compression, N5Compression::Bzip2 { block_size: 9 });
        assert_eq!(attrs.grid_size(), vec![2, 2]);
        assert_eq!(attrs.block_shape(&[1, 1]), vec![36, 14]);
        assert_eq!(attrs.block_shape(&[0, 0]), vec![64, 16]);
    }

    #[test]
    fn writes_n5_json() {
        let attrs = DatasetAttributes::new(
            vec![10],
            vec![5],
            DataType::Float64,
            N5Compression::Gzip { level: -1 },
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&attrs).unwrap(),
            json!({
                "dimensions": [10],
                "blockSize": [5],
                "dataType": "float64",
                "compression": {"type": "gzip", "level": -1},
            })
        );
    }

    #[test]
    fn rejects_inconsistent_shapes() {
        assert!(DatasetAttributes::new(vec![1, 2], vec![1], DataType::Int8, N5Compression::Raw).is_err());
        assert!(DatasetAttributes::new(vec![1], vec![0], DataType::Int8, N5Compression::Raw).is_err());
    }

    #[test]
    fn checks_grid_positions() {
        let attrs =
            DatasetAttributes::new(vec![10, 10], vec![4, 5], DataType::Int8, N5Compression::Raw)
                .unwrap();
        assert!(attrs.check_grid_position(&[2, 1]).is_ok());
        assert!(attrs.check_grid_position(&[3, 0]).is_err());
        assert!(attrs.check_grid_position(&[0]).is_err());
    }

    #[test]
    fn parses_data_type_names() {
        assert_eq!("float32".parse::<DataType>().unwrap(), DataType::Float32);
        assert_eq!(DataType::String.to_string(), "string");
        assert!("complex64".parse::<DataType>().is_err());
    }
}
