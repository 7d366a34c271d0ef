//! The compression contract applied to block payloads.
use std::borrow::Cow;
use std::fmt::Debug;

use zarrs_codec::{BytesRepresentation, BytesToBytesCodecTraits, CodecOptions};

use crate::metadata::N5Compression;

/// Symmetric transformation of a block payload.
///
/// A block payload is the whole remainder of the block file after its header and is
/// never read or written partially, so the contract is buffer to buffer rather than
/// wrapping a byte sink or source: `decode(encode(x)) == x`.
pub trait Compression: Debug + Send + Sync {
    /// Compress raw payload bytes.
    fn encode(&self, raw: &[u8]) -> crate::Result<Vec<u8>>;

    /// Decompress an encoded payload.
    fn decode(&self, encoded: &[u8]) -> crate::Result<Vec<u8>>;
}

impl Compression for N5Compression {
    fn encode(&self, raw: &[u8]) -> crate::Result<Vec<u8>> {
        let Some(codec) = self.to_bytes_to_bytes_codec()? else {
            return Ok(raw.to_vec());
        };
        let encoded = codec.encode(Cow::Borrowed(raw), &CodecOptions::default())?;
        Ok(encoded.into_owned())
    }

    fn decode(&self, encoded: &[u8]) -> crate::Result<Vec<u8>> {
        let Some(codec) = self.to_bytes_to_bytes_codec()? else {
            return Ok(encoded.to_vec());
        };
        // N5 payloads do not record their decoded size
        let decoded = codec.decode(
            Cow::Borrowed(encoded),
            &BytesRepresentation::UnboundedSize,
            &CodecOptions::default(),
        )?;
        Ok(decoded.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Vec<u8> {
        (0..4096u32).flat_map(|i| (i % 251).to_be_bytes()).collect()
    }

    #[test]
    fn raw_is_identity() {
        let raw = payload();
        let c = N5Compression::Raw;
        assert_eq!(c.encode(&raw).unwrap(), raw);
        assert_eq!(c.decode(&raw).unwrap(), raw);
    }

    #[test]
    fn gzip_round_trips() {
        let raw = payload();
        let c = N5Compression::Gzip { level: -1 };
        let encoded = c.encode(&raw).unwrap();
        assert_ne!(encoded, raw);
        // gzip member header
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        assert_eq!(c.decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn bzip2_round_trips() {
        let raw = payload();
        let c = N5Compression::Bzip2 { block_size: 9 };
        let encoded = c.encode(&raw).unwrap();
        assert_eq!(&encoded[..3], b"BZh");
        assert_eq!(c.decode(&encoded).unwrap(), raw);
    }

    #[test]
    fn unsupported_compression_is_an_error() {
        let c = N5Compression::Xz { preset: 6 };
        assert!(c.encode(b"abc").is_err());
        assert!(c.decode(b"abc").is_err());
    }
}
