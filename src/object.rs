//! Registry of codecs for object blocks.
//!
//! Each codec is registered once under a stable tag with [inventory::submit!].
//! Lookup walks the registered entries; nothing is resolved at runtime by type.

/// Tag of the codec storing a block's strings as one JSON array.
pub const JSON_TAG: &str = "json";

type EncodeFn = fn(&[String]) -> crate::Result<Vec<u8>>;
type DecodeFn = fn(&[u8]) -> crate::Result<Vec<String>>;

/// A pair of pure functions converting the elements of an object block to and from bytes.
#[derive(Debug)]
pub struct ObjectCodec {
    tag: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

inventory::collect!(ObjectCodec);

impl ObjectCodec {
    pub const fn new(tag: &'static str, encode: EncodeFn, decode: DecodeFn) -> Self {
        Self {
            tag,
            encode,
            decode,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn encode(&self, elements: &[String]) -> crate::Result<Vec<u8>> {
        (self.encode)(elements)
    }

    pub fn decode(&self, bytes: &[u8]) -> crate::Result<Vec<String>> {
        (self.decode)(bytes)
    }

    /// The codec registered under `tag`.
    pub fn find(tag: &str) -> Option<&'static ObjectCodec> {
        Self::all().find(|c| c.tag == tag)
    }

    pub fn all() -> impl Iterator<Item = &'static ObjectCodec> {
        inventory::iter::<ObjectCodec>.into_iter()
    }
}

fn encode_json(elements: &[String]) -> crate::Result<Vec<u8>> {
    Ok(serde_json::to_vec(elements)?)
}

fn decode_json(bytes: &[u8]) -> crate::Result<Vec<String>> {
    serde_json::from_slice(bytes)
        .map_err(|e| crate::Error::format(format!("invalid JSON object block: {e}")))
}

inventory::submit! {
    ObjectCodec::new(JSON_TAG, encode_json, decode_json)
}
