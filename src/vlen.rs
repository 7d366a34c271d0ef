//! Variable-length string arrays, stored as null-terminated runs of encoded text.
use bytes::BufMut;

use crate::object::ObjectCodec;

/// Tag under which the UTF-8 codec is registered.
pub const VL_STRING_TAG: &str = "String(-1)";

/// Text encodings supported by [encode] and [decode].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Utf16Be,
    Utf16Le,
}

impl Charset {
    /// Bytes per code unit; the terminator is one all-zero code unit.
    fn unit_len(&self) -> usize {
        match self {
            Charset::Utf8 => 1,
            Charset::Utf16Be | Charset::Utf16Le => 2,
        }
    }

    fn put_str(&self, s: &str, out: &mut Vec<u8>) {
        match self {
            Charset::Utf8 => out.put_slice(s.as_bytes()),
            Charset::Utf16Be => s.encode_utf16().for_each(|u| out.put_u16(u)),
            Charset::Utf16Le => s.encode_utf16().for_each(|u| out.put_u16_le(u)),
        }
    }

    fn put_terminator(&self, out: &mut Vec<u8>) {
        out.put_bytes(0, self.unit_len());
    }

    fn decode_str(&self, bytes: &[u8]) -> crate::Result<String> {
        let units = |from: fn([u8; 2]) -> u16| -> Vec<u16> {
            bytes
                .chunks_exact(2)
                .map(|c| from([c[0], c[1]]))
                .collect()
        };
        let decoded = match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
            Charset::Utf16Be => {
                String::from_utf16(&units(u16::from_be_bytes)).map_err(|e| e.to_string())
            }
            Charset::Utf16Le => {
                String::from_utf16(&units(u16::from_le_bytes)).map_err(|e| e.to_string())
            }
        };
        decoded.map_err(|e| crate::Error::format(format!("invalid {self:?} string: {e}")))
    }
}

/// Concatenate each string's encoding followed by a null terminator.
///
/// Strings containing `'\0'` cannot be told apart from the terminator and are rejected.
pub fn encode<S: AsRef<str>>(strings: &[S], charset: Charset) -> crate::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(
        strings
            .iter()
            .map(|s| (s.as_ref().len() + 1) * charset.unit_len())
            .sum(),
    );
    for (index, s) in strings.iter().enumerate() {
        let s = s.as_ref();
        if s.contains('\0') {
            return Err(crate::Error::EmbeddedTerminator { index });
        }
        charset.put_str(s, &mut out);
        charset.put_terminator(&mut out);
    }
    Ok(out)
}

/// Split `bytes` on null terminators and decode each run.
///
/// A trailing run without a terminator is kept as the last string.
pub fn decode(bytes: &[u8], charset: Charset) -> crate::Result<Vec<String>> {
    let unit = charset.unit_len();
    if bytes.len() % unit != 0 {
        return Err(crate::Error::format(format!(
            "{} bytes is not a whole number of {charset:?} code units",
            bytes.len()
        )));
    }
    let mut out = Vec::new();
    let mut start = 0;
    for (i, code_unit) in bytes.chunks_exact(unit).enumerate() {
        if code_unit.iter().all(|&b| b == 0) {
            let end = i * unit;
            out.push(charset.decode_str(&bytes[start..end])?);
            start = end + unit;
        }
    }
    if start < bytes.len() {
        out.push(charset.decode_str(&bytes[start..])?);
    }
    Ok(out)
}

fn encode_utf8(strings: &[String]) -> crate::Result<Vec<u8>> {
    encode(strings, Charset::Utf8)
}

fn decode_utf8(bytes: &[u8]) -> crate::Result<Vec<String>> {
    decode(bytes, Charset::Utf8)
}

inventory::submit! {
    ObjectCodec::new(VL_STRING_TAG, encode_utf8, decode_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn encodes_null_terminated_utf8() {
        let data = strings(&["This", "is", "a", "test"]);
        let bytes = encode(&data, Charset::Utf8).unwrap();
        assert_eq!(bytes, b"This\0is\0a\0test\0");
        assert_eq!(decode(&bytes, Charset::Utf8).unwrap(), data);
    }

    #[test]
    fn round_trips_edge_cases() {
        for charset in [Charset::Utf8, Charset::Utf16Be, Charset::Utf16Le] {
            for xs in [
                vec![],
                strings(&[""]),
                strings(&["", ""]),
                strings(&["", "a", ""]),
                strings(&["héllo", "日本語", "🦀 crab"]),
            ] {
                let bytes = encode(&xs, charset).unwrap();
                assert_eq!(decode(&bytes, charset).unwrap(), xs, "{charset:?} {xs:?}");
            }
        }
    }

    #[test]
    fn utf16_terminators_are_whole_code_units() {
        // U+0100 encodes as 01 00 in big-endian: its zero byte is not a terminator
        let bytes = encode(&["Ā"], Charset::Utf16Be).unwrap();
        assert_eq!(bytes, [0x01, 0x00, 0x00, 0x00]);
        assert_eq!(decode(&bytes, Charset::Utf16Be).unwrap(), strings(&["Ā"]));
        assert!(decode(&[0x00], Charset::Utf16Le).is_err());
    }

    #[test]
    fn rejects_embedded_terminator() {
        let err = encode(&["ok", "not\0ok"], Charset::Utf8).unwrap_err();
        assert!(matches!(err, crate::Error::EmbeddedTerminator { index: 1 }));
    }

    #[test]
    fn keeps_unterminated_tail() {
        assert_eq!(
            decode(b"a\0b", Charset::Utf8).unwrap(),
            strings(&["a", "b"])
        );
        assert!(decode(b"\xff\0", Charset::Utf8).is_err());
    }

    #[test]
    fn registered_codec_is_utf8() {
        let codec = ObjectCodec::find(VL_STRING_TAG).unwrap();
        let data = strings(&["This", "is", "a", "test"]);
        assert_eq!(codec.encode(&data).unwrap(), b"This\0is\0a\0test\0");
    }
}
