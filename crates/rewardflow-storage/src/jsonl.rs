//! Gzip JSONL Codec
//!
//! History and rewarded-decision objects are gzip-compressed JSONL: one
//! JSON object per line. Encoding re-serializes records compactly; decoding
//! tolerates blank lines and a missing trailing newline.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::error::Result;

/// Serialize records as JSONL and gzip the result.
pub fn encode_lines(records: &[Value]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for record in records {
        serde_json::to_writer(&mut encoder, record)?;
        encoder.write_all(b"\n")?;
    }
    Ok(Bytes::from(encoder.finish()?))
}

/// Gunzip and parse one record per non-empty line.
pub fn decode_lines(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;

    let mut records = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip() {
        let records = vec![
            json!({"message_id": "m1", "history_id": "h"}),
            json!({"message_id": "m2", "rewards": {"reward": 1.5}}),
        ];
        let bytes = encode_lines(&records).unwrap();
        assert_eq!(decode_lines(&bytes).unwrap(), records);
    }

    #[test]
    fn test_roundtrip_empty() {
        let bytes = encode_lines(&[]).unwrap();
        assert!(decode_lines(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_output_is_gzip() {
        let bytes = encode_lines(&[json!({"a": 1})]).unwrap();
        // gzip magic
        assert_eq!(&bytes[0..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"a\":1}\n\n  \n{\"b\":2}").unwrap();
        let bytes = encoder.finish().unwrap();
        let records = decode_lines(&bytes).unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_lines(b"not gzip at all").is_err());
    }

    #[test]
    fn test_decode_rejects_malformed_line() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"{\"a\":1}\nnot json\n").unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(decode_lines(&bytes).is_err());
    }
}
