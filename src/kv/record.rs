//! Record encoding shared by both stores
//!
//! `[u32 key length][key bytes][u32 value length][value bytes]`, lengths
//! little-endian. A value length of `u32::MAX` marks a tombstone and is
//! followed by no value bytes.

use super::error::{KvError, KvResult};

pub(crate) const LEN_SIZE: usize = 4;
pub(crate) const TOMBSTONE: u32 = u32::MAX;

/// Encoded size of a record; `None` is a tombstone
pub(crate) fn record_size(key: &str, value: Option<&str>) -> usize {
    2 * LEN_SIZE + key.len() + value.map_or(0, str::len)
}

/// Reject records that cannot be written or read back
pub(crate) fn check_record(key: &str, value: Option<&str>, max: usize) -> KvResult<usize> {
    if key.is_empty() {
        return Err(KvError::EmptyKey);
    }
    let size = record_size(key, value);
    let value_len = value.map_or(0, str::len);
    if size > max || value_len >= TOMBSTONE as usize || key.len() > u32::MAX as usize {
        return Err(KvError::RecordTooLarge { size, max });
    }
    Ok(size)
}

pub(crate) fn encode_record(key: &str, value: Option<&str>) -> Vec<u8> {
    let mut data = Vec::with_capacity(record_size(key, value));
    data.extend_from_slice(&(key.len() as u32).to_le_bytes());
    data.extend_from_slice(key.as_bytes());
    match value {
        Some(value) => {
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
            data.extend_from_slice(value.as_bytes());
        }
        None => data.extend_from_slice(&TOMBSTONE.to_le_bytes()),
    }
    data
}

pub(crate) fn read_len(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(LEN_SIZE)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// A record decoded from the front of a buffer
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct DecodedRecord<'a> {
    pub key: &'a str,
    /// `None` for a tombstone
    pub value: Option<&'a [u8]>,
    /// Encoded length
    pub len: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Scan<'a> {
    Record(DecodedRecord<'a>),
    /// No more records: the buffer is exhausted or the key length is zero
    End,
    /// A record header promises more bytes than the buffer holds, or the key
    /// is not UTF-8
    Malformed,
}

/// Decode the record at the start of `buf`
pub(crate) fn decode_record(buf: &[u8]) -> Scan<'_> {
    let key_len = match read_len(buf, 0) {
        None | Some(0) => return Scan::End,
        Some(len) => len as usize,
    };

    let key_end = LEN_SIZE + key_len;
    let Some(key_bytes) = buf.get(LEN_SIZE..key_end) else {
        return Scan::Malformed;
    };
    let Ok(key) = std::str::from_utf8(key_bytes) else {
        return Scan::Malformed;
    };

    let value_start = key_end + LEN_SIZE;
    match read_len(buf, key_end) {
        None => Scan::Malformed,
        Some(TOMBSTONE) => Scan::Record(DecodedRecord {
            key,
            value: None,
            len: value_start,
        }),
        Some(value_len) => {
            let value_end = value_start + value_len as usize;
            match buf.get(value_start..value_end) {
                Some(value) => Scan::Record(DecodedRecord {
                    key,
                    value: Some(value),
                    len: value_end,
                }),
                None => Scan::Malformed,
            }
        }
    }
}

pub(crate) fn value_to_string(bytes: Vec<u8>) -> KvResult<String> {
    String::from_utf8(bytes).map_err(|_| KvError::Corrupted("value is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let data = encode_record("ab", Some("xyz"));
        assert_eq!(data, vec![2, 0, 0, 0, b'a', b'b', 3, 0, 0, 0, b'x', b'y', b'z']);
        assert_eq!(data.len(), record_size("ab", Some("xyz")));
    }

    #[test]
    fn test_decode_sequence() {
        let mut buf = encode_record("k1", Some("v1"));
        buf.extend(encode_record("k2", None));
        buf.extend([0u8; 16]);

        let Scan::Record(first) = decode_record(&buf) else {
            panic!("Expected first record");
        };
        assert_eq!(first.key, "k1");
        assert_eq!(first.value, Some(&b"v1"[..]));

        let Scan::Record(second) = decode_record(&buf[first.len..]) else {
            panic!("Expected tombstone");
        };
        assert_eq!(second.key, "k2");
        assert_eq!(second.value, None);

        assert_eq!(decode_record(&buf[first.len + second.len..]), Scan::End);
    }

    #[test]
    fn test_decode_truncated() {
        let buf = encode_record("key", Some("value"));
        assert_eq!(decode_record(&buf[..buf.len() - 1]), Scan::Malformed);
        assert_eq!(decode_record(&buf[..5]), Scan::Malformed);
        assert_eq!(decode_record(&buf[..2]), Scan::End);
        assert_eq!(decode_record(&[]), Scan::End);
    }

    #[test]
    fn test_check_record() {
        assert!(matches!(check_record("", Some("v"), 100), Err(KvError::EmptyKey)));
        assert!(matches!(
            check_record("k", Some(&"v".repeat(100)), 100),
            Err(KvError::RecordTooLarge { size: 109, max: 100 })
        ));
        assert_eq!(check_record("k", None, 100).unwrap(), 9);
    }
}
