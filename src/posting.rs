use bytemuck::{Pod, Zeroable};

use crate::{
    error::{Error, Result},
    score::{self, AmalgamatedScore},
};

/// Size of one on-disk posting record in bytes.
pub const ENTRY_SIZE: usize = std::mem::size_of::<PostingEntry>();

/// One document's weight for one word.
///
/// Stored on disk as `document_id ++ amalgamated`, both native byte order,
/// with no padding between records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PostingEntry {
    pub document_id: u32,
    pub amalgamated: AmalgamatedScore,
}

impl PostingEntry {
    pub fn new(document_id: u32, service_type: u8, score: i32) -> Self {
        Self {
            document_id,
            amalgamated: score::encode(service_type, score),
        }
    }

    pub fn score(&self) -> i16 {
        self.amalgamated.score()
    }

    pub fn service_type(&self) -> u8 {
        self.amalgamated.service_type()
    }

    /// Re-encode with a new score, keeping the service type.
    pub fn with_score(self, score: i32) -> Self {
        Self::new(self.document_id, self.service_type(), score)
    }
}

/// Decode a stored posting list.
///
/// `key` is only used to label the error when `bytes` is not a whole number
/// of records. The input does not need to be aligned.
pub fn decode_list(key: &[u8], bytes: &[u8]) -> Result<Vec<PostingEntry>> {
    if bytes.len() % ENTRY_SIZE != 0 {
        return Err(Error::corrupt(key, bytes.len()));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

pub fn encode_list(entries: &[PostingEntry]) -> Vec<u8> {
    bytemuck::cast_slice(entries).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_eight_bytes() {
        assert_eq!(ENTRY_SIZE, 8);
    }

    #[test]
    fn record_layout_is_id_then_score() {
        let entry = PostingEntry::new(0x0102_0304, 9, 100);
        let bytes = encode_list(&[entry]);
        assert_eq!(&bytes[0..4], &0x0102_0304u32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &entry.amalgamated.raw().to_ne_bytes());
    }

    #[test]
    fn decode_preserves_order() {
        let entries: Vec<_> =
            (0..5).map(|i| PostingEntry::new(i, 1, i as i32 + 1)).collect();
        let decoded = decode_list(b"w", &encode_list(&entries)).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn decode_unaligned_input() {
        let entries = [PostingEntry::new(7, 2, 3), PostingEntry::new(8, 2, 4)];
        let mut buf = vec![0u8];
        buf.extend_from_slice(&encode_list(&entries));
        let decoded = decode_list(b"w", &buf[1..]).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn decode_rejects_partial_record() {
        let err = decode_list(b"broken", &[0u8; 12]).unwrap_err();
        assert!(matches!(err, Error::Corrupt { len: 12, .. }));
    }

    #[test]
    fn decode_empty_is_empty() {
        assert!(decode_list(b"w", &[]).unwrap().is_empty());
    }

    #[test]
    fn with_score_keeps_service_type() {
        let entry = PostingEntry::new(1, 42, 10).with_score(25);
        assert_eq!(entry.service_type(), 42);
        assert_eq!(entry.score(), 25);
        assert_eq!(entry.document_id, 1);
    }
}
