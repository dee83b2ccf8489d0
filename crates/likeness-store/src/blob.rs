//! Embedding BLOB codec: a flat sequence of little-endian f32 values.

use likeness_core::Embedding;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("embedding blob length {0} is not a multiple of 4")]
    Misaligned(usize),
}

pub fn encode(embedding: &Embedding) -> Vec<u8> {
    embedding
        .values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

pub fn decode(blob: &[u8]) -> Result<Embedding, CodecError> {
    if blob.len() % 4 != 0 {
        return Err(CodecError::Misaligned(blob.len()));
    }
    let values = blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok(Embedding::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let embedding = Embedding::new(vec![0.25, -1.5, 0.0, 3.75]);
        let decoded = decode(&encode(&embedding)).unwrap();
        assert_eq!(decoded.values, embedding.values);
    }

    #[test]
    fn empty_blob_is_empty_embedding() {
        let decoded = decode(&[]).unwrap();
        assert!(decoded.values.is_empty());
    }

    #[test]
    fn misaligned_blob_rejected() {
        let err = decode(&[0u8, 1, 2]).unwrap_err();
        assert!(matches!(err, CodecError::Misaligned(3)));
    }
}
