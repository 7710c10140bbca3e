use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub index: usize,
    pub text: String,
    pub offset: (usize, usize), // [start, end) character positions in the source text
}

impl Chunk {
    pub fn new(doc_id: String, index: usize, text: String, offset: (usize, usize)) -> Self {
        // Generate stable chunk_id from content
        let chunk_id = Self::generate_chunk_id(&doc_id, &text, offset);

        Self {
            doc_id,
            chunk_id,
            index,
            text,
            offset,
        }
    }

    fn generate_chunk_id(doc_id: &str, text: &str, offset: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(offset.0.to_string().as_bytes());
        hasher.update(offset.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16]) // Use first 16 bytes (32 hex chars)
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable() {
        let a = Chunk::new("doc".to_string(), 0, "Some text.".to_string(), (0, 10));
        let b = Chunk::new("doc".to_string(), 0, "Some text.".to_string(), (0, 10));
        let c = Chunk::new("doc".to_string(), 1, "Some text.".to_string(), (11, 21));

        assert_eq!(a.chunk_id, b.chunk_id);
        assert_ne!(a.chunk_id, c.chunk_id);
        assert_eq!(a.chunk_id.len(), 32);
    }

    #[test]
    fn chunk_serializes_offset_as_pair() {
        let chunk = Chunk::new("doc".to_string(), 2, "Hi there.".to_string(), (4, 13));
        let json = serde_json::to_value(&chunk).unwrap();

        assert_eq!(json["index"], 2);
        assert_eq!(json["offset"][0], 4);
        assert_eq!(json["offset"][1], 13);
    }
}
