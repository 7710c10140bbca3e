pub mod chunk;
pub mod chunker;

pub use chunk::Chunk;
pub use chunker::{split_text_into_chunks, Chunker, ChunkerConfig};

use sha2::{Digest, Sha256};

/// Generate a stable document ID from the input text
pub fn generate_doc_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Chunk raw input text with the given configuration
pub fn ingest_text(text: &str, config: ChunkerConfig) -> Vec<Chunk> {
    let doc_id = generate_doc_id(text);
    Chunker::new(config).chunk_text(&doc_id, text)
}
