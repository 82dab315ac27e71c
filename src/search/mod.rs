pub mod matcher;
pub mod vector;

pub use matcher::match_embeddings;
pub use vector::{cosine_similarity, normalize, VectorError};
