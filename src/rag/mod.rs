pub mod chunker;
pub mod index;
pub mod query;
pub mod sqlite;
pub mod store;

pub use query::{Answer, QueryEngine, QueryOptions};
pub use sqlite::SqliteVectorStore;
pub use store::{ChunkHit, StoredChunk, VectorStore};
