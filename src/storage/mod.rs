mod error;
mod memory;
mod turso;

pub use error::StorageError;
pub use memory::MemoryCache;
pub use turso::TursoClient;
