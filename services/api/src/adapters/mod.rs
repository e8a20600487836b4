pub mod db;
pub mod docstore;
pub mod memory;
pub mod memory_docs;
pub mod orchestrator;

pub use db::PgStore;
pub use docstore::PgDocumentStore;
pub use memory::MemoryStore;
pub use memory_docs::MemoryDocumentStore;
pub use orchestrator::HttpOrchestrator;
