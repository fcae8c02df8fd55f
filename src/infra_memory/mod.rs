mod document_store_memory;

pub use document_store_memory::*;
