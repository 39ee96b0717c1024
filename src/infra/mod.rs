//! Infrastructure adapters for the object store.

pub mod store;

pub use store::InMemoryStore;
