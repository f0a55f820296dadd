pub mod client;
pub mod helix;
pub mod memory;
pub mod store;

pub use client::{HelixClient, HelixClientError};
pub use helix::HelixStore;
pub use memory::InMemoryStore;
pub use store::{
    CandidateStore, ConceptStore, MetadataFilter, Page, ProfileStore, UpsertOutcome, VectorHit,
    VectorQuery, VectorRecord, VectorStore, KIND_CONCEPT, KIND_LECTURER_CHUNK, META_KIND,
    META_LECTURER_ID,
};
