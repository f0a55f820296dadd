pub mod extractor;
pub mod models;

pub use extractor::{extract_concepts, ExtractionOptions, ExtractionResult};
pub use models::{OntologyExtract, Profile, ProfileFieldConfig, ProfileType};
