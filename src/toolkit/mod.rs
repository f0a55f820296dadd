pub mod evolution;
pub mod matching;
pub mod ontology;
pub mod profile;
pub mod search;
pub mod similarity;
pub mod text;


pub use matching::{MatchExplainer, MatchOptions, MatchResult};
pub use ontology::{Concept, ConceptIndex, ConceptIndexService, ExtractedConcept};
pub use profile::{extract_concepts, ExtractionOptions, Profile, ProfileType};
pub use search::{HybridSearcher, SearchOptions, SearchResponse};
