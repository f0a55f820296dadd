//! Deterministic providers and fixtures shared by unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::llm::embeddings::{EmbeddingError, EmbeddingProvider};
use crate::llm::providers::base::{LlmMetadata, LlmProvider, LlmProviderError};
use crate::toolkit::ontology::{Concept, ConceptIndex};
use crate::toolkit::profile::{Profile, ProfileType};
use crate::toolkit::text::normalize;


/// Bag-of-words embedder: every normalized word bumps one FNV-hashed bucket, the result
/// is L2-normalized. Texts sharing words get positive cosine similarity.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let normalized = normalize(text);
        for word in normalized.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dims as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}


/// LLM that replays scripted answers in order and errors once they run out.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, String>>>,
    always_fail: bool,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            always_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            always_fail: true,
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _response_format: Option<&str>,
    ) -> Result<(String, LlmMetadata), LlmProviderError> {
        if self.always_fail {
            return Err(LlmProviderError::Provider("scripted failure".to_string()));
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(text)) => Ok((
                text,
                LlmMetadata {
                    provider: "scripted".to_string(),
                    model: "scripted".to_string(),
                    ..Default::default()
                },
            )),
            Some(Err(message)) => Err(LlmProviderError::Provider(message)),
            None => Err(LlmProviderError::Provider("script exhausted".to_string())),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}


pub fn sample_concepts() -> Vec<Concept> {
    let embedder = HashEmbedder::new(16);
    let concept = |key: &str, label: &str, aliases: &[&str]| {
        let concept = Concept::new(key, label, aliases.iter().map(|a| a.to_string()).collect());
        let embedding = embedder.vector_for(&concept.embedding_text());
        concept.with_embedding(embedding)
    };

    vec![
        concept("it", "Information Technology", &["IT", "công nghệ thông tin"]),
        concept("it.ai", "Artificial Intelligence", &["AI", "trí tuệ nhân tạo"]),
        concept("it.ai.machine_learning", "Machine Learning", &["ML", "học máy"]),
        concept("it.ai.machine_learning.deep_learning", "Deep Learning", &["học sâu"]),
        concept("it.ai.nlp", "Natural Language Processing", &["NLP", "xử lý ngôn ngữ tự nhiên"]),
        concept("it.ai.computer_vision", "Computer Vision", &["thị giác máy tính"]),
        concept("it.data", "Data Science", &["khoa học dữ liệu"]),
        concept("it.data.databases", "Databases", &["cơ sở dữ liệu"]),
    ]
}

pub fn sample_index() -> ConceptIndex {
    ConceptIndex::build(sample_concepts()).unwrap()
}

/// Two students and three lecturers, all last updated on 2026-01-01.
pub fn sample_profiles() -> Vec<Profile> {
    let updated = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    vec![
        Profile::new("s1", ProfileType::Student, "Lê Văn Cường")
            .with_field("skills", ["Machine Learning", "Blockchain"])
            .with_field("interests", ["xử lý ngôn ngữ tự nhiên"])
            .with_updated_at(updated),
        Profile::new("s2", ProfileType::Student, "Phạm Thu Hà")
            .with_field("skills", ["Databases"])
            .with_field("interests", ["computer vision"])
            .with_updated_at(updated),
        Profile::new("l1", ProfileType::Lecturer, "Nguyễn Văn A")
            .with_field("area_of_interest", ["Artificial Intelligence"])
            .with_field("research_interests", ["Machine learning"])
            .with_field("publication_titles", ["Deep learning for medical imaging"])
            .with_updated_at(updated),
        Profile::new("l2", ProfileType::Lecturer, "Trần Thị Bình")
            .with_field("area_of_interest", ["Artificial Intelligence"])
            .with_field("research_interests", ["Natural language processing"])
            .with_field("publication_titles", ["Vietnamese text classification"])
            .with_updated_at(updated),
        Profile::new("l3", ProfileType::Lecturer, "Hoàng Minh Đức")
            .with_field("area_of_interest", ["Data Science"])
            .with_field("research_interests", ["Databases"])
            .with_field("publication_titles", ["Query optimization in distributed databases"])
            .with_field("bio", ["Works on storage engines and transaction processing."])
            .with_updated_at(updated),
    ]
}
