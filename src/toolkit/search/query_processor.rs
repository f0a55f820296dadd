use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::models::{QueryAnalysis, QueryIntent};
use super::names::{extract_person_names, strip_names};
use crate::llm::json::parse_json;
use crate::llm::providers::base::LlmProvider;
use crate::toolkit::ontology::{ConceptHit, ConceptIndex};
use crate::toolkit::text::{index_words, is_stopword, normalize, split_phrases};

lazy_static! {
    static ref TOPIC_CUES: Regex = Regex::new(
        r"(?i)\b(research|working on|expert|specializ|supervis|topic|field|nghien cuu|linh vuc|chuyen (mon|gia)|huong dan|de tai)"
    )
    .unwrap();
}


pub const SYSTEM_PROMPT: &str = r#"You classify search queries sent to a university lecturer directory.

Intents:
- find_lecturer: the user wants a specific person
- topic_search: the user wants lecturers working on a subject
- general: anything else

Always respond with valid JSON."#;


pub fn build_intent_prompt(query: &str, rule_based: &QueryAnalysis) -> String {
    let names = if rule_based.person_names.is_empty() {
        "(none)".to_string()
    } else {
        rule_based.person_names.join(", ")
    };
    format!(
        r#"**Query:** "{query}"

**Detected person names:** {names}
**Rule-based intent:** {intent}

Respond with JSON:
{{"intent": "find_lecturer" | "topic_search" | "general", "topics": ["research topics mentioned in the query"]}}"#,
        intent = rule_based.intent
    )
}

#[derive(Debug, Deserialize)]
struct LlmIntent {
    intent: String,
    #[serde(default)]
    topics: Vec<String>,
}


pub struct QueryProcessor {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl QueryProcessor {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    /// Rule-based analysis: person names, residual topic text, concepts found in the topic
    /// text and an intent.
    pub fn analyze(&self, query: &str, index: &ConceptIndex) -> QueryAnalysis {
        let person_names = extract_person_names(query);
        let topic_text = strip_names(query, &person_names);
        let concept_keys = resolve_topic_concepts(&topic_text, index);

        let topic_cue = TOPIC_CUES.is_match(&normalize(&topic_text));
        let intent = if !person_names.is_empty() && concept_keys.is_empty() && !topic_cue {
            QueryIntent::FindLecturer
        } else if !concept_keys.is_empty() || topic_cue {
            QueryIntent::TopicSearch
        } else {
            QueryIntent::General
        };

        debug!(
            "Query analyzed: names={:?}, concepts={:?}, intent={}",
            person_names, concept_keys, intent
        );
        QueryAnalysis {
            query: query.to_string(),
            person_names,
            topic_text,
            concept_keys,
            intent,
            llm_refined: false,
        }
    }

    /// Rule-based analysis refined by the LLM intent classifier. Provider errors and
    /// unparseable answers keep the rule-based result.
    pub async fn analyze_with_llm(&self, query: &str, index: &ConceptIndex) -> QueryAnalysis {
        let mut analysis = self.analyze(query, index);
        let Some(llm) = &self.llm else {
            return analysis;
        };

        let prompt = build_intent_prompt(query, &analysis);
        match llm.generate(SYSTEM_PROMPT, &prompt, Some("json_object")).await {
            Ok((response, _)) => match parse_json::<LlmIntent>(&response) {
                Some(parsed) => match parsed.intent.parse::<QueryIntent>() {
                    Ok(intent) => {
                        analysis.intent = intent;
                        analysis.llm_refined = true;
                        for topic in parsed.topics {
                            for key in resolve_topic_concepts(&topic, index) {
                                if !analysis.concept_keys.contains(&key) {
                                    analysis.concept_keys.push(key);
                                }
                            }
                        }
                        info!("Query intent refined by LLM: {}", analysis.intent);
                    }
                    Err(_) => warn!("LLM returned unknown intent '{}'", parsed.intent),
                },
                None => warn!(
                    "Failed to parse LLM intent response: {}",
                    crate::safe_truncate(&response, 200)
                ),
            },
            Err(e) => warn!("LLM intent classification failed: {}", e),
        }
        analysis
    }
}

/// Concept keys for the phrases of `text`, falling back to single content words for
/// phrases that resolve to nothing.
pub fn resolve_topic_concepts(text: &str, index: &ConceptIndex) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut add = |hits: Vec<ConceptHit>| {
        for hit in hits {
            if !keys.contains(&hit.concept_key) {
                keys.push(hit.concept_key);
            }
        }
    };

    for phrase in split_phrases(text) {
        let hits = index.resolve(&phrase);
        if !hits.is_empty() {
            add(hits);
            continue;
        }
        for word in index_words(&phrase).filter(|w| !is_stopword(w)) {
            add(index.resolve(word));
        }
    }
    keys
}
