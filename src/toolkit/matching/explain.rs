use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::engine::MatchResult;
use crate::llm::providers::base::LlmProvider;


pub const SYSTEM_PROMPT: &str = r#"You are an academic advisor. Explain in two or three sentences why a lecturer is a good supervisor for a student.

Rules:
1. Only mention the shared concepts you are given
2. Write in the language of the concept labels
3. Do not invent publications, projects or titles
4. Plain text only, no lists or markdown"#;


pub fn build_explain_prompt(student_name: &str, lecturer_name: &str, result: &MatchResult) -> String {
    let shared = result
        .matched_concepts
        .iter()
        .map(|c| {
            let sources = c.lecturer_sources.iter().cloned().collect::<Vec<_>>().join(", ");
            format!("  - {} (depth {}, lecturer fields: {})", c.label, c.depth, sources)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let related = if result.boosted_pairs.is_empty() {
        "  (none)".to_string()
    } else {
        result
            .boosted_pairs
            .iter()
            .map(|p| format!("  - {} ~ {} (domain {})", p.student_key, p.lecturer_key, p.domain))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"**Student:** {student_name}
**Lecturer:** {lecturer_name}
**Match score:** {score:.2}

**Shared concepts:**
{shared}

**Related concepts in the same domain:**
{related}

Explain the match."#,
        score = result.score
    )
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
    /// False when the text is the templated fallback.
    pub generated: bool,
}

/// Deterministic reason built from the match itself.
pub fn template_reason(result: &MatchResult) -> String {
    let labels = result
        .matched_concepts
        .iter()
        .map(|c| c.label.as_str())
        .collect::<Vec<_>>();

    let mut reason = if labels.is_empty() {
        "Related research areas".to_string()
    } else {
        format!("Shared concepts: {}", labels.join(", "))
    };
    if !result.boosted_pairs.is_empty() {
        reason.push_str(&format!("; {} related concept pair(s)", result.boosted_pairs.len()));
    }
    reason.push_str(&format!(" (score {:.2})", result.score));
    reason
}


pub struct MatchExplainer {
    llm: Option<Arc<dyn LlmProvider>>,
    max_chars: usize,
}

impl MatchExplainer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, max_chars: usize) -> Self {
        Self {
            llm,
            max_chars: max_chars.max(1),
        }
    }

    /// Streams an explanation from the provider, stopping at `max_chars`. Any provider
    /// failure or an empty answer yields the templated reason.
    pub async fn explain(&self, student_name: &str, lecturer_name: &str, result: &MatchResult) -> Explanation {
        let Some(llm) = &self.llm else {
            return Explanation {
                text: template_reason(result),
                generated: false,
            };
        };

        let prompt = build_explain_prompt(student_name, lecturer_name, result);
        let generated = match llm.generate_stream(SYSTEM_PROMPT, &prompt).await {
            Ok(stream) => stream.collect_bounded(self.max_chars).await,
            Err(e) => Err(e),
        };

        match generated {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Explanation generated for {} ({} chars)", lecturer_name, text.chars().count());
                Explanation {
                    text: text.trim().to_string(),
                    generated: true,
                }
            }
            Ok(_) => {
                warn!("Empty explanation from {}, using template", llm.provider_name());
                Explanation {
                    text: template_reason(result),
                    generated: false,
                }
            }
            Err(e) => {
                warn!("Explanation failed: {}", e);
                Explanation {
                    text: template_reason(result),
                    generated: false,
                }
            }
        }
    }
}
