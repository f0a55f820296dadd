use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::toolkit::ontology::ExtractedConcept;

pub const STUDENT_FIELDS: [&str; 2] = ["skills", "interests"];
pub const LECTURER_FIELDS: [&str; 3] = ["area_of_interest", "research_interests", "publication_titles"];

pub const FIELD_AREA_OF_INTEREST: &str = "area_of_interest";
pub const FIELD_RESEARCH_INTERESTS: &str = "research_interests";
pub const FIELD_PUBLICATION_TITLES: &str = "publication_titles";
pub const FIELD_BIO: &str = "bio";


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileType {
    Student,
    Lecturer,
}


/// A student or lecturer with free-text fields keyed by field name. Each field holds
/// one or more raw strings as entered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub profile_type: ProfileType,
    pub full_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_extract: Option<OntologyExtract>,
}

impl Profile {
    pub fn new(id: impl Into<String>, profile_type: ProfileType, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            profile_type,
            full_name: full_name.into(),
            fields: BTreeMap::new(),
            updated_at: None,
            ontology_extract: None,
        }
    }

    pub fn with_field<S: Into<String>>(mut self, name: &str, values: impl IntoIterator<Item = S>) -> Self {
        self.fields
            .entry(name.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-blank values of a field joined with `", "`.
    pub fn field_text(&self, name: &str) -> String {
        self.field(name)
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn has_text(&self, name: &str) -> bool {
        self.field(name).iter().any(|v| !v.trim().is_empty())
    }
}


/// Field names read by the extractor, per profile type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileFieldConfig {
    pub student: Vec<String>,
    pub lecturer: Vec<String>,
}

impl Default for ProfileFieldConfig {
    fn default() -> Self {
        Self {
            student: STUDENT_FIELDS.iter().map(|f| f.to_string()).collect(),
            lecturer: LECTURER_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl ProfileFieldConfig {
    pub fn fields_for(&self, profile_type: ProfileType) -> &[String] {
        match profile_type {
            ProfileType::Student => &self.student,
            ProfileType::Lecturer => &self.lecturer,
        }
    }
}


/// Snapshot of matched concepts stored on the profile after extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OntologyExtract {
    pub concepts: Vec<ExtractedConcept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub extracted_at: DateTime<Utc>,
}

impl OntologyExtract {
    pub fn concept_keys(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().map(|c| c.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_type_strings() {
        assert_eq!(ProfileType::Lecturer.to_string(), "lecturer");
        assert_eq!("student".parse::<ProfileType>().unwrap(), ProfileType::Student);
        assert_eq!(serde_json::to_string(&ProfileType::Student).unwrap(), "\"student\"");
    }

    #[test]
    fn test_field_text_skips_blank_values() {
        let profile = Profile::new("s1", ProfileType::Student, "An")
            .with_field("skills", ["Python", "  ", "SQL"]);
        assert_eq!(profile.field_text("skills"), "Python, SQL");
        assert!(profile.has_text("skills"));
        assert!(!profile.has_text("interests"));
        assert!(profile.field("interests").is_empty());
    }

    #[test]
    fn test_default_fields() {
        let config = ProfileFieldConfig::default();
        assert_eq!(config.fields_for(ProfileType::Student), ["skills", "interests"]);
        assert_eq!(config.fields_for(ProfileType::Lecturer).len(), 3);
    }
}
