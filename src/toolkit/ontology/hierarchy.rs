use super::index::ConceptIndex;
use super::models::{parent_key, Concept};


pub struct HierarchyTraverser<'a> {
    index: &'a ConceptIndex,
}

impl<'a> HierarchyTraverser<'a> {
    pub fn new(index: &'a ConceptIndex) -> Self {
        Self { index }
    }

    /// Nearest first. Missing intermediate keys are skipped.
    pub fn ancestors(&self, key: &str) -> Vec<&'a Concept> {
        let mut ancestors = Vec::new();
        let mut current = parent_key(key);
        while let Some(k) = current {
            if let Some(concept) = self.index.concept(k) {
                ancestors.push(concept);
            }
            current = parent_key(k);
        }
        ancestors
    }

    pub fn children(&self, key: &str) -> Vec<&'a Concept> {
        self.index
            .concepts()
            .filter(|c| parent_key(&c.key) == Some(key))
            .collect()
    }

    /// Labels from the root down to `key`, e.g. `IT > AI > NLP`.
    pub fn breadcrumb(&self, key: &str) -> Vec<String> {
        let mut labels: Vec<String> = self
            .ancestors(key)
            .into_iter()
            .rev()
            .map(|c| c.label.clone())
            .collect();
        if let Some(concept) = self.index.concept(key) {
            labels.push(concept.label.clone());
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ConceptIndex {
        ConceptIndex::build(vec![
            Concept::new("it", "IT", vec![]),
            Concept::new("it.ai", "AI", vec![]),
            Concept::new("it.ai.nlp", "NLP", vec![]),
            Concept::new("it.ai.nlp.parsing", "Parsing", vec![]),
            Concept::new("it.ai.vision", "Vision", vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn test_ancestors_and_breadcrumb() {
        let index = index();
        let traverser = HierarchyTraverser::new(&index);
        let ancestors: Vec<&str> = traverser
            .ancestors("it.ai.nlp.parsing")
            .iter()
            .map(|c| c.key.as_str())
            .collect();
        assert_eq!(ancestors, vec!["it.ai.nlp", "it.ai", "it"]);
        assert_eq!(
            traverser.breadcrumb("it.ai.nlp.parsing"),
            vec!["IT", "AI", "NLP", "Parsing"]
        );
    }

    #[test]
    fn test_children() {
        let index = index();
        let traverser = HierarchyTraverser::new(&index);
        let children: Vec<&str> = traverser.children("it.ai").iter().map(|c| c.key.as_str()).collect();
        assert_eq!(children, vec!["it.ai.nlp", "it.ai.vision"]);
        assert!(traverser.children("it.ai.vision").is_empty());
    }
}
