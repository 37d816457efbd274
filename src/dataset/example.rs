//! Raw text examples as parsed from the task's delimited data files.

use serde::{Deserialize, Serialize};

/// A single training/evaluation example for sequence classification.
///
/// Examples are created when a dataset file is parsed and consumed by
/// feature encoding. An example is never destroyed, only moved between the
/// labeled and unlabeled pools by the self-training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    /// Unique id for the example within its split, e.g. `train-42`
    pub guid: String,
    /// The untokenized text of the first sequence
    pub text_a: String,
    /// Optional second sequence for pair tasks
    pub text_b: Option<String>,
    /// Label string; present for all splits here, but the unlabeled pool's
    /// labels are treated as hidden ground truth and are never trained on
    pub label: Option<String>,
}

impl Example {
    /// Create a single-sequence example
    pub fn new(guid: impl Into<String>, text_a: impl Into<String>, label: Option<String>) -> Self {
        Self {
            guid: guid.into(),
            text_a: text_a.into(),
            text_b: None,
            label,
        }
    }

    /// Create a sequence-pair example
    pub fn new_pair(
        guid: impl Into<String>,
        text_a: impl Into<String>,
        text_b: impl Into<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            text_a: text_a.into(),
            text_b: Some(text_b.into()),
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_new() {
        let ex = Example::new("train-0", "some text", Some("CCAT".to_string()));
        assert_eq!(ex.guid, "train-0");
        assert!(ex.text_b.is_none());
        assert_eq!(ex.label.as_deref(), Some("CCAT"));
    }

    #[test]
    fn test_example_pair() {
        let ex = Example::new_pair("dev-1", "premise", "hypothesis", None);
        assert_eq!(ex.text_b.as_deref(), Some("hypothesis"));
        assert!(ex.label.is_none());
    }
}
