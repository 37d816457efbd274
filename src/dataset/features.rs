//! Feature Encoding
//!
//! Converts raw [`Example`]s into fixed-length [`EncodedFeature`]s: token
//! ids, attention mask, and segment ids, all padded or truncated to the
//! configured maximum sequence length.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::example::Example;
use crate::dataset::tokenizer::{TextTokenizer, CLS_TOKEN, SEP_TOKEN};
use crate::utils::error::{Error, Result};

/// A single encoded input for the classifier.
///
/// All three sequences are exactly the configured maximum sequence length.
/// Apart from `label_id`, which the confidence ranker overwrites when an
/// example is promoted into the labeled pool, a feature is immutable after
/// encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedFeature {
    /// Id carried over from the source example
    pub guid: String,
    /// Vocabulary ids, `[CLS] a [SEP]` or `[CLS] a [SEP] b [SEP]`, padded
    pub input_ids: Vec<i32>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<i32>,
    /// 0 for the first span (and padding), 1 for the second span
    pub segment_ids: Vec<i32>,
    /// Label index into the task's label vocabulary
    pub label_id: usize,
}

/// Convert examples into encoded features.
///
/// The label vocabulary defines the label-to-index mapping; an example with
/// a label outside the vocabulary (or with no label at all) is a dataset
/// error.
pub fn convert_examples_to_features(
    examples: &[Example],
    label_list: &[String],
    max_seq_length: usize,
    tokenizer: &dyn TextTokenizer,
) -> Result<Vec<EncodedFeature>> {
    let label_map: HashMap<&str, usize> = label_list
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect();

    let mut features = Vec::with_capacity(examples.len());
    for (ex_index, example) in examples.iter().enumerate() {
        let mut tokens_a = tokenizer.tokenize(&example.text_a)?;

        let mut tokens_b = match &example.text_b {
            Some(text_b) => Some(tokenizer.tokenize(text_b)?),
            None => None,
        };

        match tokens_b.as_mut() {
            Some(tokens_b) => {
                // Account for [CLS], [SEP], [SEP] with "- 3"
                truncate_seq_pair(&mut tokens_a, tokens_b, max_seq_length.saturating_sub(3));
            }
            None => {
                // Account for [CLS] and [SEP] with "- 2"
                tokens_a.truncate(max_seq_length.saturating_sub(2));
            }
        }

        let mut tokens: Vec<String> = Vec::with_capacity(max_seq_length);
        tokens.push(CLS_TOKEN.to_string());
        tokens.extend(tokens_a);
        tokens.push(SEP_TOKEN.to_string());
        let mut segment_ids = vec![0i32; tokens.len()];

        if let Some(tokens_b) = tokens_b {
            let b_len = tokens_b.len() + 1;
            tokens.extend(tokens_b);
            tokens.push(SEP_TOKEN.to_string());
            segment_ids.extend(std::iter::repeat(1i32).take(b_len));
        }

        let mut input_ids = tokenizer.convert_tokens_to_ids(&tokens);
        let mut attention_mask = vec![1i32; input_ids.len()];

        // Zero-pad up to the sequence length
        input_ids.resize(max_seq_length, 0);
        attention_mask.resize(max_seq_length, 0);
        segment_ids.resize(max_seq_length, 0);

        assert_eq!(input_ids.len(), max_seq_length);
        assert_eq!(attention_mask.len(), max_seq_length);
        assert_eq!(segment_ids.len(), max_seq_length);

        let label = example.label.as_deref().ok_or_else(|| {
            Error::Dataset(format!("example '{}' has no label", example.guid))
        })?;
        let label_id = *label_map.get(label).ok_or_else(|| {
            Error::Dataset(format!(
                "example '{}' has label '{}' outside the vocabulary",
                example.guid, label
            ))
        })?;

        if ex_index < 3 {
            debug!("*** Example ***");
            debug!("guid: {}", example.guid);
            debug!("tokens: {}", tokens.join(" "));
            debug!("label: {} (id = {})", label, label_id);
        }

        features.push(EncodedFeature {
            guid: example.guid.clone(),
            input_ids,
            attention_mask,
            segment_ids,
            label_id,
        });
    }

    Ok(features)
}

/// Truncate a sequence pair in place to a total maximum length.
///
/// Always trims the longer sequence one token at a time, so a short span
/// keeps its information while a long one loses its tail.
fn truncate_seq_pair(tokens_a: &mut Vec<String>, tokens_b: &mut Vec<String>, max_length: usize) {
    while tokens_a.len() + tokens_b.len() > max_length {
        if tokens_a.len() > tokens_b.len() {
            tokens_a.pop();
        } else {
            tokens_b.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Whitespace tokenizer with a fixed tiny vocabulary, for tests only.
    struct StubTokenizer;

    impl TextTokenizer for StubTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<String>> {
            Ok(text.split_whitespace().map(str::to_string).collect())
        }

        fn convert_tokens_to_ids(&self, tokens: &[String]) -> Vec<i32> {
            tokens
                .iter()
                .map(|t| match t.as_str() {
                    "[CLS]" => 2,
                    "[SEP]" => 3,
                    other => 4 + (other.len() as i32 % 10),
                })
                .collect()
        }
    }

    fn labels() -> Vec<String> {
        vec!["CCAT".to_string(), "ECAT".to_string()]
    }

    #[test]
    fn test_single_sequence_encoding() {
        let examples = vec![Example::new("t-0", "markets rallied", Some("CCAT".into()))];
        let features =
            convert_examples_to_features(&examples, &labels(), 8, &StubTokenizer).unwrap();

        let f = &features[0];
        assert_eq!(f.input_ids.len(), 8);
        assert_eq!(f.attention_mask.len(), 8);
        assert_eq!(f.segment_ids.len(), 8);
        // [CLS] markets rallied [SEP] then padding
        assert_eq!(f.input_ids[0], 2);
        assert_eq!(f.input_ids[3], 3);
        assert_eq!(f.attention_mask, vec![1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(f.label_id, 0);
    }

    #[test]
    fn test_long_sequence_truncated() {
        let text = (0..50).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let examples = vec![Example::new("t-0", text, Some("ECAT".into()))];
        let features =
            convert_examples_to_features(&examples, &labels(), 16, &StubTokenizer).unwrap();

        let f = &features[0];
        assert_eq!(f.input_ids.len(), 16);
        // Fully occupied: no padding after truncation
        assert!(f.attention_mask.iter().all(|&m| m == 1));
        assert_eq!(f.input_ids[15], 3); // final [SEP] kept
    }

    #[test]
    fn test_pair_encoding_segments() {
        let examples = vec![Example::new_pair("t-0", "a b", "c d e", Some("CCAT".into()))];
        let features =
            convert_examples_to_features(&examples, &labels(), 12, &StubTokenizer).unwrap();

        let f = &features[0];
        // [CLS] a b [SEP] -> segment 0 (4 tokens); c d e [SEP] -> segment 1 (4 tokens)
        assert_eq!(&f.segment_ids[..8], &[0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(&f.segment_ids[8..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_pair_truncation_trims_longer_side() {
        let mut a: Vec<String> = (0..10).map(|i| format!("a{}", i)).collect();
        let mut b: Vec<String> = (0..3).map(|i| format!("b{}", i)).collect();
        truncate_seq_pair(&mut a, &mut b, 8);
        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_unknown_label_is_error() {
        let examples = vec![Example::new("t-0", "text", Some("BOGUS".into()))];
        let err =
            convert_examples_to_features(&examples, &labels(), 8, &StubTokenizer).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_missing_label_is_error() {
        let examples = vec![Example::new("t-0", "text", None)];
        let err =
            convert_examples_to_features(&examples, &labels(), 8, &StubTokenizer).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }
}
