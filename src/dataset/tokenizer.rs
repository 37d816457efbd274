//! Tokenizer Collaborator
//!
//! The pipeline consumes tokenization through a narrow interface: split
//! text into tokens and map tokens to vocabulary ids. The production
//! implementation wraps a HuggingFace `tokenizers` vocabulary loaded from a
//! `tokenizer.json` file.

use std::path::Path;

use crate::utils::error::{Error, Result};

/// Classification token prepended to every sequence
pub const CLS_TOKEN: &str = "[CLS]";
/// Separator token terminating each text span
pub const SEP_TOKEN: &str = "[SEP]";
/// Padding token
pub const PAD_TOKEN: &str = "[PAD]";
/// Unknown-word token
pub const UNK_TOKEN: &str = "[UNK]";

/// Narrow tokenization interface consumed by feature encoding.
pub trait TextTokenizer {
    /// Split raw text into vocabulary tokens
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Map tokens to vocabulary ids; unknown tokens map to the `[UNK]` id
    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Vec<i32>;
}

/// Vocabulary-backed tokenizer wrapping `tokenizers::Tokenizer`.
#[derive(Debug)]
pub struct VocabTokenizer {
    inner: tokenizers::Tokenizer,
    unk_id: i32,
    pad_id: i32,
}

impl VocabTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::Tokenizer(format!("cannot load tokenizer from '{}': {}", path.display(), e))
        })?;

        let unk_id = inner
            .token_to_id(UNK_TOKEN)
            .ok_or_else(|| Error::Tokenizer(format!("vocabulary has no {} token", UNK_TOKEN)))?
            as i32;
        let pad_id = inner.token_to_id(PAD_TOKEN).unwrap_or(0) as i32;

        Ok(Self { inner, unk_id, pad_id })
    }

    /// Size of the underlying vocabulary, including added special tokens
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Id of the padding token
    pub fn pad_id(&self) -> i32 {
        self.pad_id
    }
}

impl TextTokenizer for VocabTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::Tokenizer(format!("failed to tokenize text: {}", e)))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn convert_tokens_to_ids(&self, tokens: &[String]) -> Vec<i32> {
        tokens
            .iter()
            .map(|t| self.inner.token_to_id(t).map(|id| id as i32).unwrap_or(self.unk_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal word-level tokenizer JSON on disk and load it.
    pub(crate) fn word_level_tokenizer(words: &[&str]) -> (tempfile::TempDir, VocabTokenizer) {
        let dir = tempfile::tempdir().unwrap();

        let mut vocab = serde_json::json!({
            "[PAD]": 0,
            "[UNK]": 1,
            "[CLS]": 2,
            "[SEP]": 3,
        });
        let mut next_id = 4usize;
        for &word in words {
            if vocab.get(word).is_none() {
                vocab[word] = serde_json::json!(next_id);
                next_id += 1;
            }
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": 0, "content": "[PAD]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 1, "content": "[UNK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 2, "content": "[CLS]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": 3, "content": "[SEP]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json).unwrap()).unwrap();

        let tokenizer = VocabTokenizer::from_file(&path).unwrap();
        (dir, tokenizer)
    }

    #[test]
    fn test_tokenize_and_convert() {
        let (_dir, tokenizer) = word_level_tokenizer(&["markets", "rallied"]);

        let tokens = tokenizer.tokenize("markets rallied").unwrap();
        assert_eq!(tokens, vec!["markets", "rallied"]);

        let ids = tokenizer.convert_tokens_to_ids(&tokens);
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_unknown_token_maps_to_unk() {
        let (_dir, tokenizer) = word_level_tokenizer(&["known"]);

        let tokens = tokenizer.tokenize("known unknown").unwrap();
        let ids = tokenizer.convert_tokens_to_ids(&tokens);
        assert_eq!(ids[0], 4);
        assert_eq!(ids[1], 1); // [UNK]
    }

    #[test]
    fn test_vocab_size_and_pad() {
        let (_dir, tokenizer) = word_level_tokenizer(&["a", "b"]);
        assert_eq!(tokenizer.vocab_size(), 6);
        assert_eq!(tokenizer.pad_id(), 0);
    }

    #[test]
    fn test_missing_file() {
        let err = VocabTokenizer::from_file(Path::new("/nonexistent/tokenizer.json")).unwrap_err();
        assert!(matches!(err, Error::Tokenizer(_)));
    }
}
