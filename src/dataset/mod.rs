//! Dataset loading, tokenization, feature encoding, and batching.

pub mod batcher;
pub mod example;
pub mod features;
pub mod processor;
pub mod tokenizer;

pub use batcher::{FeatureBatch, FeatureBatcher};
pub use example::Example;
pub use features::{convert_examples_to_features, EncodedFeature};
pub use processor::{make_processor, DataProcessor, NewsProcessor, ReviewsProcessor, TASK_NAMES};
pub use tokenizer::{TextTokenizer, VocabTokenizer};
