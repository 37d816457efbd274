//! # Cross-Lingual Semi-Supervised Text Classification
//!
//! Semi-supervised fine-tuning of a transformer text classifier with the
//! Burn framework, combining:
//!
//! - **Adversarial training**: FGM perturbation of embedding parameters
//!   during training for robustness
//! - **Self-training**: iterative promotion of high-confidence predictions
//!   on unlabeled target-language/domain data into the labeled pool
//! - **Supervised fine-tuning** with a linear warmup/decay learning rate
//!
//! ## Modules
//!
//! - `dataset`: task processors, tokenization, feature encoding, batching
//! - `model`: transformer classifier built with Burn
//! - `training`: training loop, FGM engine, confidence ranker, orchestrator
//! - `utils`: logging, metrics, and error types

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{
    convert_examples_to_features, make_processor, DataProcessor, EncodedFeature, Example,
    FeatureBatch, FeatureBatcher, TextTokenizer, VocabTokenizer,
};
pub use model::{TextClassifier, TextClassifierConfig};
pub use training::{
    run_final_evaluation, run_self_training, EvalReport, Fgm, PipelineConfig, Pools,
    PredictionRecord, RunState,
};
pub use utils::{Error, F1Average, Metrics, Result};

/// Default maximum input sequence length
pub const DEFAULT_MAX_SEQ_LENGTH: usize = 128;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
