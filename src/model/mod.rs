//! Model architecture built with Burn.

pub mod classifier;

pub use classifier::{
    EmbeddingLayer, LossOutput, PredictOutput, TextClassifier, TextClassifierConfig,
};
