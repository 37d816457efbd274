//! Evaluation / Pseudo-labeling Pass
//!
//! Runs the classifier over a feature set in inference mode, computing
//! aggregate loss, accuracy, and F1, and producing one prediction record
//! per example. When self-training is active, the records feed the
//! confidence ranker; otherwise they are only reported.

use std::collections::BTreeMap;
use std::path::Path;

use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::activation::softmax;
use burn::tensor::{backend::Backend, ElementConversion};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::batcher::FeatureBatcher;
use crate::dataset::features::EncodedFeature;
use crate::model::TextClassifier;
use crate::training::trainer::RunState;
use crate::utils::error::Result;
use crate::utils::metrics::{F1Average, Metrics};

/// Per-example prediction produced by an evaluation pass.
///
/// Carries identifier, class probabilities, argmax label, and confidence
/// together, so downstream consumers never have to re-align parallel
/// arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Identifier of the evaluated example
    pub guid: String,
    /// Softmax probabilities over the label vocabulary
    pub probabilities: Vec<f32>,
    /// Argmax label index
    pub predicted: usize,
    /// Maximum softmax probability
    pub confidence: f32,
}

/// Aggregate result of one evaluation pass
#[derive(Debug, Clone)]
pub struct EvalReport {
    /// Mean loss per batch
    pub loss: f64,
    /// Fraction of argmax-matching predictions
    pub accuracy: f64,
    /// F1 score under the averaging requested by the call site
    pub f1: f64,
    /// One record per evaluated example, in input order
    pub records: Vec<PredictionRecord>,
}

/// Run the model over `features` in sequential batches.
///
/// The model is expected to be the inference-mode (`valid`) module; this
/// pass never mutates parameters.
pub fn evaluate<B: Backend>(
    model: &TextClassifier<B>,
    features: &[EncodedFeature],
    batch_size: usize,
    f1_average: F1Average,
    device: &B::Device,
) -> EvalReport {
    let batcher = FeatureBatcher::<B>::new(device.clone());
    let num_classes = model.num_classes();

    let mut total_loss = 0.0f64;
    let mut batch_count = 0usize;
    let mut predictions: Vec<usize> = Vec::with_capacity(features.len());
    let mut ground_truth: Vec<usize> = Vec::with_capacity(features.len());
    let mut records: Vec<PredictionRecord> = Vec::with_capacity(features.len());

    info!("***** Running evaluation *****");
    info!("  Num examples = {}", features.len());
    info!("  Batch size = {}", batch_size);

    for chunk in features.chunks(batch_size.max(1)) {
        let batch = batcher.batch(chunk);
        let output = model.predict(&batch);

        let loss = CrossEntropyLossConfig::new()
            .init(&output.logits.device())
            .forward(output.logits.clone(), batch.targets.clone());
        let loss_value: f64 = loss.into_scalar().elem();
        total_loss += loss_value;
        batch_count += 1;

        let probs = softmax(output.logits, 1);

        let predicted = probs.clone().argmax(1).squeeze::<1>(1);
        let predicted: Vec<i64> = predicted.into_data().to_vec().unwrap();

        let confidences = probs.clone().max_dim(1).squeeze::<1>(1);
        let confidences: Vec<f32> = confidences.into_data().to_vec().unwrap();

        let prob_rows: Vec<f32> = probs.into_data().to_vec().unwrap();

        for (i, feature) in chunk.iter().enumerate() {
            let label = predicted[i] as usize;
            predictions.push(label);
            ground_truth.push(feature.label_id);
            records.push(PredictionRecord {
                guid: feature.guid.clone(),
                probabilities: prob_rows[i * num_classes..(i + 1) * num_classes].to_vec(),
                predicted: label,
                confidence: confidences[i],
            });
        }
    }

    let metrics = Metrics::from_predictions(&predictions, &ground_truth, num_classes);
    let loss = if batch_count > 0 {
        total_loss / batch_count as f64
    } else {
        0.0
    };

    info!(
        "  loss = {:.4}, acc = {:.4}, f1 = {:.4}",
        loss,
        metrics.accuracy,
        metrics.f1(f1_average)
    );

    EvalReport {
        loss,
        accuracy: metrics.accuracy,
        f1: metrics.f1(f1_average),
        records,
    }
}

/// Persist an evaluation summary as sorted `key = value` lines.
///
/// Written after every evaluation pass; an unwritable target directory is
/// fatal for the run.
pub fn write_eval_report(output_dir: &Path, report: &EvalReport, state: &RunState) -> Result<()> {
    let mut result: BTreeMap<&str, String> = BTreeMap::new();
    result.insert("eval_accuracy", format!("{}", report.accuracy));
    result.insert("eval_loss", format!("{}", report.loss));
    result.insert("f1", format!("{}", report.f1));
    result.insert("global_step", format!("{}", state.global_step));
    result.insert("loss", format!("{}", state.mean_train_loss()));

    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("eval_results.txt");

    let mut content = String::new();
    info!("***** Eval results *****");
    for (key, value) in &result {
        info!("  {} = {}", key, value);
        content.push_str(&format!("{} = {}\n", key, value));
    }

    std::fs::write(&path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextClassifierConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> TextClassifier<TestBackend> {
        let config = TextClassifierConfig::new(32)
            .with_max_seq_length(8)
            .with_num_classes(3)
            .with_d_model(16)
            .with_d_ff(32)
            .with_n_heads(2)
            .with_n_layers(1);
        TextClassifier::new(&config, device)
    }

    fn tiny_features(n: usize) -> Vec<EncodedFeature> {
        (0..n)
            .map(|i| EncodedFeature {
                guid: format!("uns-{}", i),
                input_ids: vec![2, 4 + (i as i32 % 20), 3, 0, 0, 0, 0, 0],
                attention_mask: vec![1, 1, 1, 0, 0, 0, 0, 0],
                segment_ids: vec![0; 8],
                label_id: i % 3,
            })
            .collect()
    }

    #[test]
    fn test_evaluate_produces_one_record_per_example() {
        let device = Default::default();
        let model = tiny_model(&device);
        let features = tiny_features(5);

        let report = evaluate(&model, &features, 2, F1Average::Micro, &device);

        assert_eq!(report.records.len(), 5);
        assert_eq!(report.records[0].guid, "uns-0");
        assert!(report.loss.is_finite());
        assert!(report.accuracy >= 0.0 && report.accuracy <= 1.0);
    }

    #[test]
    fn test_record_confidence_matches_probabilities() {
        let device = Default::default();
        let model = tiny_model(&device);
        let features = tiny_features(3);

        let report = evaluate(&model, &features, 3, F1Average::Macro, &device);

        for record in &report.records {
            assert_eq!(record.probabilities.len(), 3);
            let max = record
                .probabilities
                .iter()
                .cloned()
                .fold(f32::MIN, f32::max);
            assert!((record.confidence - max).abs() < 1e-6);
            assert_eq!(
                record.predicted,
                record
                    .probabilities
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                    .map(|(i, _)| i)
                    .unwrap()
            );
            // Softmax rows sum to one
            let sum: f32 = record.probabilities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_write_eval_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = EvalReport {
            loss: 0.5,
            accuracy: 0.75,
            f1: 0.7,
            records: Vec::new(),
        };
        let state = RunState::new();

        write_eval_report(dir.path(), &report, &state).unwrap();

        let content = std::fs::read_to_string(dir.path().join("eval_results.txt")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("eval_accuracy = "));
        assert!(lines[1].starts_with("eval_loss = "));
        assert!(lines[2].starts_with("f1 = "));
        assert!(lines[3].starts_with("global_step = "));
        assert!(lines[4].starts_with("loss = "));
    }

    #[test]
    fn test_write_eval_report_unwritable_dir_fails() {
        let report = EvalReport {
            loss: 0.0,
            accuracy: 0.0,
            f1: 0.0,
            records: Vec::new(),
        };
        let state = RunState::new();

        let err = write_eval_report(Path::new("/proc/no-such-dir"), &report, &state);
        assert!(err.is_err());
    }
}
