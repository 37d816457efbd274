//! Training Loop
//!
//! One self-training round of supervised fine-tuning: shuffled mini-batches
//! with gradient accumulation, optional FGM adversarial perturbation per
//! step, a linear warmup/decay learning rate, and checkpointing of the best
//! validation accuracy seen so far.

use std::path::Path;

use burn::module::{AutodiffModule, Module};
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsAccumulator, GradientsParams, Optimizer};
use burn::record::CompactRecorder;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use indicatif::ProgressBar;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::batcher::FeatureBatcher;
use crate::dataset::features::EncodedFeature;
use crate::model::TextClassifier;
use crate::training::adversarial::Fgm;
use crate::training::evaluate::evaluate;
use crate::training::scheduler::LinearWarmupSchedule;
use crate::training::self_training::PipelineConfig;
use crate::utils::error::{Error, Result};
use crate::utils::metrics::F1Average;

/// Mutable state threaded through the training loop and orchestrator.
///
/// Replaces an implicit global: the loop reads and updates this record
/// explicitly, and the best-accuracy watermark is the only field that
/// survives from one self-training round to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Optimizer steps taken in the current round
    pub global_step: usize,
    /// Sum of per-step training losses in the current round
    pub running_loss: f64,
    /// Denominator for the mean training loss
    pub loss_steps: usize,
    /// Best validation accuracy seen across the whole run
    pub best_accuracy: f64,
}

impl RunState {
    /// Fresh state at the start of a run
    pub fn new() -> Self {
        Self {
            global_step: 0,
            running_loss: 0.0,
            // Starts at 1 so eval-only paths report a finite mean loss
            loss_steps: 1,
            best_accuracy: 0.0,
        }
    }

    /// Reset the per-round counters, keeping the accuracy watermark
    pub fn begin_round(&mut self) {
        self.global_step = 0;
        self.running_loss = 0.0;
        self.loss_steps = 1;
    }

    /// Mean training loss over the current round
    pub fn mean_train_loss(&self) -> f64 {
        self.running_loss / self.loss_steps as f64
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one round of supervised training over the labeled pool.
///
/// Validates against `dev` at every epoch end; when accuracy exceeds the
/// watermark, the checkpoint is persisted and the watermark raised. The
/// model is returned for the round's pseudo-labeling pass.
pub fn train_round<B: AutodiffBackend>(
    model: TextClassifier<B>,
    labeled: &[EncodedFeature],
    dev: &[EncodedFeature],
    config: &PipelineConfig,
    schedule: &LinearWarmupSchedule,
    state: &mut RunState,
    round: usize,
    device: &B::Device,
) -> Result<TextClassifier<B>> {
    if labeled.is_empty() {
        return Err(Error::Training("labeled pool is empty".to_string()));
    }

    info!("***** Running training *****");
    info!("  Num examples = {}", labeled.len());
    info!("  Batch size = {}", config.train_batch_size);
    info!("  Num steps = {}", schedule.total_steps());

    let batcher = FeatureBatcher::<B>::new(device.clone());
    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(1e-2f32)))
        .init();
    let mut accumulator = GradientsAccumulator::new();
    let mut fgm: Option<Fgm<B>> = config
        .adv_training
        .then(|| Fgm::new(config.epsilon, config.target_filter.clone()));

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(round as u64));
    let mut model = model;

    for epoch in 0..config.epochs {
        let mut indices: Vec<usize> = (0..labeled.len()).collect();
        indices.shuffle(&mut rng);

        let num_batches = (indices.len() + config.train_batch_size - 1) / config.train_batch_size;
        let progress = ProgressBar::new(num_batches as u64);
        progress.set_message(format!("epoch {}/{}", epoch + 1, config.epochs));

        for (step, batch_indices) in indices.chunks(config.train_batch_size).enumerate() {
            let items: Vec<EncodedFeature> = batch_indices
                .iter()
                .map(|&i| labeled[i].clone())
                .collect();
            let batch = batcher.batch(&items);

            // Clean forward/backward
            let output = model.compute_loss(&batch);
            let mut loss = output.loss;
            if config.gradient_accumulation_steps > 1 {
                loss = loss.div_scalar(config.gradient_accumulation_steps as f32);
            }
            let loss_value: f64 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);

            if let Some(engine) = fgm.as_mut() {
                model = engine.attack(model, &grads);
            }
            accumulator.accumulate(&model, grads);

            // Adversarial forward/backward on the perturbed parameters;
            // its gradients land in the same optimizer step
            if let Some(engine) = fgm.as_mut() {
                let adv_output = model.compute_loss(&batch);
                let adv_grads = adv_output.loss.backward();
                let adv_grads = GradientsParams::from_grads(adv_grads, &model);
                accumulator.accumulate(&model, adv_grads);
                model = engine.restore(model);
            }

            state.running_loss += loss_value;
            state.loss_steps += 1;

            if (step + 1) % config.gradient_accumulation_steps == 0 {
                let lr = schedule.lr_at(state.global_step);
                let grads = accumulator.grads();
                model = optimizer.step(lr, model, grads);
                state.global_step += 1;
            }

            progress.inc(1);
        }
        progress.finish_and_clear();

        // Validation at every epoch end
        let inner_device = <B::InnerBackend as Backend>::Device::default();
        let report = evaluate(
            &model.valid(),
            dev,
            config.eval_batch_size,
            F1Average::Macro,
            &inner_device,
        );

        info!(
            "epoch {}/{}: train_loss = {:.4}, val_acc = {:.4}",
            epoch + 1,
            config.epochs,
            state.mean_train_loss(),
            report.accuracy
        );

        if report.accuracy > state.best_accuracy {
            info!(
                "new best accuracy: {:.4} -> {:.4}",
                state.best_accuracy, report.accuracy
            );
            state.best_accuracy = report.accuracy;
            save_checkpoint(&model, &config.checkpoint_path())?;
        }
    }

    Ok(model)
}

/// Persist model parameters to checkpoint storage.
pub fn save_checkpoint<B: Backend>(model: &TextClassifier<B>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let recorder = CompactRecorder::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| Error::Model(format!("failed to save checkpoint: {:?}", e)))?;

    info!("checkpoint saved to {:?}", path);
    Ok(())
}
