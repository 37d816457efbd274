//! Self-Training Orchestrator
//!
//! Repeats {train -> pseudo-label -> rank-and-migrate} for a fixed number
//! of rounds. Each round cold-restarts the model from the pretrained base
//! rather than continuing from the previous round's weights, so pseudo-label
//! noise is not compounded into the same parameters. The final round's best
//! checkpoint is the model evaluated on the held-out test set.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::features::EncodedFeature;
use crate::model::{TextClassifier, TextClassifierConfig};
use crate::training::adversarial::{DEFAULT_EPSILON, DEFAULT_TARGET};
use crate::training::evaluate::{evaluate, write_eval_report, EvalReport};
use crate::training::ranker::promote_confident;
use crate::training::scheduler::LinearWarmupSchedule;
use crate::training::trainer::{train_round, RunState};
use crate::utils::error::{Error, Result};
use crate::utils::metrics::F1Average;

/// Configuration for a full self-training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory for the checkpoint and the results file
    pub output_dir: PathBuf,
    /// Pretrained base parameters each round restarts from (fresh
    /// initialization when absent)
    pub base_model: Option<PathBuf>,
    /// Checkpoint from a prior run, loaded on the first round only
    pub resume_from: Option<PathBuf>,
    /// Number of self-training rounds
    pub rounds: usize,
    /// Maximum promotions per class and round
    pub num_k: usize,
    /// Training epochs per round
    pub epochs: usize,
    /// Mini-batch size for training
    pub train_batch_size: usize,
    /// Batch size for evaluation passes
    pub eval_batch_size: usize,
    /// Steps to accumulate gradients over before an optimizer update
    pub gradient_accumulation_steps: usize,
    /// Peak learning rate
    pub learning_rate: f64,
    /// Fraction of total steps spent on linear warmup
    pub warmup_proportion: f64,
    /// Enable FGM adversarial training
    pub adv_training: bool,
    /// FGM perturbation magnitude
    pub epsilon: f64,
    /// Substring filter selecting the perturbed embedding parameters
    pub target_filter: String,
    /// Random seed
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            base_model: None,
            resume_from: None,
            rounds: 6,
            num_k: 40,
            epochs: 3,
            train_batch_size: 32,
            eval_batch_size: 128,
            gradient_accumulation_steps: 1,
            learning_rate: 5e-5,
            warmup_proportion: 0.1,
            adv_training: false,
            epsilon: DEFAULT_EPSILON,
            target_filter: DEFAULT_TARGET.to_string(),
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Checkpoint record path (recorder appends its own extension)
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join("model")
    }

    /// Save the configuration to a JSON file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("cannot parse config: {}", e)))
    }

    /// Validate settings that must be rejected before any compute starts
    pub fn validate(&self) -> Result<()> {
        if self.gradient_accumulation_steps == 0 {
            return Err(Error::Config(
                "gradient_accumulation_steps must be >= 1".to_string(),
            ));
        }
        if self.train_batch_size == 0 {
            return Err(Error::Config("train_batch_size must be >= 1".to_string()));
        }
        if self.rounds == 0 {
            return Err(Error::Config("rounds must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// The labeled and unlabeled pools owned by the orchestrator.
///
/// Disjoint by example id at all times; migration replaces both vectors.
#[derive(Debug, Clone)]
pub struct Pools {
    pub labeled: Vec<EncodedFeature>,
    pub unlabeled: Vec<EncodedFeature>,
}

/// Run the full multi-round self-training loop.
///
/// Returns the final run state; the best checkpoint and the last
/// evaluation report are left in `config.output_dir`.
pub fn run_self_training<B: AutodiffBackend>(
    model_config: &TextClassifierConfig,
    config: &PipelineConfig,
    pools: Pools,
    dev: &[EncodedFeature],
    num_labels: usize,
    device: &B::Device,
) -> Result<RunState> {
    config.validate()?;

    std::fs::create_dir_all(&config.output_dir)?;
    config.save(&config.output_dir.join("run_config.json"))?;

    // The step budget is fixed by the initial labeled pool; later pool
    // growth does not re-scale the schedule.
    let steps_per_epoch = pools.labeled.len()
        / (config.train_batch_size * config.gradient_accumulation_steps).max(1);
    let total_steps = (steps_per_epoch * config.epochs).max(1);
    let schedule =
        LinearWarmupSchedule::new(config.learning_rate, config.warmup_proportion, total_steps);

    let mut state = RunState::new();
    let mut pools = pools;

    for round in 0..config.rounds {
        state.begin_round();

        info!(
            "===== Self-training round {}/{} =====",
            round + 1,
            config.rounds
        );
        info!(
            "  labeled = {}, unlabeled = {}",
            pools.labeled.len(),
            pools.unlabeled.len()
        );

        // Cold restart from the pretrained base; a resume checkpoint is
        // honored on the first round only
        let base = if round == 0 {
            config
                .resume_from
                .as_deref()
                .or(config.base_model.as_deref())
        } else {
            config.base_model.as_deref()
        };
        let model = TextClassifier::<B>::from_pretrained(model_config, base, device)?;

        let model = train_round(
            model,
            &pools.labeled,
            dev,
            config,
            &schedule,
            &mut state,
            round,
            device,
        )?;

        if round + 1 != config.rounds {
            let inner_device = <B::InnerBackend as Backend>::Device::default();
            let report = evaluate(
                &model.valid(),
                &pools.unlabeled,
                config.eval_batch_size,
                F1Average::Micro,
                &inner_device,
            );
            write_eval_report(&config.output_dir, &report, &state)?;

            let before = pools.labeled.len();
            let (labeled, unlabeled) = promote_confident(
                pools.labeled,
                pools.unlabeled,
                num_labels,
                &report.records,
                config.num_k,
            );
            info!(
                "  migrated {} examples into the labeled pool",
                labeled.len() - before
            );
            pools = Pools { labeled, unlabeled };
        }
    }

    Ok(state)
}

/// Reload the best checkpoint and evaluate the held-out test set.
///
/// Self-training is disabled for this pass: prediction records are
/// produced but feed no ranking.
pub fn run_final_evaluation<B: AutodiffBackend>(
    model_config: &TextClassifierConfig,
    config: &PipelineConfig,
    test: &[EncodedFeature],
    state: &mut RunState,
    _device: &B::Device,
) -> Result<EvalReport> {
    state.begin_round();

    let inner_device = <B::InnerBackend as Backend>::Device::default();
    let model = TextClassifier::<B::InnerBackend>::from_pretrained(
        model_config,
        Some(&config.checkpoint_path()),
        &inner_device,
    )?;

    let report = evaluate(
        &model,
        test,
        config.eval_batch_size,
        F1Average::Micro,
        &inner_device,
    );
    write_eval_report(&config.output_dir, &report, state)?;

    Ok(report)
}
