//! Adversarial Perturbation Engine (Fast Gradient Method)
//!
//! Displaces embedding parameters along their L2-normalized gradient
//! direction, runs a second forward/backward on the perturbed parameters,
//! and restores the originals, all within a single training step.
//!
//! Burn modules are value-threaded, so `attack` and `restore` take and
//! return the model the same way `Optimizer::step` does.

use std::collections::HashMap;

use burn::module::Param;
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

use crate::model::TextClassifier;

/// Default perturbation magnitude
pub const DEFAULT_EPSILON: f64 = 1.0;

/// Default target filter, matching the token embedding table's dotted name
pub const DEFAULT_TARGET: &str = "embeddings.token";

/// Dotted names of the perturbable parameters, mirroring the model's
/// embedding-layer field structure.
const EMBEDDING_PARAM_NAMES: [&str; 3] = [
    "embeddings.token.weight",
    "embeddings.position.weight",
    "embeddings.segment.weight",
];

/// Fast Gradient Method perturbation engine.
///
/// Holds the per-step backup of pre-attack parameter values, keyed by
/// parameter name. The backup is empty before an attack begins and is
/// cleared when `restore` completes; it never persists across steps.
pub struct Fgm<B: AutodiffBackend> {
    epsilon: f64,
    target: String,
    backup: HashMap<String, Tensor<B::InnerBackend, 2>>,
    armed: bool,
}

impl<B: AutodiffBackend> Fgm<B> {
    /// Create an engine with the given magnitude and name filter
    pub fn new(epsilon: f64, target: impl Into<String>) -> Self {
        Self {
            epsilon,
            target: target.into(),
            backup: HashMap::new(),
            armed: false,
        }
    }

    /// Engine with the original defaults (`epsilon = 1.0`, token embeddings)
    pub fn default_engine() -> Self {
        Self::new(DEFAULT_EPSILON, DEFAULT_TARGET)
    }

    /// Displace every matching embedding parameter by
    /// `epsilon * grad / ||grad||`, snapshotting pre-attack values.
    ///
    /// Parameters outside the target filter, or whose gradient is absent,
    /// zero-norm, or NaN, are left untouched and produce no backup entry.
    pub fn attack(
        &mut self,
        model: TextClassifier<B>,
        grads: &GradientsParams,
    ) -> TextClassifier<B> {
        assert!(
            self.backup.is_empty(),
            "attack called again before restore cleared the backup"
        );

        let mut model = model;
        model.embeddings.token.weight =
            self.attack_param(EMBEDDING_PARAM_NAMES[0], model.embeddings.token.weight, grads);
        model.embeddings.position.weight = self.attack_param(
            EMBEDDING_PARAM_NAMES[1],
            model.embeddings.position.weight,
            grads,
        );
        model.embeddings.segment.weight = self.attack_param(
            EMBEDDING_PARAM_NAMES[2],
            model.embeddings.segment.weight,
            grads,
        );

        self.armed = true;
        model
    }

    /// Overwrite every backed-up parameter with its pre-attack snapshot and
    /// clear the backup.
    ///
    /// Panics when called without a preceding `attack`: that is a caller
    /// ordering bug, not a recoverable runtime condition.
    pub fn restore(&mut self, model: TextClassifier<B>) -> TextClassifier<B> {
        assert!(self.armed, "restore called without a preceding attack");

        let mut model = model;
        model.embeddings.token.weight =
            self.restore_param(EMBEDDING_PARAM_NAMES[0], model.embeddings.token.weight);
        model.embeddings.position.weight =
            self.restore_param(EMBEDDING_PARAM_NAMES[1], model.embeddings.position.weight);
        model.embeddings.segment.weight =
            self.restore_param(EMBEDDING_PARAM_NAMES[2], model.embeddings.segment.weight);

        self.backup.clear();
        self.armed = false;
        model
    }

    /// Number of parameters currently backed up
    pub fn backup_len(&self) -> usize {
        self.backup.len()
    }

    fn attack_param(
        &mut self,
        name: &str,
        param: Param<Tensor<B, 2>>,
        grads: &GradientsParams,
    ) -> Param<Tensor<B, 2>> {
        if !name.contains(&self.target) {
            return param;
        }

        let Some(grad) = grads.get::<B::InnerBackend, 2>(param.id) else {
            return param;
        };

        let norm: f32 = grad
            .clone()
            .powf_scalar(2.0)
            .sum()
            .sqrt()
            .into_scalar()
            .elem();
        if norm == 0.0 || norm.is_nan() {
            return param;
        }

        self.backup.insert(name.to_string(), param.val().inner());

        let delta = grad.mul_scalar(self.epsilon / norm as f64);
        param.map(|weight| Tensor::from_inner(weight.inner() + delta).require_grad())
    }

    fn restore_param(&mut self, name: &str, param: Param<Tensor<B, 2>>) -> Param<Tensor<B, 2>> {
        match self.backup.remove(name) {
            Some(snapshot) => param.map(|_| Tensor::from_inner(snapshot).require_grad()),
            // Skipped during attack (filtered out or zero/NaN gradient)
            None => param,
        }
    }
}
