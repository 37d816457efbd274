//! Training: adversarial perturbation, scheduling, evaluation,
//! confidence ranking, and the self-training control loop.
//!
//! ## Pipeline
//!
//! 1. Fine-tune the classifier on the labeled pool (optionally with FGM
//!    adversarial perturbation of the embedding parameters).
//! 2. Evaluate the unlabeled pool, producing per-example predictions with
//!    confidences.
//! 3. Promote the top-k most confident predictions per class into the
//!    labeled pool.
//! 4. Repeat from a cold restart for a fixed number of rounds, then report
//!    the best checkpoint's test accuracy.

pub mod adversarial;
pub mod evaluate;
pub mod ranker;
pub mod scheduler;
pub mod self_training;
pub mod trainer;

pub use adversarial::{Fgm, DEFAULT_EPSILON, DEFAULT_TARGET};
pub use evaluate::{evaluate, write_eval_report, EvalReport, PredictionRecord};
pub use ranker::{promote_confident, remove_indices};
pub use scheduler::{warmup_linear, LinearWarmupSchedule};
pub use self_training::{run_final_evaluation, run_self_training, PipelineConfig, Pools};
pub use trainer::{save_checkpoint, train_round, RunState};
