//! Semi-Supervised Cross-Lingual Fine-Tuning CLI
//!
//! Entry point wiring the task processors, tokenizer, and model into the
//! self-training pipeline.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::info;

use crosslingual_ssl::backend::{backend_name, default_device, TrainingBackend};
use crosslingual_ssl::dataset::{
    convert_examples_to_features, make_processor, TASK_NAMES, VocabTokenizer,
};
use crosslingual_ssl::model::TextClassifierConfig;
use crosslingual_ssl::training::{
    run_final_evaluation, run_self_training, PipelineConfig, Pools, RunState,
};
use crosslingual_ssl::utils::error::Error;
use crosslingual_ssl::utils::logging::{init_logging, LogConfig};

use burn::tensor::backend::Backend;

/// Semi-supervised cross-lingual text classification
///
/// Fine-tunes a transformer classifier on labeled source-language data,
/// then iteratively self-trains on unlabeled target data, optionally with
/// FGM adversarial perturbation of the embeddings.
#[derive(Parser, Debug)]
#[command(name = "crosslingual_ssl")]
#[command(version)]
#[command(about = "Semi-supervised cross-lingual fine-tuning with Burn", long_about = None)]
struct Cli {
    /// Input data directory containing the task's delimited text files
    #[arg(long)]
    data_dir: String,

    /// Path to the tokenizer.json vocabulary file
    #[arg(long)]
    tokenizer: String,

    /// Task name
    #[arg(long)]
    task_name: String,

    /// Directory for checkpoints and evaluation results
    #[arg(long)]
    output_dir: String,

    /// Pretrained base parameters each round restarts from
    #[arg(long)]
    base_model: Option<String>,

    /// Resume the first round from a prior run's checkpoint
    #[arg(long)]
    resume_from: Option<String>,

    /// Target language for zero-shot transfer
    #[arg(long, default_value = "zh")]
    lang: String,

    /// Run training
    #[arg(long, default_value = "false")]
    do_train: bool,

    /// Run evaluation on the test set
    #[arg(long, default_value = "false")]
    do_eval: bool,

    /// Enable FGM adversarial training
    #[arg(long, default_value = "false")]
    adv_training: bool,

    /// FGM perturbation magnitude
    #[arg(long, default_value = "1.0")]
    epsilon: f64,

    /// Maximum input sequence length after tokenization
    #[arg(long, default_value = "128")]
    max_seq_length: usize,

    /// Batch size for training
    #[arg(long, default_value = "32")]
    train_batch_size: usize,

    /// Batch size for evaluation
    #[arg(long, default_value = "128")]
    eval_batch_size: usize,

    /// Training epochs per self-training round
    #[arg(long, default_value = "3")]
    num_train_epochs: usize,

    /// Number of self-training rounds
    #[arg(long, default_value = "6")]
    num_self_train: usize,

    /// Unlabeled examples promoted per class and round
    #[arg(long, default_value = "40")]
    num_k: usize,

    /// Peak learning rate for Adam
    #[arg(long, default_value = "5e-5")]
    learning_rate: f64,

    /// Fraction of training spent on linear learning-rate warmup
    #[arg(long, default_value = "0.1")]
    warmup_proportion: f64,

    /// Number of update steps to accumulate gradients over
    #[arg(long, default_value = "1")]
    gradient_accumulation_steps: usize,

    /// Random seed for initialization and shuffling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Cli {
    /// Reject invalid configurations before any compute resource is touched
    fn validate(&self) -> crosslingual_ssl::Result<()> {
        if !Path::new(&self.data_dir).is_dir() {
            return Err(Error::Config(format!(
                "data directory '{}' does not exist",
                self.data_dir
            )));
        }
        if !Path::new(&self.tokenizer).is_file() {
            return Err(Error::Config(format!(
                "tokenizer file '{}' does not exist",
                self.tokenizer
            )));
        }
        if !TASK_NAMES.contains(&self.task_name.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "unknown task '{}', expected one of {:?}",
                self.task_name, TASK_NAMES
            )));
        }
        if self.gradient_accumulation_steps < 1 {
            return Err(Error::Config(format!(
                "invalid gradient_accumulation_steps {}, should be >= 1",
                self.gradient_accumulation_steps
            )));
        }
        if !self.do_train && !self.do_eval {
            return Err(Error::Config(
                "at least one of --do-train or --do-eval must be set".to_string(),
            ));
        }
        Ok(())
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            output_dir: PathBuf::from(&self.output_dir),
            base_model: self.base_model.as_ref().map(PathBuf::from),
            resume_from: self.resume_from.as_ref().map(PathBuf::from),
            rounds: self.num_self_train,
            num_k: self.num_k,
            epochs: self.num_train_epochs,
            train_batch_size: self.train_batch_size,
            eval_batch_size: self.eval_batch_size,
            gradient_accumulation_steps: self.gradient_accumulation_steps,
            learning_rate: self.learning_rate,
            warmup_proportion: self.warmup_proportion,
            adv_training: self.adv_training,
            epsilon: self.epsilon,
            seed: self.seed,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    print_banner();
    cli.validate()?;

    TrainingBackend::seed(cli.seed);
    let device = default_device();
    info!("backend: {}", backend_name());

    let tokenizer = VocabTokenizer::from_file(Path::new(&cli.tokenizer))?;
    let processor = make_processor(&cli.task_name, &cli.lang)?;
    let label_list = processor.get_labels();
    let data_dir = Path::new(&cli.data_dir);

    println!("{}", "Run Configuration:".cyan().bold());
    println!(
        "  Started:     {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Task:        {} ({} classes)", cli.task_name, label_list.len());
    println!("  Data:        {}", cli.data_dir);
    println!("  Output:      {}", cli.output_dir);
    println!("  Adversarial: {}", cli.adv_training);
    println!("  Rounds:      {} x {} epochs", cli.num_self_train, cli.num_train_epochs);
    println!("  Backend:     {}", backend_name());
    println!();

    let model_config = TextClassifierConfig::new(tokenizer.vocab_size())
        .with_max_seq_length(cli.max_seq_length)
        .with_num_classes(label_list.len());
    let config = cli.pipeline_config();

    let dev_examples = processor.get_dev_examples(data_dir)?;
    let dev = convert_examples_to_features(
        &dev_examples,
        &label_list,
        cli.max_seq_length,
        &tokenizer,
    )?;

    let mut state = RunState::new();

    if cli.do_train {
        let train_examples = processor.get_train_examples(data_dir)?;
        let unlabel_examples = processor.get_unlabel_examples(data_dir)?;

        let labeled = convert_examples_to_features(
            &train_examples,
            &label_list,
            cli.max_seq_length,
            &tokenizer,
        )?;
        let unlabeled = convert_examples_to_features(
            &unlabel_examples,
            &label_list,
            cli.max_seq_length,
            &tokenizer,
        )?;

        println!("{}", "Starting Self-Training...".green().bold());
        println!("  Labeled pool:   {}", labeled.len());
        println!("  Unlabeled pool: {}", unlabeled.len());
        println!("  Validation:     {}", dev.len());
        println!();

        state = run_self_training::<TrainingBackend>(
            &model_config,
            &config,
            Pools { labeled, unlabeled },
            &dev,
            label_list.len(),
            &device,
        )?;

        println!(
            "{} best validation accuracy: {:.2}%",
            "Training complete!".green().bold(),
            state.best_accuracy * 100.0
        );
        println!();
    }

    if cli.do_eval {
        let test_examples = processor.get_test_examples(data_dir)?;
        let test = convert_examples_to_features(
            &test_examples,
            &label_list,
            cli.max_seq_length,
            &tokenizer,
        )?;

        println!("{}", "Evaluating on Test Set...".cyan().bold());
        let report = run_final_evaluation::<TrainingBackend>(
            &model_config,
            &config,
            &test,
            &mut state,
            &device,
        )?;

        println!("  Accuracy: {:.2}%", report.accuracy * 100.0);
        println!("  F1:       {:.4}", report.f1);
        println!("  Loss:     {:.4}", report.loss);
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        "Cross-Lingual Semi-Supervised Fine-Tuning (Burn)".green().bold()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli(data_dir: &str, tokenizer: &str) -> Cli {
        Cli::parse_from([
            "crosslingual_ssl",
            "--data-dir",
            data_dir,
            "--tokenizer",
            tokenizer,
            "--task-name",
            "news",
            "--output-dir",
            "out",
            "--do-train",
        ])
    }

    #[test]
    fn test_validate_missing_data_dir() {
        let cli = base_cli("/nonexistent/data", "/nonexistent/tokenizer.json");
        assert!(matches!(cli.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_neither_train_nor_eval() {
        let dir = tempfile::tempdir().unwrap();
        let tok = dir.path().join("tokenizer.json");
        std::fs::write(&tok, "{}").unwrap();

        let mut cli = base_cli(dir.path().to_str().unwrap(), tok.to_str().unwrap());
        cli.do_train = false;
        assert!(matches!(cli.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_bad_accumulation() {
        let dir = tempfile::tempdir().unwrap();
        let tok = dir.path().join("tokenizer.json");
        std::fs::write(&tok, "{}").unwrap();

        let mut cli = base_cli(dir.path().to_str().unwrap(), tok.to_str().unwrap());
        cli.gradient_accumulation_steps = 0;
        assert!(matches!(cli.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_unknown_task() {
        let dir = tempfile::tempdir().unwrap();
        let tok = dir.path().join("tokenizer.json");
        std::fs::write(&tok, "{}").unwrap();

        let mut cli = base_cli(dir.path().to_str().unwrap(), tok.to_str().unwrap());
        cli.task_name = "nope".to_string();
        assert!(matches!(cli.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_pipeline_config_mapping() {
        let cli = base_cli("/tmp", "/tmp/tokenizer.json");
        let config = cli.pipeline_config();
        assert_eq!(config.rounds, 6);
        assert_eq!(config.num_k, 40);
        assert_eq!(config.epochs, 3);
        assert!(!config.adv_training);
    }
}
