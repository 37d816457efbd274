//! Task Processors
//!
//! Each processor knows how to read one task's delimited text files and
//! produce [`Example`] collections for the train/dev/test/unlabeled splits,
//! plus the task's label vocabulary.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::dataset::example::Example;
use crate::utils::error::{Error, Result};

/// Data converter for one sequence classification task.
///
/// Implementations source their splits from delimited text files under a
/// task data directory. Labels returned by `get_labels` define the label
/// vocabulary order used everywhere downstream, including the confidence
/// ranker's per-class processing order.
pub trait DataProcessor: std::fmt::Debug {
    /// Labeled training examples (the initial labeled pool)
    fn get_train_examples(&self, data_dir: &Path) -> Result<Vec<Example>>;

    /// Validation examples used for checkpoint selection
    fn get_dev_examples(&self, data_dir: &Path) -> Result<Vec<Example>>;

    /// Held-out test examples for the final report
    fn get_test_examples(&self, data_dir: &Path) -> Result<Vec<Example>>;

    /// The unlabeled pool mined by self-training. Labels in these files are
    /// hidden ground truth; the pipeline never trains on them directly.
    fn get_unlabel_examples(&self, data_dir: &Path) -> Result<Vec<Example>>;

    /// The task's label vocabulary, in canonical order
    fn get_labels(&self) -> Vec<String>;
}

/// Read a tab-separated file into rows of columns.
fn read_tsv(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|e| {
        Error::Dataset(format!("cannot open '{}': {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        rows.push(line.split('\t').map(str::to_string).collect());
    }
    Ok(rows)
}

/// Turn TSV rows of the form `label<TAB>text` into examples.
fn rows_to_examples(rows: Vec<Vec<String>>, prefix: &str, path: &Path) -> Result<Vec<Example>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() < 2 {
                return Err(Error::Dataset(format!(
                    "'{}' line {}: expected label<TAB>text, got {} column(s)",
                    path.display(),
                    i + 1,
                    row.len()
                )));
            }
            let mut row = row.into_iter();
            let label = row.next().unwrap_or_default();
            let text_a = row.next().unwrap_or_default();
            Ok(Example::new(format!("{}-{}", prefix, i), text_a, Some(label)))
        })
        .collect()
}

/// Processor for the cross-lingual news topic task.
///
/// English training data plus dev/test/unlabeled splits in the transfer
/// language selected at construction.
#[derive(Debug)]
pub struct NewsProcessor {
    lang: String,
}

impl NewsProcessor {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }
}

impl DataProcessor for NewsProcessor {
    fn get_train_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let rows = read_tsv(&data_dir.join("english.train.1000"))?;
        rows_to_examples(rows, "train", &data_dir.join("english.train.1000"))
    }

    fn get_dev_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join(format!("{}.dev", self.lang));
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "dev", &path)
    }

    fn get_test_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join(format!("{}.test", self.lang));
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "test", &path)
    }

    fn get_unlabel_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join(format!("{}.train.1000", self.lang));
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "uns", &path)
    }

    fn get_labels(&self) -> Vec<String> {
        ["CCAT", "ECAT", "MCAT", "GCAT"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

/// Processor for the cross-domain review sentiment task.
///
/// English restaurant reviews as labeled source data, hotel reviews in the
/// target domain as the unlabeled pool.
#[derive(Debug)]
pub struct ReviewsProcessor;

impl ReviewsProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReviewsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProcessor for ReviewsProcessor {
    fn get_train_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join("en_yelp_train.tsv");
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "train", &path)
    }

    fn get_dev_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join("zh_hotel_test.tsv");
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "dev", &path)
    }

    fn get_test_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join("zh_hotel_test.tsv");
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "test", &path)
    }

    fn get_unlabel_examples(&self, data_dir: &Path) -> Result<Vec<Example>> {
        let path = data_dir.join("zh_hotel_train.tsv");
        let rows = read_tsv(&path)?;
        rows_to_examples(rows, "uns", &path)
    }

    fn get_labels(&self) -> Vec<String> {
        ["1", "2", "3", "4", "5"].iter().map(|s| s.to_string()).collect()
    }
}

/// Task names understood by [`make_processor`]
pub const TASK_NAMES: [&str; 2] = ["news", "reviews"];

/// Look up a processor by task name.
pub fn make_processor(task_name: &str, lang: &str) -> Result<Box<dyn DataProcessor>> {
    match task_name.to_lowercase().as_str() {
        "news" => Ok(Box::new(NewsProcessor::new(lang))),
        "reviews" => Ok(Box::new(ReviewsProcessor::new())),
        other => Err(Error::Config(format!(
            "unknown task '{}', expected one of {:?}",
            other, TASK_NAMES
        ))),
    }
}
