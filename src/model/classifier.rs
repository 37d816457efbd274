//! Transformer Classifier
//!
//! A BERT-style sequence classifier built from Burn's transformer encoder:
//! token/position/segment embeddings, a stack of encoder layers, a tanh
//! pooler over the classification token, and a linear output head.
//!
//! The model deliberately exposes two fixed-shape operations instead of a
//! labels-dependent polymorphic forward: [`TextClassifier::compute_loss`]
//! for training and [`TextClassifier::predict`] for inference.

use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    nn::{
        loss::CrossEntropyLossConfig,
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    record::CompactRecorder,
    tensor::{activation::tanh, backend::Backend, Int, Tensor},
};

use crate::dataset::batcher::FeatureBatch;
use crate::utils::error::Error;

/// Configuration for the transformer classifier
#[derive(Config, Debug)]
pub struct TextClassifierConfig {
    /// Vocabulary size of the token embedding table
    pub vocab_size: usize,

    /// Maximum input sequence length (size of the position table)
    #[config(default = "128")]
    pub max_seq_length: usize,

    /// Number of output classes
    #[config(default = "4")]
    pub num_classes: usize,

    /// Embedding/encoder hidden size
    #[config(default = "256")]
    pub d_model: usize,

    /// Feed-forward size inside each encoder layer
    #[config(default = "1024")]
    pub d_ff: usize,

    /// Number of attention heads
    #[config(default = "8")]
    pub n_heads: usize,

    /// Number of encoder layers
    #[config(default = "4")]
    pub n_layers: usize,

    /// Segment vocabulary size (2 for sentence-pair tasks)
    #[config(default = "2")]
    pub type_vocab_size: usize,

    /// Dropout rate used in embeddings, encoder, and classifier head
    #[config(default = "0.1")]
    pub dropout: f64,
}

/// Input embeddings: token + position + segment, normalized.
#[derive(Module, Debug)]
pub struct EmbeddingLayer<B: Backend> {
    pub token: Embedding<B>,
    pub position: Embedding<B>,
    pub segment: Embedding<B>,
    pub norm: LayerNorm<B>,
    pub dropout: Dropout,
}

impl<B: Backend> EmbeddingLayer<B> {
    /// Create the embedding layer from configuration
    pub fn new(config: &TextClassifierConfig, device: &B::Device) -> Self {
        Self {
            token: EmbeddingConfig::new(config.vocab_size, config.d_model).init(device),
            position: EmbeddingConfig::new(config.max_seq_length, config.d_model).init(device),
            segment: EmbeddingConfig::new(config.type_vocab_size, config.d_model).init(device),
            norm: LayerNormConfig::new(config.d_model).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    /// Embed token and segment ids, shape `[batch, seq] -> [batch, seq, d_model]`
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        segment_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [_, seq_length] = input_ids.dims();
        let device = input_ids.device();

        let positions =
            Tensor::<B, 1, Int>::arange(0..seq_length as i64, &device).reshape([1, seq_length]);

        let x = self.token.forward(input_ids)
            + self.position.forward(positions)
            + self.segment.forward(segment_ids);

        self.dropout.forward(self.norm.forward(x))
    }
}

/// Output of [`TextClassifier::predict`]
#[derive(Debug)]
pub struct PredictOutput<B: Backend> {
    /// Unnormalized class scores, shape `[batch, num_classes]`
    pub logits: Tensor<B, 2>,
    /// Pooled sequence representation, shape `[batch, d_model]`
    pub pooled: Tensor<B, 2>,
}

/// Output of [`TextClassifier::compute_loss`]
#[derive(Debug)]
pub struct LossOutput<B: Backend> {
    /// Mean cross-entropy loss over the batch
    pub loss: Tensor<B, 1>,
    /// Pooled sequence representation, shape `[batch, d_model]`
    pub pooled: Tensor<B, 2>,
}

/// BERT-style transformer sequence classifier
#[derive(Module, Debug)]
pub struct TextClassifier<B: Backend> {
    pub embeddings: EmbeddingLayer<B>,
    pub encoder: TransformerEncoder<B>,
    pub pooler: Linear<B>,
    pub dropout: Dropout,
    pub output: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> TextClassifier<B> {
    /// Create a classifier with freshly initialized parameters
    pub fn new(config: &TextClassifierConfig, device: &B::Device) -> Self {
        let encoder =
            TransformerEncoderConfig::new(config.d_model, config.d_ff, config.n_heads, config.n_layers)
                .with_dropout(config.dropout)
                .init(device);

        Self {
            embeddings: EmbeddingLayer::new(config, device),
            encoder,
            pooler: LinearConfig::new(config.d_model, config.d_model).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            output: LinearConfig::new(config.d_model, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }

    /// Create a classifier, optionally loading parameters from a prior
    /// checkpoint record (the pretrained base, or a resumed run).
    pub fn from_pretrained(
        config: &TextClassifierConfig,
        base: Option<&Path>,
        device: &B::Device,
    ) -> crate::utils::error::Result<Self> {
        let model = Self::new(config, device);
        match base {
            Some(path) => {
                let recorder = CompactRecorder::new();
                model.load_file(path, &recorder, device).map_err(|e| {
                    Error::Model(format!(
                        "failed to load parameters from '{}': {:?}",
                        path.display(),
                        e
                    ))
                })
            }
            None => Ok(model),
        }
    }

    /// Run the encoder and return class logits plus the pooled representation.
    pub fn predict(&self, batch: &FeatureBatch<B>) -> PredictOutput<B> {
        let embedded = self
            .embeddings
            .forward(batch.input_ids.clone(), batch.segment_ids.clone());

        let encoded = self
            .encoder
            .forward(TransformerEncoderInput::new(embedded).mask_pad(batch.pad_mask()));

        let [batch_size, _seq_length, d_model] = encoded.dims();
        let first_token = encoded
            .slice([0..batch_size, 0..1])
            .reshape([batch_size, d_model]);
        let pooled = tanh(self.pooler.forward(first_token));

        let logits = self.output.forward(self.dropout.forward(pooled.clone()));

        PredictOutput { logits, pooled }
    }

    /// Run the encoder and return the batch loss plus the pooled representation.
    pub fn compute_loss(&self, batch: &FeatureBatch<B>) -> LossOutput<B> {
        let PredictOutput { logits, pooled } = self.predict(batch);

        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, batch.targets.clone());

        LossOutput { loss, pooled }
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::batcher::FeatureBatcher;
    use crate::dataset::features::EncodedFeature;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    pub(crate) fn tiny_config() -> TextClassifierConfig {
        TextClassifierConfig::new(32)
            .with_max_seq_length(8)
            .with_num_classes(3)
            .with_d_model(16)
            .with_d_ff(32)
            .with_n_heads(2)
            .with_n_layers(1)
    }

    fn tiny_batch(device: &<TestBackend as Backend>::Device) -> FeatureBatch<TestBackend> {
        let features = vec![
            EncodedFeature {
                guid: "t-0".into(),
                input_ids: vec![2, 5, 6, 3, 0, 0, 0, 0],
                attention_mask: vec![1, 1, 1, 1, 0, 0, 0, 0],
                segment_ids: vec![0; 8],
                label_id: 0,
            },
            EncodedFeature {
                guid: "t-1".into(),
                input_ids: vec![2, 9, 3, 0, 0, 0, 0, 0],
                attention_mask: vec![1, 1, 1, 0, 0, 0, 0, 0],
                segment_ids: vec![0; 8],
                label_id: 2,
            },
        ];
        FeatureBatcher::<TestBackend>::new(device.clone()).batch(&features)
    }

    #[test]
    fn test_predict_shapes() {
        let device = Default::default();
        let model = TextClassifier::<TestBackend>::new(&tiny_config(), &device);

        let out = model.predict(&tiny_batch(&device));
        assert_eq!(out.logits.dims(), [2, 3]);
        assert_eq!(out.pooled.dims(), [2, 16]);
    }

    #[test]
    fn test_compute_loss_is_finite() {
        let device = Default::default();
        let model = TextClassifier::<TestBackend>::new(&tiny_config(), &device);

        let out = model.compute_loss(&tiny_batch(&device));
        let loss: f32 = out.loss.into_scalar();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_from_pretrained_without_base() {
        let device = Default::default();
        let model =
            TextClassifier::<TestBackend>::from_pretrained(&tiny_config(), None, &device).unwrap();
        assert_eq!(model.num_classes(), 3);
    }

    #[test]
    fn test_from_pretrained_missing_file() {
        let device = Default::default();
        let err = TextClassifier::<TestBackend>::from_pretrained(
            &tiny_config(),
            Some(Path::new("/nonexistent/base")),
            &device,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }
}
