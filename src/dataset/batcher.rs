//! Tensor Batching
//!
//! Turns slices of [`EncodedFeature`]s into the tensors consumed by the
//! classifier. Training shuffles indices itself and evaluation is strictly
//! sequential, so batches are built directly from feature slices rather
//! than through a data loader.

use burn::tensor::{backend::Backend, Bool, Int, Tensor};

use crate::dataset::features::EncodedFeature;

/// A batch of encoded inputs on a device
#[derive(Debug, Clone)]
pub struct FeatureBatch<B: Backend> {
    /// Token ids, shape `[batch_size, seq_length]`
    pub input_ids: Tensor<B, 2, Int>,
    /// Attention mask, 1 for real tokens, shape `[batch_size, seq_length]`
    pub attention_mask: Tensor<B, 2, Int>,
    /// Segment ids, shape `[batch_size, seq_length]`
    pub segment_ids: Tensor<B, 2, Int>,
    /// Label indices, shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> FeatureBatch<B> {
    /// Boolean padding mask (true where padded), for the encoder
    pub fn pad_mask(&self) -> Tensor<B, 2, Bool> {
        self.attention_mask.clone().equal_elem(0)
    }
}

/// Builds [`FeatureBatch`]es on a fixed device
#[derive(Debug, Clone)]
pub struct FeatureBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> FeatureBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Assemble a batch from a slice of features.
    ///
    /// All features must share the same sequence length (guaranteed by
    /// feature encoding).
    pub fn batch(&self, items: &[EncodedFeature]) -> FeatureBatch<B> {
        let batch_size = items.len();
        let seq_length = items.first().map(|f| f.input_ids.len()).unwrap_or(0);

        let mut input_ids = Vec::with_capacity(batch_size * seq_length);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_length);
        let mut segment_ids = Vec::with_capacity(batch_size * seq_length);
        let mut targets = Vec::with_capacity(batch_size);

        for item in items {
            debug_assert_eq!(item.input_ids.len(), seq_length);
            input_ids.extend_from_slice(&item.input_ids);
            attention_mask.extend_from_slice(&item.attention_mask);
            segment_ids.extend_from_slice(&item.segment_ids);
            targets.push(item.label_id as i32);
        }

        FeatureBatch {
            input_ids: Tensor::<B, 1, Int>::from_ints(&input_ids[..], &self.device)
                .reshape([batch_size, seq_length]),
            attention_mask: Tensor::<B, 1, Int>::from_ints(&attention_mask[..], &self.device)
                .reshape([batch_size, seq_length]),
            segment_ids: Tensor::<B, 1, Int>::from_ints(&segment_ids[..], &self.device)
                .reshape([batch_size, seq_length]),
            targets: Tensor::<B, 1, Int>::from_ints(&targets[..], &self.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn feature(guid: &str, label_id: usize) -> EncodedFeature {
        EncodedFeature {
            guid: guid.to_string(),
            input_ids: vec![2, 7, 8, 3, 0, 0],
            attention_mask: vec![1, 1, 1, 1, 0, 0],
            segment_ids: vec![0, 0, 0, 0, 0, 0],
            label_id,
        }
    }

    #[test]
    fn test_batch_shapes() {
        let device = Default::default();
        let batcher = FeatureBatcher::<TestBackend>::new(device);

        let items = vec![feature("a", 0), feature("b", 2)];
        let batch = batcher.batch(&items);

        assert_eq!(batch.input_ids.dims(), [2, 6]);
        assert_eq!(batch.attention_mask.dims(), [2, 6]);
        assert_eq!(batch.segment_ids.dims(), [2, 6]);
        assert_eq!(batch.targets.dims(), [2]);
    }

    #[test]
    fn test_batch_targets() {
        let device = Default::default();
        let batcher = FeatureBatcher::<TestBackend>::new(device);

        let batch = batcher.batch(&[feature("a", 1), feature("b", 3)]);
        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![1, 3]);
    }

    #[test]
    fn test_pad_mask() {
        let device = Default::default();
        let batcher = FeatureBatcher::<TestBackend>::new(device);

        let batch = batcher.batch(&[feature("a", 0)]);
        let mask: Vec<bool> = batch.pad_mask().into_data().to_vec().unwrap();
        assert_eq!(mask, vec![false, false, false, false, true, true]);
    }
}
