//! Backend selection for the Burn framework.
//!
//! NdArray (CPU) is the portable default; the `cuda` feature switches the
//! whole pipeline to the CUDA backend.

use burn::backend::Autodiff;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device for the selected backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    #[cfg(not(feature = "cuda"))]
    {
        burn::backend::ndarray::NdArrayDevice::default()
    }

    #[cfg(feature = "cuda")]
    {
        burn_cuda::CudaDevice::default()
    }
}

/// Human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }

    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device() {
        let _device = default_device();
        assert!(!backend_name().is_empty());
    }
}
