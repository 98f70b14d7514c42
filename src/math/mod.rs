pub mod tensor;
pub mod gabor;

pub use tensor::Tensor;
pub use gabor::{GaborParams, gabor_bank, gabor_kernel};
