pub mod bce;
pub mod cross_entropy;
pub mod mse;
pub mod loss_type;

pub use bce::BceLoss;
pub use cross_entropy::CrossEntropyLoss;
pub use mse::MseLoss;
pub use loss_type::LossType;
