pub mod architecture;
pub mod network;

pub use architecture::{build_network, Architecture};
pub use network::Sequential;
