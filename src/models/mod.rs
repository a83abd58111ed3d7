pub mod features;
pub mod risk;

pub use features::*;
pub use risk::*;
