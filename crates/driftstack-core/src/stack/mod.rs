pub mod mean;

pub use mean::{mean_stack, MeanAccumulator};
