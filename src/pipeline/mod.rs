pub mod normalizer;
pub mod processor;
pub mod renderer;
