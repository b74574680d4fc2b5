pub mod inference;

pub use inference::{InferenceClient, TextGenerationParams};
