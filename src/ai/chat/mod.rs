pub mod models;

pub use models::{Speaker, Transcript, TranscriptEntry};
