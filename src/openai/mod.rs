mod chat;
mod core;

pub use self::chat::{IterationLimitReached, chat};
pub use self::core::*;
