pub mod chat;
pub mod prompt;
pub mod responder;
pub mod tools;
