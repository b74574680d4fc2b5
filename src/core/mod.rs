pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod session;

pub use cache::ResourceCache;
pub use config::AppConfig;
pub use error::SessionError;
pub use gate::{Configuration, Validation, validate};
pub use session::{Session, SessionState};
