pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod export;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use client::{ChatBackend, HttpChatClient};
pub use config::{Config, Credentials};
pub use error::{ChatError, ExportError};
pub use exchange::{Exchange, PendingRequest};
pub use export::CsvExporter;
pub use state::{Message, Role};
pub use transcript::Transcript;
