mod secret;
pub mod types;
mod validators;

// Re-export all public types
pub use secret::SecretToken;
pub use types::*;
pub(crate) use validators::parse_size_string;
