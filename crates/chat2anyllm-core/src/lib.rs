//! chat2anyllm core: configuration, errors, request validation and slash commands.

pub mod command;
pub mod config;
pub mod error;
pub mod validate;

pub use command::SlashCommand;
pub use config::{CorsPolicy, ServerConfig};
pub use error::{Error, Result};
pub use validate::{FieldError, Location};
