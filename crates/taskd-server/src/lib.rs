pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::Credentials;
pub use server::{start, ServerConfig, ServerHandle};
