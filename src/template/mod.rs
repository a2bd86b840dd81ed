pub mod handlers;
pub mod models;
pub mod upload;

pub use handlers::config;
