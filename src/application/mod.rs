pub mod auth;
pub mod engine;
