pub mod cache;
pub mod chain;
pub mod paymail;
pub mod persistence;
pub mod tasks;
