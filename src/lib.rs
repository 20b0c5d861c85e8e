pub mod app;
pub mod cache;
pub mod common;
pub mod config;
pub mod dns;
pub mod output;
pub mod source;
pub mod sync;
