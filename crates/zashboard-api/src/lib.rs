pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod normalize;
pub mod store;

pub use client::Client;
