pub mod anchor;
pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod merkle;
pub mod pipeline;
