//! Mureka API integration
//!
//! API docs: https://platform.mureka.ai/docs

mod adapter;
mod client;
pub mod dto;

pub use client::{DEFAULT_BASE_URL, MurekaClient};
