//! Suno API integration
//!
//! API docs: https://docs.sunoapi.org

mod adapter;
mod client;
pub mod dto;

pub use adapter::split_tags;
pub use client::{DEFAULT_BASE_URL, SunoClient};
