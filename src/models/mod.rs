//! Data models shared by handlers and services.

pub mod thumbnail;
pub mod video;
