//! Services behind the HTTP handlers: metadata, media tools, storage.

pub mod ingest;
pub mod media;
pub mod object_store;
pub mod thumbnails;
pub mod videos;
