use bytes::Bytes;

/// An uploaded thumbnail image held while a request is handled, or for the
/// process lifetime in the in-memory store.
#[derive(Clone, Debug)]
pub struct Thumbnail {
    pub data: Bytes,
    pub media_type: String,
}
