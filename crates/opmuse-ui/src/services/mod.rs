//! Browser plumbing: HTTP, storage, uploads and the socket transport.
pub(crate) mod http;
pub(crate) mod socket;
pub(crate) mod storage;
pub(crate) mod upload;
