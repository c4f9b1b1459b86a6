// Public API - what other modules can use
pub use service::{Bridge, SendAck, UploadResponse};

// Internal modules
mod service;
