//! HTTP transport.
//!
//! [`HttpTransport`] calls the remote API over HTTPS. Requests without
//! files are JSON POSTs; requests carrying files are `multipart/form-data`.

mod client;
mod envelope;
mod multipart;

pub use client::{DEFAULT_API_URL, HttpTransport, HttpTransportConfig};
pub use envelope::decode_envelope;
