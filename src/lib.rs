// Courier - an interceptor-driven HTTP request wrapper for Rust
//
// This library wraps an async HTTP client with request/response interceptors,
// bearer token injection and normalization of `{code, message, data}` backend
// envelopes.

// Re-export the client
pub use courier_http::*;

// Prelude for common imports
pub mod prelude {
    pub use courier_http::prelude::*;
}
