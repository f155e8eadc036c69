//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, added in `main`)
//! 2. CORS
//! 3. Request ID (assign correlation id)
//! 4. `TraceLayer` (request span, reads the request id)

pub mod auth;
pub mod request_id;

pub use auth::{LoginId, RequireAdmin};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
