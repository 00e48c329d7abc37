//! Gateway request/response types
//!
//! - `response`: unified `{code, msg, data}` envelope, error codes and `ApiError`

pub mod response;

pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
