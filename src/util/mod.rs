//! Utility functions shared by the normalizers and configuration.
//!
//! - **Text sanitizing**: markup and control-character stripping for
//!   title/description fields
//! - **URL validation**: scheme and private-address checks for configured feeds

mod text;
mod url_validator;

pub use text::{sanitize, sanitize_opt, strip_control_chars};
pub use url_validator::{validate_feed_url, UrlValidationError};
