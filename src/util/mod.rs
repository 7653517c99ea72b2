//! Utility functions shared across the pipeline.
//!
//! - **Endpoint validation**: HTTPS policy for classification endpoints
//! - **Text processing**: control-character stripping and length checks for post text
//!
//! # Examples
//!
//! ```
//! use xfeed::util::{strip_control_chars, validate_endpoint};
//!
//! let url = validate_endpoint("https://api.openai.com/v1/chat/completions").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(strip_control_chars("gm\u{0} frens"), "gm frens");
//! ```

mod endpoint;
mod text;

pub use endpoint::{validate_endpoint, EndpointError};
pub use text::{strip_control_chars, trimmed_char_count};
