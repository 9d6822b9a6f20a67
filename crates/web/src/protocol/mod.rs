//! Protocol types for the http shell
//!
//! This module provides the immutable request value handed to the pipeline,
//! the response value the pipeline produces, and the error types of the
//! connection layer. The request is parsed once and never mutated; its
//! correlation identity is handled entirely by the bridge, not by anything
//! in here.

mod error;
mod request;
mod response;

pub use error::{ConnectionError, ParseError, SendError};
pub use request::Request;
pub use response::{Response, ResponseBody};
