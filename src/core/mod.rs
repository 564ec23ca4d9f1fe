//! Core types shared by every engine component.
//!
//! Currently this is the error taxonomy; see [`error`].

pub mod error;

pub use error::{
    BoxError, EngineError, ErrorContext, Result, SharedError, user_friendly_error,
};
