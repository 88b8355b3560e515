#![forbid(unsafe_code)]

//! Core types shared by every bankws crate: the error taxonomy, XML
//! namespace constants and algorithm identifiers.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
