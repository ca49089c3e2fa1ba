#![warn(missing_docs)]
//! A toolkit for working with Simrad EK60/EK80 raw echosounder data
pub mod algorithms;
pub mod cli;
pub mod error;
pub mod mapper;
pub mod model;
pub mod parser;
pub mod reader;

pub use error::{Error, Result};
