#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;

pub use error::{Classify, ErrorCode};
pub use time::Clock;
