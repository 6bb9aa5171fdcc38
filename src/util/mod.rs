//! Common utilities and data structures

pub mod buffer;
pub mod timestamp;

pub use buffer::{Buffer, BufferRef};
pub use timestamp::Timestamp;
