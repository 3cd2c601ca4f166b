//! Algorithms driving a [`Selection`](crate::Selection) over in-memory
//! buffers.

pub mod buffer;

pub use buffer::{fill, for_each_element, gather, scatter};
