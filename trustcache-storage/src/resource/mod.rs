//! Resource handle and resolver implementations.
//!
//! - [`file`]: file-system resources rooted at a directory
//! - [`memory`]: in-process resources, for embedding and tests

pub mod file;
pub mod memory;

pub use file::{FileResolver, FileResource};
pub use memory::{MemoryResolver, MemoryResource};
