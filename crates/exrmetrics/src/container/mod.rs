//! Part containers: OpenEXR files and in-memory parts.

pub mod exr_file;
pub mod memory;

pub use exr_file::{ExrInputFile, ExrOutputFile};
pub use memory::{MemoryContainer, MemoryPart};
