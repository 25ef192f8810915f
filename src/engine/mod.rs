//! The two non-trivial algorithms of the pipeline: silence-adaptive
//! segmentation and timestamp-correct reassembly. Both are pure over
//! in-memory inputs; the stage implementations own the surrounding I/O.

pub mod assembly;
pub mod segmentation;

pub use assembly::{assemble, AssemblyOutput, ResolvedChunk};
pub use segmentation::{split_by_silence, SegmentationConfig};
