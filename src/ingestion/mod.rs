pub mod cache;
pub mod context;
pub mod cycle;
pub mod memory;
pub mod range;
pub mod traits;

pub use context::IngestionContext;
pub use cycle::run_cycle;
pub use memory::MemoryCheckpointStore;
pub use traits::{ChainProvider, CheckpointStore, EventSink};
