pub mod batch;
pub mod chunk;
pub mod config;
pub mod delta;
pub mod export;
pub mod merge;
pub mod prompts;
pub mod reconcile;
pub mod session;

pub use batch::{Batch, BatchOutcome, UnitOutcome, UnitRequest};
pub use chunk::{partition, Chunk, ChunkLimit};
pub use config::{init_default_config, ConfigOverrides, PipelineConfig};
pub use delta::compute_delta;
pub use merge::merge;
pub use prompts::RequestFormatter;
pub use reconcile::{reconcile, ReconcileReport, ReconciledMap};
pub use session::{ImportOutcome, StrayKeyPolicy, TranslationSession, TranslationUnit};
