//! Finds the keys a partial translation of a language map is missing, splits
//! them into bounded requests for an external translator, and folds the pasted
//! answers back into a complete map packaged as a resource pack.

pub mod config;
pub mod error;
pub mod keymap;
pub mod pack;
pub mod pipeline;
pub mod progress;

pub use error::{PipelineError, PipelineResult};
pub use keymap::KeyMap;
