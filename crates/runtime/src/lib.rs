//! Banter dialogue runtime.
//!
//! Loads a compiled artifact and plays its sections: the host enters a
//! section, then advances from suspension to suspension, feeding back
//! choice answers. The runtime owns the typed variable environment and
//! the deterministic rand stream; everything it suspends with is plain
//! data for the host to present.

pub mod env;
pub mod error;
pub mod eval;
pub mod rng;
pub mod vm;

pub use env::Environment;
pub use error::{Error, Result};
pub use rng::RngStream;
pub use vm::{plain_text, ChoiceView, RenderedFragment, Step, Suspension, Vm, MAX_INTERNAL_STEPS};
