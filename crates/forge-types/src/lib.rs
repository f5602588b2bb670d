//! Forge Types - wire protocol for the code synthesis pipeline
//!
//! Pure data types shared between the pipeline core, the CLI and any
//! front end that renders generation or application progress. Every
//! event is a small JSON object tagged by `type`; unknown fields are
//! ignored on deserialization so older consumers keep working.

pub mod progress;
pub mod result;
pub mod stream;

pub use progress::*;
pub use result::*;
pub use stream::*;
