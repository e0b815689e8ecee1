//! Event Model & Emitter (spec component 4.D).

pub mod emitter;

pub use emitter::{Emitter, EmitterMetrics, DEFAULT_QUEUE_CAPACITY};
