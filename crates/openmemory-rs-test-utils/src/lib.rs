//! Test helpers shared across openmemory crates.

pub mod memory;
pub mod tools;

pub use memory::{ComposerCall, FailingStore, RecordingComposer, TEST_EPOCH, TestMemory};
pub use tools::DummyTool;
