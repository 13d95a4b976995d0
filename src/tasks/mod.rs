/// Backend async task tracking
///
/// Long-running backend queries answer with a task id; results are collected
/// through the registry's shared polling monitor.
mod registry;
mod types;

#[cfg(test)]
pub mod testing;

pub use registry::{Task, TaskBackend, TaskRegistry};
pub use types::*;
