//! Syscall entry point: user-pointer validation, the per-process kernel
//! object table, and the dispatch table itself.
//!
//! The filesystem/network back-ends and process exec are external
//! collaborators, so this surface only covers what the kernel itself
//! owns: thread control, synchronization primitives, process lifecycle,
//! and the handful of file operations that go through `fs::file::File`
//! rather than a concrete backing store.

pub mod dispatch;
pub mod objects;
pub mod uaccess;

pub use dispatch::{dispatch, SyscallOutcome};
