//! Storage planning and execution.
//!
//! `storage` turns a machine's disk layout into an ordered sequence of
//! atomic operations and maps each one to a system utility invocation.
//! `dualboot` holds the sector arithmetic for the Windows resize/move
//! variant.

pub mod dualboot;
pub mod storage;
