// src/lib.rs

//! Sequencing utilities for asynchronous closures.
//!
//! Two leaf components, both explicit instance types with no process-wide
//! state:
//!
//! - [`Queue`]: runs enqueued units strictly one at a time, FIFO.
//! - [`Group`]: runs enqueued *named* units in dependency order and fires
//!   accumulated completion callbacks once when every added task finished.
//!
//! A unit is any `FnOnce(Completion) + Send` closure; it must consume its
//! completion handle exactly once, synchronously or at any later point, to
//! report that it finished. The orchestrators create no timers or threads of
//! their own and model no failures: a unit that never completes simply
//! stalls whatever waits on it.

pub mod errors;
pub mod group;
pub mod logging;
pub mod queue;

pub use errors::GroupError;
pub use group::Group;
pub use queue::Queue;
