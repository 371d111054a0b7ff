//! Background Tasks Module
//!
//! Cache maintenance that runs for the lifetime of the server.
//!
//! # Tasks
//! - Sweep: removes expired entries at a configured interval
//! - Nightly clear: empties every domain at local midnight

mod nightly;
mod sweep;

pub use nightly::{spawn_nightly_clear_task, until_next_midnight};
pub use sweep::spawn_sweep_task;
