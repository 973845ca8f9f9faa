//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: record
//! types, the time base, the configuration blueprint and the error type.
//! Business crates depend on this crate, never the other way round.
//!
//! ## Time Model
//! - Every record carries `time.{epoch_ms, mono_ms}`
//! - `mono_ms` drives ordering, staleness and TTL math; `epoch_ms` is display only

mod blueprint;
mod control;
mod error;
mod event;
mod observation;
mod record;
mod run_layout;
mod source;
mod telemetry;
mod tick;
mod time;

pub use blueprint::*;
pub use control::*;
pub use error::*;
pub use event::*;
pub use observation::*;
pub use record::*;
pub use run_layout::RunLayout;
pub use source::{RecordCallback, RecordSource};
pub use telemetry::*;
pub use tick::TickMark;
pub use time::{Clock, ManualClock, RecordTime, SystemClock, SCHEMA_VERSION};
