//! fedpharm-sim — the simulation core of FedPharm-X.
//!
//! Contains the timer-driven state machines behind the dashboard:
//!   - `simulator`: round-based training simulation over `GlobalStatus`
//!   - `upload`: per-participant upload / compliance wizard
//!   - `readiness`: the derived "all participants contributed" gate
//!   - `session`: the owned application state wiring them together
//!   - `runtime`: a tokio actor driving a `Session` in wall-clock time
//!
//! All waiting is expressed through `scheduler::TimerQueue`, so tests drive
//! the whole session in virtual time.

pub mod config;
pub mod scheduler;
pub mod rng;
pub mod log;
pub mod simulator;
pub mod upload;
pub mod readiness;
pub mod audit;
pub mod activity;
pub mod chat;
pub mod session;
pub mod runtime;

pub use config::{ActivityConfig, SessionConfig, SimulationConfig, UploadConfig};
pub use session::{IntelligenceState, Session, SessionEffect, SessionEvent, SessionSnapshot, TimerEvent};
pub use runtime::SessionHandle;
