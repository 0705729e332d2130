//! SN76489 PSG emulation core with ordered save state synchronization

mod api;
pub mod psg;

pub use api::{HostCore, HostError, HostResult, PsgCore, PsgPort, TimedWrite};
