//! Host-facing contract, adapters and bridge for driving a session from a
//! browser page or native shell.

pub mod adapters;
pub mod channel;
pub mod contract;
pub mod stdio;
