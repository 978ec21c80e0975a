//! `WorkPulse`: realtime update propagation and optimistic task board
//! reconciliation for the `WorkPulse` HR portal.

pub mod api;
pub mod board;
pub mod bus;
pub mod config;
pub mod notify;
pub mod session;
pub mod transport;
pub mod view;
