//! Shared wire definitions for the `WorkPulse` push channel and REST collaborators.

pub mod codec;
pub mod employee;
pub mod notification;
pub mod push;
pub mod task;
pub mod time;
