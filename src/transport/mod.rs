//! # Job Transport
//!
//! The private TCP link between the bots and the machine with the printer.
//!
//! ## Modules
//!
//! - [`codec`]: JSON frame with an end-of-transmission sentinel
//! - [`client`]: [`JobSender`], one connection per job
//! - [`receiver`]: [`JobReceiver`], accept loop that composes and prints
//!
//! Delivery is best effort. A job that fails to send is logged by the
//! caller and dropped.

pub mod client;
pub mod codec;
pub mod receiver;

pub use client::{JobDispatch, JobSender};
pub use receiver::JobReceiver;
