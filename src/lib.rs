//! Host-side controller for a three-axis linear-motor manipulator.
//!
//! Each axis is driven by an independent servo drive reachable over UDP on a
//! dedicated control LAN. This crate implements the wire codec for that
//! drive protocol, a per-drive worker that serializes requests against one
//! drive, a multi-drive controller that fans operations out and joins their
//! completions, and a closed-loop waypoint-following path stepper.
//!
//! CAD geometry preprocessing, plotting, SpaceMouse input handling and
//! logger configuration are not part of this crate.

pub mod codec;
pub mod config;
pub mod controller;
pub mod drive;
pub mod error;
pub mod path;
pub mod telemetry;
pub mod transport;

pub use config::ManipulatorConfig;
pub use controller::Controller;
pub use drive::{Drive, DriveHandle};
pub use error::{CodecError, DriveError, Error};
pub use path::PathFollower;
pub use telemetry::Telemetry;
