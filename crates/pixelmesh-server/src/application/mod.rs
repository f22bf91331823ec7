//! Application layer: the commissioning state machine and what it depends on.
//!
//! Everything here talks to the outside world through traits, so the whole
//! discovery → calibration → streaming flow can be driven by scripted test
//! doubles instead of a TCP socket and a human at a terminal.
//!
//! # Sub-modules
//!
//! - **`mesh_state`** – Process-wide state shared by successive sessions:
//!   the device registry, the "addressed" flag, the color sequence counter
//!   and the session generation token.
//!
//! - **`transport`** – The `FrameTransport` trait a session sends and
//!   receives frames through.
//!
//! - **`operator`** – The `Operator` trait answering continue/stop questions
//!   and reporting which grid cell lit up during calibration.
//!
//! - **`color_streamer`** – Turns pixel-grid snapshots into color frames.
//!
//! - **`addressing_session`** – The per-connection state machine.

pub mod addressing_session;
pub mod color_streamer;
pub mod mesh_state;
pub mod operator;
pub mod transport;

pub use addressing_session::{
    AddressingSession, SessionContext, SessionError, SessionPhase, SessionTag, SessionTiming,
};
pub use color_streamer::{ColorStreamer, DemoPattern, PixelSource, SharedGrid};
pub use mesh_state::MeshState;
pub use operator::{CalibrationDecision, Operator};
pub use transport::{FrameTransport, LinkError};
