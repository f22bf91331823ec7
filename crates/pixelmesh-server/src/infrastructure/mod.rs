//! Infrastructure layer: sockets, terminal I/O and configuration files.
//!
//! # Sub-modules
//!
//! - **`network`** – The TCP link to the mesh root node and the listener
//!   that keeps exactly one session alive.
//! - **`operator`** – Console, headless and scripted operators.
//! - **`storage`** – TOML configuration.

pub mod network;
pub mod operator;
pub mod storage;
