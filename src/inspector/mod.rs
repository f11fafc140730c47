//! Remote Debugger Module
//!
//! Client side of the remote-debugging protocol used to capture the stack of
//! a stalled runtime:
//! - `protocol`: wire types and per-connection session state
//! - `frames`: conversion of debugger call frames into portable stack frames
//! - `client`: WebSocket connection that pauses, resumes and reports

pub mod client;
pub mod frames;
pub mod protocol;

pub use client::{DebugProtocolClient, InspectorError};
pub use frames::{call_frames_to_stack_frames, is_in_app, normalize_filename, StackFrame};
pub use protocol::{CallFrame, Command, IncomingMessage, Location, ProtocolSession};
