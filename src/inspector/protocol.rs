//! Debugger Wire Protocol
//!
//! Minimal JSON command/event protocol spoken with a remote-debugging
//! endpoint. Outgoing commands carry a per-connection id that is never
//! reused; incoming messages are either events we understand, or anything
//! else (command acknowledgements, unrelated events), which is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frames::{call_frames_to_stack_frames, StackFrame};

/// Enable debugger events on the remote side (idempotent)
pub const DEBUGGER_ENABLE: &str = "Debugger.enable";
/// Interrupt the remote runtime at the next opportunity
pub const DEBUGGER_PAUSE: &str = "Debugger.pause";
/// Let the remote runtime continue
pub const DEBUGGER_RESUME: &str = "Debugger.resume";

const SCRIPT_PARSED: &str = "Debugger.scriptParsed";
const PAUSED: &str = "Debugger.paused";

/// Outgoing command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// Source position inside a script, 0-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    #[serde(default)]
    pub line_number: u32,
    #[serde(default)]
    pub column_number: u32,
}

/// Call frame as reported in a pause event, innermost first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,
    pub location: Location,
}

/// `Debugger.scriptParsed` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsed {
    pub script_id: String,
    #[serde(default)]
    pub url: String,
}

/// `Debugger.paused` parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paused {
    pub call_frames: Vec<CallFrame>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// Message received from the remote debugger
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    ScriptParsed(ScriptParsed),
    Paused(Paused),
    /// Acknowledgements and events this client does not act on
    Other,
}

impl IncomingMessage {
    /// Parse a raw text message
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;

        match envelope.method.as_deref() {
            Some(SCRIPT_PARSED) => Ok(Self::ScriptParsed(serde_json::from_value(envelope.params)?)),
            Some(PAUSED) => Ok(Self::Paused(serde_json::from_value(envelope.params)?)),
            _ => Ok(Self::Other),
        }
    }
}

/// Per-connection protocol state.
///
/// Owns the command id counter and the scriptId -> url table. Both live
/// exactly as long as one connection.
#[derive(Debug)]
pub struct ProtocolSession {
    next_id: u64,
    scripts: HashMap<String, String>,
}

impl ProtocolSession {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            scripts: HashMap::new(),
        }
    }

    /// Serialize the next command for `method`
    pub fn command(&mut self, method: &str) -> Result<String, serde_json::Error> {
        let command = Command {
            id: self.next_id,
            method: method.to_string(),
            params: Value::Object(Default::default()),
        };
        self.next_id += 1;
        serde_json::to_string(&command)
    }

    /// Feed one incoming message.
    ///
    /// Returns the paused call frames when the message is a pause event.
    /// Malformed messages are dropped.
    pub fn handle(&mut self, text: &str) -> Option<Vec<CallFrame>> {
        match IncomingMessage::parse(text) {
            Ok(IncomingMessage::ScriptParsed(script)) => {
                self.scripts.insert(script.script_id, script.url);
                None
            }
            Ok(IncomingMessage::Paused(paused)) => Some(paused.call_frames),
            Ok(IncomingMessage::Other) => None,
            Err(e) => {
                tracing::debug!("Dropping malformed debugger message: {}", e);
                None
            }
        }
    }

    /// URL announced for a script, if any
    pub fn script_url(&self, script_id: &str) -> Option<&str> {
        self.scripts
            .get(script_id)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }

    /// Normalize paused call frames against the known scripts
    pub fn stack_frames(&self, call_frames: &[CallFrame]) -> Vec<StackFrame> {
        call_frames_to_stack_frames(call_frames, |id| self.script_url(id).map(str::to_string))
    }

    pub fn known_scripts(&self) -> usize {
        self.scripts.len()
    }
}

impl Default for ProtocolSession {
    fn default() -> Self {
        Self::new()
    }
}
