// ABOUTME: Caller-facing sandbox request model
// ABOUTME: Maps the loosely typed wire schema onto explicit payload encodings at parse time

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Contents of a staged file, tagged with how it must be decoded
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadData {
    /// Written verbatim
    Raw(String),
    /// Standard base64, decoded before writing
    Base64(String),
    /// Any JSON value, written as its compact JSON text
    Structured(Value),
}

/// One file materialized into the sandbox directory
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "BinaryWire")]
pub struct BinaryPayload {
    pub name: String,
    pub data: PayloadData,
    /// Substitute `{path}` / `{runtime}` in the decoded contents
    pub resolve_template: bool,
}

impl BinaryPayload {
    pub fn raw(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: PayloadData::Raw(data.into()),
            resolve_template: false,
        }
    }

    pub fn base64(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: PayloadData::Base64(data.into()),
            resolve_template: false,
        }
    }

    pub fn structured(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data: PayloadData::Structured(data),
            resolve_template: false,
        }
    }

    pub fn resolved(mut self) -> Self {
        self.resolve_template = true;
        self
    }
}

/// Binary as sent by callers: `data` is a string or any JSON value depending on the flags
#[derive(Debug, Deserialize)]
struct BinaryWire {
    data: Value,
    name: String,
    #[serde(default)]
    resolve: bool,
    #[serde(default)]
    decode_b64: bool,
    #[serde(default)]
    decode_json: bool,
}

impl TryFrom<BinaryWire> for BinaryPayload {
    type Error = String;

    fn try_from(wire: BinaryWire) -> Result<Self, Self::Error> {
        let data = match (wire.decode_b64, wire.decode_json, wire.data) {
            (true, true, _) => {
                return Err(format!(
                    "binary '{}' sets both decode_b64 and decode_json",
                    wire.name
                ))
            }
            (true, false, Value::String(s)) => PayloadData::Base64(s),
            (false, true, value) => PayloadData::Structured(value),
            (false, false, Value::String(s)) => PayloadData::Raw(s),
            (_, _, other) => {
                return Err(format!(
                    "binary '{}' data must be a string unless decode_json is set, got {}",
                    wire.name,
                    json_type(&other)
                ))
            }
        };

        Ok(BinaryPayload {
            name: wire.name,
            data,
            resolve_template: wire.resolve,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Container isolation switches. Network access is off unless requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationProfile {
    #[serde(default, rename = "network")]
    pub allow_network: bool,
    #[serde(default, rename = "read_only")]
    pub read_only_rootfs: bool,
}

/// A request to run a command against an atom image with staged files
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SandboxRequest {
    #[serde(default)]
    pub binaries: Vec<BinaryPayload>,
    /// Entry point argv; may reference `{path}` and `{runtime}`.
    /// Empty means the image's own entry point.
    #[serde(default)]
    pub command: Vec<String>,
    /// Wall-clock limit such as `5s` or `500ms`
    pub timeout: String,
    pub atom: String,
    #[serde(flatten)]
    pub isolation: IsolationProfile,
}

impl SandboxRequest {
    pub fn new(atom: impl Into<String>, command: Vec<String>, timeout: impl Into<String>) -> Self {
        Self {
            binaries: Vec::new(),
            command,
            timeout: timeout.into(),
            atom: atom.into(),
            isolation: IsolationProfile::default(),
        }
    }

    pub fn with_binary(mut self, binary: BinaryPayload) -> Self {
        self.binaries.push(binary);
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationProfile) -> Self {
        self.isolation = isolation;
        self
    }
}
