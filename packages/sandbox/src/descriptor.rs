// ABOUTME: Wire types shared by the host and the in-container command runner
// ABOUTME: The .execute descriptor, export records and the JSON export marker

use serde::{Deserialize, Serialize};

/// Printed before each command in streaming mode unless `no_parse` is set
pub const SEPARATOR: &str = "---.executor---";
/// Prefix of the aggregated JSON result in export mode
pub const EXPORT_MARKER: &str = "ExecutorJSON:";
/// Appended to a command's captured output when its deadline expires
pub const TIMEOUT_ANNOTATION: &str = " (Error: script execution timeout)";
/// Conventional descriptor file name inside the session directory
pub const DESCRIPTOR_FILE: &str = ".execute";

/// One command in the descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Duration such as `2s`; absent or empty means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Extra `KEY=VALUE` entries added to the inherited environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
}

impl Command {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
            env: None,
        }
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.env.get_or_insert_with(Vec::new).push(entry.into());
        self
    }

    /// `KEY=VALUE` entries split into pairs. Entries without `=` are skipped.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .flatten()
            .filter_map(|entry| entry.split_once('='))
    }
}

/// Contents of the `.execute` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteDescriptor {
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub no_parse: bool,
    #[serde(default)]
    pub export_json: bool,
}

/// Result of one command in export mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub command: Command,
    /// Combined stdout and stderr, trimmed
    pub output: String,
}

/// Decode the records after the last export marker that is followed by a record array.
///
/// Markers echoed inside record strings are skipped. Returns `None` when no
/// marker is followed by a record array, e.g. when the container was killed
/// before the runner finished.
pub fn extract_exports(output: &str) -> Option<Vec<ExportRecord>> {
    output
        .rmatch_indices(EXPORT_MARKER)
        .find_map(|(start, marker)| {
            serde_json::Deserializer::from_str(&output[start + marker.len()..])
                .into_iter::<Vec<ExportRecord>>()
                .next()?
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_descriptor() {
        let descriptor: ExecuteDescriptor = serde_json::from_str(
            r#"{
                "commands": [
                    {"command": "mcs", "args": ["test.cs"], "timeout": "10s"},
                    {"command": "mono", "args": ["test.exe"], "env": ["LANG=C", "DEBUG"]}
                ],
                "export_json": true
            }"#,
        )
        .unwrap();

        assert!(descriptor.export_json);
        assert!(!descriptor.no_parse);
        assert_eq!(
            descriptor.commands[0],
            Command::new("mcs", ["test.cs"]).with_timeout("10s")
        );
        let pairs: Vec<_> = descriptor.commands[1].env_pairs().collect();
        assert_eq!(pairs, vec![("LANG", "C")]);
    }

    #[test]
    fn test_missing_args_default_to_empty() {
        let command: Command = serde_json::from_str(r#"{"command": "ls"}"#).unwrap();
        assert_eq!(command, Command::new("ls", Vec::<String>::new()));
    }

    #[test]
    fn test_extract_exports_after_noise() {
        let output = "pulling layer...\nExecutorJSON:[{\"command\":{\"command\":\"false\",\"args\":[]},\"output\":\"\"},\
                      {\"command\":{\"command\":\"echo\",\"args\":[\"ok\"]},\"output\":\"ok\"}]\n";

        let records = extract_exports(output).unwrap();

        assert_eq!(
            records,
            vec![
                ExportRecord {
                    command: Command::new("false", Vec::<String>::new()),
                    output: String::new(),
                },
                ExportRecord {
                    command: Command::new("echo", ["ok"]),
                    output: "ok".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_exports_uses_last_marker() {
        let output = "echo ExecutorJSON:[] from user code\nExecutorJSON:[{\"command\":{\"command\":\"true\"},\"output\":\"done\"}]";
        let records = extract_exports(output).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].output, "done");
    }

    #[test]
    fn test_extract_exports_marker_inside_records() {
        let output = r#"ExecutorJSON:[{"command":{"command":"echo","args":["ExecutorJSON:"]},"output":"ExecutorJSON:"}]"#;

        let records = extract_exports(output).unwrap();

        assert_eq!(
            records,
            vec![ExportRecord {
                command: Command::new("echo", ["ExecutorJSON:"]),
                output: "ExecutorJSON:".to_string(),
            }]
        );
    }

    #[test]
    fn test_extract_exports_absent() {
        assert_eq!(extract_exports("hello"), None);
        assert_eq!(extract_exports("ExecutorJSON:not json"), None);
    }
}
