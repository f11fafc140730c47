//! Stack Frame Normalization
//!
//! Converts call frames reported by the remote debugger into portable
//! stack frames: outermost frame first, 1-based positions, and an `in_app`
//! classification based on the resolved filename.

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::protocol::CallFrame;

/// Prefix stripped from script URLs that point at local files
const FILE_SCHEME: &str = "file://";

/// Path fragment marking third-party dependency code
const DEPENDENCY_MARKER: &str = "node_modules/";

lazy_static! {
    /// RFC 3986 scheme followed by `://`
    static ref URI_SCHEME: Regex =
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9.\-+]*://").expect("scheme pattern is valid");
}

/// A normalized stack frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Resolved script path, if the debugger announced the script
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Function name, `?` for anonymous functions
    pub function: String,
    /// 1-based line number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    /// 1-based column number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    /// Whether the frame belongs to the application's own source
    pub in_app: bool,
}

/// Strip the `file://` prefix and decode percent-escapes
pub fn normalize_filename(url: &str) -> String {
    let path = url.strip_prefix(FILE_SCHEME).unwrap_or(url);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Decide whether a frame with the given filename is application code.
///
/// Absolute paths, dot-relative paths and scheme-prefixed URLs are treated as
/// runtime or tooling internals. Anything under a dependency directory is
/// library code.
pub fn is_in_app(filename: Option<&str>) -> bool {
    let Some(filename) = filename else {
        return false;
    };

    let internal = filename.starts_with('/')
        || filename.contains(":\\")
        || filename.starts_with('.')
        || URI_SCHEME.is_match(filename);

    !internal && !filename.contains(DEPENDENCY_MARKER)
}

/// Convert a 0-based debugger position to a 1-based one. Zero is "unknown".
fn one_based(position: u32) -> Option<u32> {
    if position == 0 {
        None
    } else {
        Some(position + 1)
    }
}

/// Convert debugger call frames (innermost first) to stack frames (outermost first)
pub fn call_frames_to_stack_frames<F>(call_frames: &[CallFrame], filename_for: F) -> Vec<StackFrame>
where
    F: Fn(&str) -> Option<String>,
{
    call_frames
        .iter()
        .rev()
        .map(|frame| {
            let filename = filename_for(&frame.location.script_id)
                .map(|url| normalize_filename(&url));
            let in_app = is_in_app(filename.as_deref());

            StackFrame {
                function: if frame.function_name.is_empty() {
                    "?".to_string()
                } else {
                    frame.function_name.clone()
                },
                lineno: one_based(frame.location.line_number),
                colno: one_based(frame.location.column_number),
                filename,
                in_app,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::protocol::Location;
    use std::collections::HashMap;

    fn frame(name: &str, script: &str, line: u32, col: u32) -> CallFrame {
        CallFrame {
            function_name: name.to_string(),
            location: Location {
                script_id: script.to_string(),
                line_number: line,
                column_number: col,
            },
        }
    }

    #[test]
    fn test_in_app_classification() {
        assert!(!is_in_app(Some("/usr/app/index.js")));
        assert!(!is_in_app(Some("C:\\app\\index.js")));
        assert!(!is_in_app(Some("./local.js")));
        assert!(!is_in_app(Some("webpack://app/src/foo.js")));
        assert!(is_in_app(Some("src/foo.js")));
        assert!(!is_in_app(Some("node_modules/lib/index.js")));
        assert!(!is_in_app(Some("src/node_modules/lib/index.js")));
        assert!(!is_in_app(None));
    }

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("file:///repo/app.js"), "/repo/app.js");
        assert_eq!(normalize_filename("file:///my%20repo/app.js"), "/my repo/app.js");
        assert_eq!(normalize_filename("src/app.js"), "src/app.js");
        assert_eq!(normalize_filename("webpack://app/x.js"), "webpack://app/x.js");
    }

    #[test]
    fn test_frames_are_reversed_and_one_based() {
        let scripts: HashMap<&str, &str> = [("s1", "/repo/app.js")].into_iter().collect();
        let raw = vec![frame("b", "s1", 1, 1), frame("a", "s1", 5, 3)];

        let frames = call_frames_to_stack_frames(&raw, |id| scripts.get(id).map(|s| s.to_string()));

        assert_eq!(
            frames,
            vec![
                StackFrame {
                    filename: Some("/repo/app.js".to_string()),
                    function: "a".to_string(),
                    lineno: Some(6),
                    colno: Some(4),
                    in_app: false,
                },
                StackFrame {
                    filename: Some("/repo/app.js".to_string()),
                    function: "b".to_string(),
                    lineno: Some(2),
                    colno: Some(2),
                    in_app: false,
                },
            ]
        );
    }

    #[test]
    fn test_zero_position_is_unknown() {
        let frames = call_frames_to_stack_frames(&[frame("f", "s", 0, 0)], |_| None);
        assert_eq!(frames[0].lineno, None);
        assert_eq!(frames[0].colno, None);

        let frames = call_frames_to_stack_frames(&[frame("f", "s", 9, 4)], |_| None);
        assert_eq!(frames[0].lineno, Some(10));
        assert_eq!(frames[0].colno, Some(5));
    }

    #[test]
    fn test_anonymous_and_unknown_script() {
        let frames = call_frames_to_stack_frames(&[frame("", "missing", 3, 2)], |_| None);
        assert_eq!(frames[0].function, "?");
        assert_eq!(frames[0].filename, None);
        assert!(!frames[0].in_app);
    }

    #[test]
    fn test_relative_script_is_in_app() {
        let frames =
            call_frames_to_stack_frames(&[frame("main", "s", 2, 0)], |_| Some("src/main.js".into()));
        assert!(frames[0].in_app);
    }
}
