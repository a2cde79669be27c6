// ABOUTME: Placeholder substitution for payload contents and command arguments
// ABOUTME: Replaces {name} tokens with bound values and leaves unknown tokens untouched

use regex::{bytes, Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Bound to the in-container session directory, e.g. `/mnt/<id>`
pub const PATH_KEY: &str = "path";
/// Bound to the raw session id
pub const RUNTIME_KEY: &str = "runtime";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

fn placeholder_bytes() -> &'static bytes::Regex {
    static PLACEHOLDER: OnceLock<bytes::Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        bytes::Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Named values substituted into templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: HashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `{path}` / `{runtime}` bindings of a sandbox session
    pub fn for_session(session_id: &str, container_dir: &str) -> Self {
        Self::new()
            .with(PATH_KEY, container_dir)
            .with(RUNTIME_KEY, session_id)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Substitute every bound `{name}` placeholder in `template`.
///
/// Substituted values are not rescanned, so a value that itself looks like a
/// placeholder is inserted literally.
pub fn resolve(template: &str, bindings: &Bindings) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| match bindings.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Byte-level variant of [`resolve`] for file contents that may not be UTF-8.
/// Bytes outside placeholders are copied unchanged.
pub fn resolve_bytes(template: &[u8], bindings: &Bindings) -> Vec<u8> {
    placeholder_bytes()
        .replace_all(template, |caps: &bytes::Captures| {
            let bound = std::str::from_utf8(&caps[1])
                .ok()
                .and_then(|key| bindings.get(key));
            match bound {
                Some(value) => value.as_bytes().to_vec(),
                None => caps[0].to_vec(),
            }
        })
        .into_owned()
}

/// Resolve each argv element independently
pub fn resolve_all(args: &[String], bindings: &Bindings) -> Vec<String> {
    args.iter().map(|arg| resolve(arg, bindings)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> Bindings {
        Bindings::for_session("cn1abc", "/mnt/cn1abc")
    }

    #[test]
    fn test_resolves_known_placeholders() {
        assert_eq!(
            resolve("{path}/a.py", &session()),
            "/mnt/cn1abc/a.py"
        );
        assert_eq!(
            resolve("run-{runtime}.log in {path}", &session()),
            "run-cn1abc.log in /mnt/cn1abc"
        );
    }

    #[test]
    fn test_unknown_placeholders_pass_through() {
        assert_eq!(
            resolve("{path}/{unknown} {}", &session()),
            "/mnt/cn1abc/{unknown} {}"
        );
    }

    #[test]
    fn test_idempotent_without_placeholders() {
        let plain = "print('hi')\nfor x in range(3): pass";
        let once = resolve(plain, &session());
        assert_eq!(once, plain);
        assert_eq!(resolve(&once, &session()), plain);
    }

    #[test]
    fn test_code_braces_are_left_alone() {
        let source = "int main() { return 0; }\nconst o = {path: 1};";
        assert_eq!(resolve(source, &session()), source);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let bindings = Bindings::new().with("a", "{b}").with("b", "oops");
        assert_eq!(resolve("{a}", &bindings), "{b}");
    }

    #[test]
    fn test_resolve_bytes_preserves_non_utf8() {
        let mut content = vec![0xff, 0xfe];
        content.extend_from_slice(b"cd {path} && ./{runtime}.bin");
        content.push(0x80);

        let mut expected = vec![0xff, 0xfe];
        expected.extend_from_slice(b"cd /mnt/cn1abc && ./cn1abc.bin");
        expected.push(0x80);

        assert_eq!(resolve_bytes(&content, &session()), expected);
    }

    #[test]
    fn test_resolve_all_argv() {
        let argv = vec![
            "mcs".to_string(),
            "-out:{path}/test.exe".to_string(),
            "{path}/test.cs".to_string(),
        ];
        assert_eq!(
            resolve_all(&argv, &session()),
            vec!["mcs", "-out:/mnt/cn1abc/test.exe", "/mnt/cn1abc/test.cs"]
        );
    }
}
