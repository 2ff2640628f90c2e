//! Request parameters.
//!
//! Parameters form an insertion-ordered tree. Each leaf is classified once,
//! when it is added, so encoders can match on the shape instead of probing
//! values at send time.

use std::fmt;
use std::path::{Path, PathBuf};

/// A handle marking a parameter as file content.
///
/// Carries the file to stream, the filename to send and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: String,
}

impl FileRef {
    pub fn new(
        path: impl Into<PathBuf>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            content_type: content_type.into(),
        }
    }
}

/// A leaf value sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(text) => f.write_str(text),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Bool(true) => f.write_str("1"),
            Scalar::Bool(false) => f.write_str("0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(Scalar),
    /// Explicit file reference with filename and content type.
    File(FileRef),
    /// A string that named a readable file when it was added.
    FilePath(PathBuf),
    Nested(Params),
}

impl ParamValue {
    /// Classify a string: a path to an existing file becomes [`ParamValue::FilePath`].
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if Path::new(&text).is_file() {
            ParamValue::FilePath(PathBuf::from(text))
        } else {
            ParamValue::Scalar(Scalar::Text(text))
        }
    }

    /// A string that is never treated as a file path.
    pub fn text(text: impl Into<String>) -> Self {
        ParamValue::Scalar(Scalar::Text(text.into()))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::from_text(value)
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::from_text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Scalar(Scalar::Int(value))
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Scalar(Scalar::Int(value.into()))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Scalar(Scalar::Int(value.into()))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(Scalar::Float(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Scalar(Scalar::Bool(value))
    }
}

impl From<FileRef> for ParamValue {
    fn from(value: FileRef) -> Self {
        ParamValue::File(value)
    }
}

impl From<Params> for ParamValue {
    fn from(value: Params) -> Self {
        ParamValue::Nested(value)
    }
}

/// Insertion-ordered parameter mapping.
///
/// Re-inserting an existing key replaces its value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl From<serde_json::Value> for ParamValue {
    /// Objects and arrays become nested mappings (arrays keyed by index),
    /// `null` becomes an empty string. Object keys keep document order.
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ParamValue::text(""),
            Value::Bool(b) => b.into(),
            Value::Number(n) => match n.as_i64() {
                Some(i) => i.into(),
                None => match n.as_f64() {
                    Some(f) => f.into(),
                    None => ParamValue::text(n.to_string()),
                },
            },
            Value::String(s) => ParamValue::from_text(s),
            Value::Array(items) => ParamValue::Nested(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), ParamValue::from(item)))
                    .collect(),
            ),
            Value::Object(map) => ParamValue::Nested(
                map.into_iter()
                    .map(|(k, v)| (k, ParamValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Params {
    /// A non-object, non-array value yields a single entry keyed `"0"`.
    fn from(value: serde_json::Value) -> Self {
        match ParamValue::from(value) {
            ParamValue::Nested(params) => params,
            other => Params::new().with("0", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn insert_keeps_first_position_on_overwrite() {
        let params = Params::new().with("a", 1).with("b", 2).with("a", 3);

        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(params.get("a"), Some(&ParamValue::from(3)));
    }

    #[test]
    fn existing_file_path_is_classified_as_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        assert_eq!(
            ParamValue::from(path.as_str()),
            ParamValue::FilePath(PathBuf::from(&path))
        );
        assert_eq!(
            ParamValue::text(path.clone()),
            ParamValue::Scalar(Scalar::Text(path))
        );
    }

    #[test]
    fn missing_path_stays_text() {
        assert_eq!(
            ParamValue::from("/definitely/not/here.txt"),
            ParamValue::Scalar(Scalar::Text("/definitely/not/here.txt".into()))
        );
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        let value = ParamValue::from(dir.path().to_str().unwrap());
        assert!(matches!(value, ParamValue::Scalar(Scalar::Text(_))));
    }

    #[test]
    fn scalars_render_for_the_wire() {
        assert_eq!(Scalar::Int(-4).to_string(), "-4");
        assert_eq!(Scalar::Float(1.5).to_string(), "1.5");
        assert_eq!(Scalar::Bool(true).to_string(), "1");
        assert_eq!(Scalar::Bool(false).to_string(), "0");
    }

    #[test]
    fn json_objects_and_arrays_become_nested_params() {
        let params = Params::from(json!({
            "name": "widget",
            "tags": ["a", "b"],
            "meta": {"count": 2, "ratio": 0.5, "on": true, "gone": null}
        }));

        assert_eq!(params.get("name"), Some(&ParamValue::text("widget")));

        let Some(ParamValue::Nested(tags)) = params.get("tags") else {
            panic!("tags should be nested");
        };
        assert_eq!(tags.get("1"), Some(&ParamValue::text("b")));

        let Some(ParamValue::Nested(meta)) = params.get("meta") else {
            panic!("meta should be nested");
        };
        assert_eq!(meta.get("count"), Some(&ParamValue::from(2)));
        assert_eq!(meta.get("ratio"), Some(&ParamValue::from(0.5)));
        assert_eq!(meta.get("on"), Some(&ParamValue::from(true)));
        assert_eq!(meta.get("gone"), Some(&ParamValue::text("")));
    }

    #[test]
    fn json_objects_keep_document_order() {
        let params = Params::from(json!({
            "zeta": "1",
            "alpha": {"yak": 2, "bee": 3},
            "mid": "4"
        }));

        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let Some(ParamValue::Nested(alpha)) = params.get("alpha") else {
            panic!("alpha should be nested");
        };
        let keys: Vec<_> = alpha.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["yak", "bee"]);
    }

    #[test]
    fn json_scalar_becomes_single_entry() {
        let params = Params::from(json!(7));
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("0"), Some(&ParamValue::from(7)));
    }
}
