//! Flattening nested parameters into named parts.
//!
//! Nested keys are rendered as `parent[child]`, depth-first, in insertion
//! order. Containers never produce a part of their own.

use std::fs::File;
use std::path::PathBuf;

use crate::error::Error;
use crate::params::{ParamValue, Params, Scalar};

#[derive(Debug)]
pub enum PartContents {
    Text(String),
    /// An open file, read as a stream when the request is sent.
    File { file: File, path: PathBuf },
}

/// One named unit of a multipart body.
#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub contents: PartContents,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl Part {
    fn text(name: String, scalar: &Scalar) -> Self {
        Self {
            name,
            contents: PartContents::Text(form_text(scalar)),
            filename: None,
            content_type: None,
        }
    }

    fn file(name: String, path: PathBuf) -> Result<Self, Error> {
        let file = File::open(&path)?;
        Ok(Self {
            name,
            contents: PartContents::File { file, path },
            filename: None,
            content_type: None,
        })
    }

    /// Text contents, or `None` for file parts.
    pub fn text_contents(&self) -> Option<&str> {
        match &self.contents {
            PartContents::Text(text) => Some(text),
            PartContents::File { .. } => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.contents, PartContents::File { .. })
    }
}

/// Form field text for a scalar. `false` is an empty field here, while query
/// strings render it as `0`.
fn form_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Bool(false) => String::new(),
        other => other.to_string(),
    }
}

fn part_name(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}[{}]", prefix, key)
    }
}

/// Encode `params` into a flat list of parts, opening every file value.
pub fn encode(params: &Params, prefix: &str) -> Result<Vec<Part>, Error> {
    let mut parts = Vec::new();
    encode_into(params, prefix, &mut parts)?;
    Ok(parts)
}

fn encode_into(params: &Params, prefix: &str, parts: &mut Vec<Part>) -> Result<(), Error> {
    for (key, value) in params.iter() {
        let name = part_name(prefix, key);
        match value {
            ParamValue::File(file_ref) => {
                let mut part = Part::file(name, file_ref.path.clone())?;
                part.filename = Some(file_ref.filename.clone());
                part.content_type = Some(file_ref.content_type.clone());
                parts.push(part);
            }
            ParamValue::FilePath(path) => parts.push(Part::file(name, path.clone())?),
            ParamValue::Nested(nested) => encode_into(nested, &name, parts)?,
            ParamValue::Scalar(scalar) => parts.push(Part::text(name, scalar)),
        }
    }
    Ok(())
}

/// Flatten `params` into query-string pairs using the same bracket naming.
///
/// File values are sent as their path.
pub fn flatten_query(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    flatten_into(params, "", &mut pairs);
    pairs
}

fn flatten_into(params: &Params, prefix: &str, pairs: &mut Vec<(String, String)>) {
    for (key, value) in params.iter() {
        let name = part_name(prefix, key);
        match value {
            ParamValue::Scalar(scalar) => pairs.push((name, scalar.to_string())),
            ParamValue::File(file_ref) => {
                pairs.push((name, file_ref.path.to_string_lossy().into_owned()))
            }
            ParamValue::FilePath(path) => pairs.push((name, path.to_string_lossy().into_owned())),
            ParamValue::Nested(nested) => flatten_into(nested, &name, pairs),
        }
    }
}
