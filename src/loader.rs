//! File collaborators: rendering template files, loading fragment
//! directories and reading input data.

use indexmap::IndexMap;
use log::debug;
use std::{
    fs,
    io::Read,
    path::Path,
};
use walkdir::WalkDir;

use crate::{
    constants::STDIN_INDICATOR,
    engine::Engine,
    error::{Error, Result},
    ext::PathExt,
};

/// Reads the template at `path` and renders it against `data`.
pub fn render_file<P: AsRef<Path>>(
    engine: &Engine,
    path: P,
    data: &serde_json::Value,
) -> Result<String> {
    let path = path.as_ref();
    debug!("Rendering template file {}", path.display());
    let template = fs::read_to_string(path)?;
    engine.render(template.as_str(), data)
}

/// Loads every file below `dir` as a named fragment.
///
/// Names are paths relative to `dir` without their final extension,
/// `/`-separated (`dir/user/card.html` is `user/card`). Hidden files are
/// skipped. Entries are visited in file-name order so that loading is
/// deterministic.
///
/// # Arguments
/// * `dir` - Root directory of the fragments
///
/// # Returns
/// * `Result<IndexMap<String, String>>` - Fragment name to source text
pub fn load_fragments<P: AsRef<Path>>(dir: P) -> Result<IndexMap<String, String>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::ConfigValidation(format!(
            "fragment directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut fragments = IndexMap::new();
    let entries = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in entries {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.path().fragment_name(dir)?;
        debug!("Loading fragment '{name}' from {}", entry.path().display());
        fragments.insert(name, fs::read_to_string(entry.path())?);
    }
    Ok(fragments)
}

/// Reads render data from an inline JSON string, `-` for stdin, or a JSON
/// or YAML file. With neither source the data is an empty object.
pub fn load_data(inline: Option<&str>, file: Option<&Path>) -> Result<serde_json::Value> {
    if let Some(inline) = inline {
        let text = if inline == STDIN_INDICATOR {
            read_from(std::io::stdin())?
        } else {
            inline.to_string()
        };
        return parse_data(&text);
    }

    if let Some(file) = file {
        let text = fs::read_to_string(file)?;
        let is_yaml = matches!(file.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"));
        return if is_yaml { Ok(serde_yaml::from_str(&text)?) } else { parse_data(&text) };
    }

    Ok(serde_json::Value::Object(serde_json::Map::new()))
}

fn read_from(mut reader: impl Read) -> Result<String> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    Ok(buf)
}

fn parse_data(text: &str) -> Result<serde_json::Value> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    Ok(serde_json::from_str(text)?)
}
