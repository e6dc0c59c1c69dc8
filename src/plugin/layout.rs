//! Template inheritance with `[[ extends "name" ]]` and named blocks.
//!
//! A child template that starts with an `extends` marker only contributes
//! its `[[ block id ]]…[[ endblock ]]` sections. The preprocessor splices
//! those into the named layout, walking up the inheritance chain, and the
//! fully resolved text is what gets tokenized. Blocks do not nest.
//!
//! Resolution happens at compile time, so changing a registered layout
//! needs an [`Engine::clear`] before templates that were already rendered
//! observe it.

use std::{cell::RefCell, rc::Rc, sync::OnceLock};

use indexmap::IndexMap;
use log::{debug, warn};
use regex::{Captures, Regex};

use super::{Plugin, PluginContext};
use crate::{
    constants::MAX_INCLUDE_DEPTH,
    engine::Engine,
    error::{Error, Result},
};

/// Installs layout inheritance.
#[derive(Debug, Default, Clone, Copy)]
pub struct Layouts;

#[derive(Clone, Default)]
struct Registry(Rc<RefCell<IndexMap<String, String>>>);

impl Plugin for Layouts {
    fn install(self, engine: &mut Engine, context: &mut PluginContext) {
        if engine.extensions().contains::<Registry>() {
            warn!("Layout plugin is already installed; skipping");
            return;
        }
        let registry = Registry::default();
        engine.extensions_mut().insert(registry.clone());

        // Inheritance must be resolved before other rewrites see the text.
        context.prepend_preprocessor(move |template| {
            let layouts = registry.0.borrow();
            match resolve(&layouts, template) {
                Ok(resolved) => resolved,
                Err(message) => {
                    debug!("Layout resolution failed: {message}");
                    format!("[[ throw {} ]]", serde_json::Value::from(message))
                }
            }
        });
        debug!("Installed layout plugin");
    }
}

fn extends_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*\[\[\s*extends\s+["']([^"']+)["']\s*\]\]"#)
            .expect("extends pattern is valid")
    })
}

fn block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\[\[\s*block\s+([\w-]+)\s*\]\](.*?)\[\[\s*endblock\s*\]\]")
            .expect("block pattern is valid")
    })
}

/// Resolves the inheritance chain of `template`.
///
/// # Returns
/// * `Ok(String)` - Root layout text with the most-derived block contents
/// * `Err(String)` - Message for a missing layout or a chain that is too deep
fn resolve(
    layouts: &IndexMap<String, String>,
    template: &str,
) -> std::result::Result<String, String> {
    let mut overrides: IndexMap<String, String> = IndexMap::new();
    let mut current = template.to_string();
    let mut level = 0;

    while let Some(caps) = extends_pattern().captures(&current) {
        let name = caps[1].to_string();
        level += 1;
        if level > MAX_INCLUDE_DEPTH {
            return Err(format!(
                "Layout \"{name}\" exceeds the maximum inheritance depth of {MAX_INCLUDE_DEPTH}"
            ));
        }

        for block in block_pattern().captures_iter(&current) {
            overrides.entry(block[1].to_string()).or_insert_with(|| block[2].to_string());
        }
        current = layouts
            .get(&name)
            .cloned()
            .ok_or_else(|| format!("Layout \"{name}\" not found"))?;
    }

    Ok(block_pattern()
        .replace_all(&current, |caps: &Captures| {
            overrides.get(&caps[1]).map_or(&caps[2], String::as_str).to_string()
        })
        .into_owned())
}

/// Layout registration on an engine with [`Layouts`] installed.
pub trait LayoutExt {
    /// Registers or replaces the layout `name`.
    fn register_layout<N, S>(&self, name: N, source: S) -> Result<()>
    where
        N: Into<String>,
        S: Into<String>;

    fn register_layouts<I, N, S>(&self, layouts: I) -> Result<usize>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        layouts.into_iter().try_fold(0, |count, (name, source)| {
            self.register_layout(name, source)?;
            Ok(count + 1)
        })
    }

    fn has_layout(&self, name: &str) -> Result<bool>;
}

impl LayoutExt for Engine {
    fn register_layout<N, S>(&self, name: N, source: S) -> Result<()>
    where
        N: Into<String>,
        S: Into<String>,
    {
        let name = name.into();
        debug!("Registering layout '{name}'");
        registry(self)?.0.borrow_mut().insert(name, source.into());
        Ok(())
    }

    fn has_layout(&self, name: &str) -> Result<bool> {
        Ok(registry(self)?.0.borrow().contains_key(name))
    }
}

fn registry(engine: &Engine) -> Result<&Registry> {
    engine.extensions().get::<Registry>().ok_or(Error::PluginNotInstalled("layout"))
}
