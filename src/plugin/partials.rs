//! Reusable fragments included with `[[> name ]]` or `[[> (expr) ]]`.
//!
//! Inclusion markers are rewritten into raw-output calls to two injected
//! helpers, so a fragment is looked up and rendered when the including
//! routine runs. Registering a fragment therefore takes effect on the next
//! render, even for templates that are already cached.

use std::{cell::RefCell, rc::Rc, sync::OnceLock};

use indexmap::IndexMap;
use log::{debug, warn};
use regex::{Captures, Regex};

use super::{Plugin, PluginContext};
use crate::{
    constants::MAX_INCLUDE_DEPTH,
    engine::Engine,
    error::{Error, Result, ScriptError},
    script::{Interpreter, Value},
};

const STATIC_HELPER: &str = "__partial";
const DYNAMIC_HELPER: &str = "__partial_dynamic";

/// Installs fragment inclusion.
#[derive(Debug, Default, Clone, Copy)]
pub struct Partials;

#[derive(Clone, Default)]
struct Registry(Rc<RefCell<IndexMap<String, String>>>);

impl Registry {
    fn source(&self, name: &str) -> Option<String> {
        self.0.borrow().get(name).cloned()
    }
}

impl Plugin for Partials {
    fn install(self, engine: &mut Engine, context: &mut PluginContext) {
        if engine.extensions().contains::<Registry>() {
            warn!("Partials plugin is already installed; skipping");
            return;
        }
        let registry = Registry::default();
        engine.extensions_mut().insert(registry.clone());

        context.add_preprocessor(rewrite_inclusions);

        let by_name = {
            let registry = registry.clone();
            Value::native(STATIC_HELPER, move |interp, args| {
                let name = args.first().map(Value::to_display_string).unwrap_or_default();
                include(&registry, interp, &name)
            })
        };
        let by_expr = Value::native(DYNAMIC_HELPER, move |interp, args| {
            let Some(name) = args.first().and_then(Value::as_str).map(str::to_owned) else {
                return Ok(Value::from(""));
            };
            match include(&registry, interp, &name) {
                Err(e) if !e.is_protocol() => {
                    warn!("Partial \"{name}\" failed to render: {e}");
                    Ok(Value::from(""))
                }
                result => result,
            }
        });

        context.inject(STATIC_HELPER, move || by_name.clone());
        context.inject(DYNAMIC_HELPER, move || by_expr.clone());
        debug!("Installed partials plugin");
    }
}

fn inclusion_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\[\[>\s*(.+?)\s*\]\]").expect("inclusion pattern is valid")
    })
}

/// Rewrites inclusion markers into raw-output helper calls.
fn rewrite_inclusions(template: &str) -> String {
    inclusion_pattern()
        .replace_all(template, |caps: &Captures| {
            let target = &caps[1];
            if target.starts_with('(') && target.ends_with(')') {
                format!("[[- {DYNAMIC_HELPER}{target} ]]")
            } else {
                let name = target.trim_matches(|c| c == '"' || c == '\'');
                format!("[[- {STATIC_HELPER}({}) ]]", serde_json::Value::from(name))
            }
        })
        .into_owned()
}

fn include(
    registry: &Registry,
    interp: &mut Interpreter<'_>,
    name: &str,
) -> std::result::Result<Value, ScriptError> {
    let source = registry
        .source(name)
        .ok_or_else(|| ScriptError::NotFound(format!("Partial \"{name}\" not found")))?;

    let depth = interp.depth() + 1;
    if depth > MAX_INCLUDE_DEPTH {
        return Err(ScriptError::DepthExceeded(format!(
            "Partial \"{name}\" exceeds the maximum inclusion depth of {MAX_INCLUDE_DEPTH}"
        )));
    }

    let host = interp
        .host()
        .ok_or_else(|| ScriptError::runtime("partials can only be rendered through an engine"))?;
    let data = interp.data().clone();
    host.render_nested(&source, &data, depth).map(Value::String)
}

/// Fragment registration on an engine with [`Partials`] installed.
pub trait PartialsExt {
    /// Registers or replaces the fragment `name`.
    fn register_partial<N, S>(&self, name: N, source: S) -> Result<()>
    where
        N: Into<String>,
        S: Into<String>;

    /// Registers every `(name, source)` pair, returning how many were added.
    fn register_partials<I, N, S>(&self, partials: I) -> Result<usize>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        partials.into_iter().try_fold(0, |count, (name, source)| {
            self.register_partial(name, source)?;
            Ok(count + 1)
        })
    }

    fn has_partial(&self, name: &str) -> Result<bool>;

    /// Removes a fragment, returning its source.
    fn remove_partial(&self, name: &str) -> Result<Option<String>>;
}

impl PartialsExt for Engine {
    fn register_partial<N, S>(&self, name: N, source: S) -> Result<()>
    where
        N: Into<String>,
        S: Into<String>,
    {
        let name = name.into();
        debug!("Registering partial '{name}'");
        registry(self)?.0.borrow_mut().insert(name, source.into());
        Ok(())
    }

    fn has_partial(&self, name: &str) -> Result<bool> {
        Ok(registry(self)?.0.borrow().contains_key(name))
    }

    fn remove_partial(&self, name: &str) -> Result<Option<String>> {
        Ok(registry(self)?.0.borrow_mut().shift_remove(name))
    }
}

fn registry(engine: &Engine) -> Result<&Registry> {
    engine.extensions().get::<Registry>().ok_or(Error::PluginNotInstalled("partials"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.use_plugin(Partials);
        engine
    }

    #[test]
    fn rewrites_static_and_dynamic_markers() {
        assert_eq!(rewrite_inclusions("[[> header ]]"), "[[- __partial(\"header\") ]]");
        assert_eq!(rewrite_inclusions("[[>\"a/b\"]]"), "[[- __partial(\"a/b\") ]]");
        assert_eq!(
            rewrite_inclusions("[[> (kind + 'Row') ]]"),
            "[[- __partial_dynamic(kind + 'Row') ]]"
        );
    }

    #[test]
    fn splices_fragments_without_extra_characters() {
        let engine = engine();
        engine.register_partial("header", "<h>H</h>").unwrap();
        engine.register_partial("footer", "<f>F</f>").unwrap();
        let out = engine.render("[[> header ]]mid[[> footer ]]", &json!({})).unwrap();
        assert_eq!(out, "<h>H</h>mid<f>F</f>");
    }

    #[test]
    fn fragments_see_the_including_data() {
        let engine = engine();
        engine.register_partial("greet", "Hi [[= name ]]").unwrap();
        engine.register_partial("card", "<p>[[> greet ]]</p>").unwrap();
        let out = engine.render("[[> card ]]", &json!({ "name": "Ann" })).unwrap();
        assert_eq!(out, "<p>Hi Ann</p>");
    }

    #[test]
    fn unknown_fragment_fails() {
        let engine = engine();
        let err = engine.render("[[> nope ]]", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Render failed: Partial \"nope\" not found");
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let engine = engine();
        engine.register_partial("loop", "x[[> loop ]]").unwrap();
        let err = engine.render("[[> loop ]]", &json!({})).unwrap_err();
        assert!(err.to_string().contains("maximum inclusion depth of 10"), "{err}");
    }

    #[test]
    fn dynamic_inclusion_swallows_ordinary_failures() {
        let engine = engine();
        engine.register_partial("broken", "[[= missing ]]").unwrap();
        engine.register_partial("ok", "fine").unwrap();

        let template = "[[> (which) ]]|";
        assert_eq!(engine.render(template, &json!({ "which": "ok" })).unwrap(), "fine|");
        assert_eq!(engine.render(template, &json!({ "which": "broken" })).unwrap(), "|");
        assert_eq!(engine.render(template, &json!({ "which": 3 })).unwrap(), "|");

        let err = engine.render(template, &json!({ "which": "absent" })).unwrap_err();
        assert!(err.to_string().contains("Partial \"absent\" not found"));
    }

    #[test]
    fn registration_is_live_for_cached_templates() {
        let engine = engine();
        engine.register_partial("p", "one").unwrap();
        assert_eq!(engine.render("[[> p ]]", &json!({})).unwrap(), "one");
        engine.register_partial("p", "two").unwrap();
        assert_eq!(engine.render("[[> p ]]", &json!({})).unwrap(), "two");
        assert_eq!(engine.remove_partial("p").unwrap().as_deref(), Some("two"));
        assert!(!engine.has_partial("p").unwrap());
    }

    #[test]
    fn requires_installation() {
        let engine = Engine::new();
        assert!(matches!(
            engine.register_partial("a", "b"),
            Err(Error::PluginNotInstalled("partials"))
        ));
    }

    #[test]
    fn installing_twice_is_ignored() {
        let mut engine = engine();
        engine.use_plugin(Partials);
        assert_eq!(engine.context().extra_params().len(), 2);
    }
}
