//! Strict variable checking.

use log::{debug, warn};

use super::{Plugin, PluginContext};
use crate::{constants::params, engine::Engine};

/// Replaces the default data scope with a guarded one: reading an identifier
/// that is not a local, a data member or a routine parameter fails with
/// `Variable "<name>" is not defined` instead of falling back to globals.
#[derive(Debug, Default, Clone, Copy)]
pub struct Strict;

struct Installed;

impl Plugin for Strict {
    fn install(self, engine: &mut Engine, context: &mut PluginContext) {
        if engine.extensions_mut().insert(Installed).is_some() {
            warn!("Strict plugin is already installed; skipping");
            return;
        }
        context.add_wrapper(|_wrapped, inner| format!("strict ({}) {{\n{inner}}}\n", params::DATA));
        debug!("Installed strict plugin");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Helpers, HelpersExt};
    use crate::script::Value;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.use_plugin(Strict);
        engine
    }

    #[test]
    fn defined_names_render() {
        let engine = engine();
        let out = engine
            .render("[[ for (const i of items) { ]][[= i ]][[ } ]]", &json!({ "items": [1, 2] }))
            .unwrap();
        assert_eq!(out, "12");
    }

    #[test]
    fn undefined_names_fail() {
        let engine = engine();
        let err = engine.render("[[= missing ]]", &json!({ "present": 1 })).unwrap_err();
        assert_eq!(err.to_string(), "Render failed: Variable \"missing\" is not defined");
    }

    #[test]
    fn explicit_data_reads_stay_optional() {
        let engine = engine();
        let out = engine.render("[[= data.title ?? 'Untitled' ]]", &json!({})).unwrap();
        assert_eq!(out, "Untitled");
    }

    #[test]
    fn injected_parameters_are_visible() {
        let mut engine = engine();
        engine.use_plugin(Helpers);
        engine.register_helper("one", |_| Ok(Value::Number(1.0))).unwrap();
        assert_eq!(engine.render("[[= helpers.one() ]]", &json!({})).unwrap(), "1");
    }

    #[test]
    fn installing_twice_adds_one_wrapper() {
        let mut engine = engine();
        engine.use_plugin(Strict);
        assert_eq!(engine.context().wrappers().len(), 1);
    }
}
