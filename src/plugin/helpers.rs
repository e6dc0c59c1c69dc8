//! Named helper functions reachable from templates as `helpers.<name>(…)`.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use log::{debug, warn};

use super::{Plugin, PluginContext};
use crate::{
    engine::Engine,
    error::{Error, Result, ScriptError},
    script::Value,
};

/// Name of the injected helper namespace.
pub const NAMESPACE: &str = "helpers";

/// Installs the helper namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct Helpers;

#[derive(Clone, Default)]
struct Registry(Rc<RefCell<IndexMap<String, Value>>>);

impl Plugin for Helpers {
    fn install(self, engine: &mut Engine, context: &mut PluginContext) {
        if engine.extensions().contains::<Registry>() {
            warn!("Helpers plugin is already installed; skipping");
            return;
        }
        let registry = Registry::default();
        engine.extensions_mut().insert(registry.clone());

        // A fresh namespace per invocation, so later registrations show up
        // in cached templates too.
        context.inject(NAMESPACE, move || {
            Value::object(registry.0.borrow().iter().map(|(name, f)| (name.clone(), f.clone())))
        });
        debug!("Installed helpers plugin");
    }
}

/// Helper registration on an engine with [`Helpers`] installed.
pub trait HelpersExt {
    /// Registers or replaces helper `name`.
    fn register_helper<N, F>(&self, name: N, helper: F) -> Result<()>
    where
        N: Into<String>,
        F: Fn(&[Value]) -> std::result::Result<Value, ScriptError> + 'static;

    fn has_helper(&self, name: &str) -> Result<bool>;
}

impl HelpersExt for Engine {
    fn register_helper<N, F>(&self, name: N, helper: F) -> Result<()>
    where
        N: Into<String>,
        F: Fn(&[Value]) -> std::result::Result<Value, ScriptError> + 'static,
    {
        let name = name.into();
        let registry = self
            .extensions()
            .get::<Registry>()
            .ok_or(Error::PluginNotInstalled("helpers"))?;
        debug!("Registering helper '{name}'");
        let function = Value::native(&name, move |_, args| helper(args));
        registry.0.borrow_mut().insert(name, function);
        Ok(())
    }

    fn has_helper(&self, name: &str) -> Result<bool> {
        let registry = self
            .extensions()
            .get::<Registry>()
            .ok_or(Error::PluginNotInstalled("helpers"))?;
        Ok(registry.0.borrow().contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.use_plugin(Helpers);
        engine
            .register_helper("upper", |args| {
                let text = args.first().map(Value::to_display_string).unwrap_or_default();
                Ok(Value::from(text.to_uppercase()))
            })
            .unwrap();
        engine
    }

    #[test]
    fn helpers_are_callable_from_expressions() {
        let engine = engine();
        let out = engine.render("[[= helpers.upper(name) ]]", &json!({ "name": "ann" })).unwrap();
        assert_eq!(out, "ANN");
    }

    #[test]
    fn later_registrations_reach_cached_templates() {
        let engine = engine();
        let template = "[[= helpers.twice ? helpers.twice(2) : 'none' ]]";
        assert_eq!(engine.render(template, &json!({})).unwrap(), "none");

        engine
            .register_helper("twice", |args| Ok(Value::Number(args[0].to_number() * 2.0)))
            .unwrap();
        assert!(engine.has_helper("twice").unwrap());
        assert_eq!(engine.render(template, &json!({})).unwrap(), "4");
    }

    #[test]
    fn helper_errors_fail_the_render() {
        let engine = engine();
        engine.register_helper("fail", |_| Err(ScriptError::runtime("helper refused"))).unwrap();
        let err = engine.render("[[= helpers.fail() ]]", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Render failed: helper refused");
    }

    #[test]
    fn requires_installation() {
        let engine = Engine::new();
        assert!(matches!(engine.has_helper("x"), Err(Error::PluginNotInstalled("helpers"))));
    }
}
