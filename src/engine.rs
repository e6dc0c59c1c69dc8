//! The render driver.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::{debug, trace};

use crate::{
    cache::{Routine, RoutineCache},
    config::EngineConfig,
    constants::DEFAULT_MAX_CACHE,
    error::{Error, Result, ScriptError},
    escape::escape_value,
    plugin::{Extensions, Plugin, PluginContext},
    script::{parse_program, Interpreter, RenderHost, Value},
    template::{default_wrapper, generate, tokenize},
};

/// Compiles templates into routines and renders them against data.
///
/// An engine owns one routine cache and one plugin context for its whole
/// life. It is single-owner: plugin installation, fragment/helper
/// registration and [`Engine::clear`] take effect immediately and are not
/// synchronised, which is why the type is neither `Send` nor `Sync`.
///
/// The cache is keyed by the raw template text. Plugin state that is read
/// at compile time (layouts, for instance) is therefore baked into cached
/// routines; call [`Engine::clear`] after changing it.
pub struct Engine {
    cache: RefCell<RoutineCache>,
    /// Parameter-list version the cached routines were compiled against.
    compiled_version: Cell<u64>,
    context: PluginContext,
    extensions: Extensions,
    escape: Value,
}

impl Engine {
    /// Creates an engine with the default cache size.
    pub fn new() -> Self {
        Self::with_max_cache(DEFAULT_MAX_CACHE)
    }

    /// Creates an engine whose cache holds at most `max_cache` routines.
    pub fn with_max_cache(max_cache: usize) -> Self {
        Self {
            cache: RefCell::new(RoutineCache::new(max_cache)),
            compiled_version: Cell::new(0),
            context: PluginContext::default(),
            extensions: Extensions::default(),
            escape: Value::native("escapeHTML", |_, args| {
                let value = args.first().cloned().unwrap_or_default();
                Ok(Value::String(escape_value(&value)))
            }),
        }
    }

    /// Creates an engine with the plugins and fragments `config` asks for.
    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        config.build_engine()
    }

    /// Installs a plugin. The plugin runs immediately, exactly once.
    ///
    /// A plugin may install others through `engine` while it runs. Their
    /// hooks are merged in as if they had been installed first.
    pub fn use_plugin<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        let mut context = std::mem::take(&mut self.context);
        let mark = context.mark();
        plugin.install(self, &mut context);
        let nested = std::mem::replace(&mut self.context, context);
        self.context.absorb(nested, mark);
        debug!(
            "Installed plugin; routine parameters are now {:?}",
            self.context.routine_params()
        );
        self
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut PluginContext {
        &mut self.context
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Renders `template` against JSON `data`.
    ///
    /// # Arguments
    /// * `template` - Template text; `None` or `""` is rejected before any
    ///   compilation work
    /// * `data` - Values visible to the template as free identifiers
    ///
    /// # Returns
    /// * `Result<String>` - Rendered text, or a `MissingTemplate`, `Compile`
    ///   or `Render` error; a failed render never yields partial output
    pub fn render<'t, T>(&self, template: T, data: &serde_json::Value) -> Result<String>
    where
        T: Into<Option<&'t str>>,
    {
        let template = Self::require(template.into())?;
        self.render_value(template, Value::from_json(data))
    }

    /// Like [`Engine::render`] but takes an already-converted data value.
    pub fn render_value<'t, T>(&self, template: T, data: Value) -> Result<String>
    where
        T: Into<Option<&'t str>>,
    {
        let template = Self::require(template.into())?;
        let routine = self.compile(template)?;
        self.invoke(&routine, &data, 0).map_err(|e| Error::Render(e.to_string()))
    }

    fn require(template: Option<&str>) -> Result<&str> {
        match template {
            Some(template) if !template.is_empty() => Ok(template),
            _ => Err(Error::MissingTemplate),
        }
    }

    /// Returns the cached routine for `template`, compiling it on a miss.
    pub fn compile(&self, template: &str) -> Result<Rc<Routine>> {
        self.sync_cache_version();

        if let Some(routine) = self.cache.borrow().get(template) {
            trace!("Routine cache hit");
            return Ok(routine);
        }
        debug!("Routine cache miss; compiling template of {} bytes", template.len());

        let source = self
            .context
            .preprocessors()
            .iter()
            .fold(template.to_string(), |text, preprocess| preprocess(&text));

        let inner = generate(&tokenize(&source));
        let code = self
            .context
            .wrappers()
            .iter()
            .fold(default_wrapper(&inner), |wrapped, wrap| wrap(&wrapped, &inner));
        trace!("Generated routine:\n{code}");

        let program = parse_program(self.context.routine_params(), &code)
            .map_err(|e| Error::Compile(e.to_string()))?;
        let routine = Rc::new(Routine::new(program));
        self.cache.borrow_mut().insert(template.to_string(), Rc::clone(&routine));
        Ok(routine)
    }

    /// Drops cached routines whose parameter list no longer matches the context.
    fn sync_cache_version(&self) {
        let current = self.context.bindings_version();
        if self.compiled_version.get() != current {
            let mut cache = self.cache.borrow_mut();
            if !cache.is_empty() {
                debug!("Routine parameters changed; dropping {} cached routine(s)", cache.len());
                cache.clear();
            }
            self.compiled_version.set(current);
        }
    }

    fn invoke(
        &self,
        routine: &Routine,
        data: &Value,
        depth: usize,
    ) -> std::result::Result<String, ScriptError> {
        let mut args = Vec::with_capacity(2 + self.context.extra_args().len());
        args.push(data.clone());
        args.push(self.escape.clone());
        args.extend(self.context.extra_args().iter().map(|provide| provide()));

        if args.len() != routine.arity() {
            return Err(ScriptError::runtime(format!(
                "arity mismatch: routine expects {} argument(s) but received {}",
                routine.arity(),
                args.len()
            )));
        }

        let mut interpreter = Interpreter::new(data.clone()).with_host(self, depth);
        let output = interpreter.run(routine.program(), args)?;
        Ok(output.to_display_string())
    }

    /// Empties the routine cache. Plugins and their state are kept.
    pub fn clear(&self) -> &Self {
        self.cache.borrow_mut().clear();
        debug!("Routine cache cleared");
        self
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_cached(&self, template: &str) -> bool {
        self.cache.borrow().contains(template)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderHost for Engine {
    fn render_nested(
        &self,
        template: &str,
        data: &Value,
        depth: usize,
    ) -> std::result::Result<String, ScriptError> {
        if template.is_empty() {
            return Ok(String::new());
        }
        let routine = self.compile(template).map_err(|e| ScriptError::runtime(e.to_string()))?;
        self.invoke(&routine, data, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_text_and_markers() {
        let engine = Engine::new();
        let out = engine.render("Hello [[= name ]]!", &json!({ "name": "<b>" })).unwrap();
        assert_eq!(out, "Hello &lt;b&gt;!");
    }

    #[test]
    fn raw_output_is_not_escaped() {
        let engine = Engine::new();
        let out = engine.render("[[- html ]]", &json!({ "html": "<i>&</i>" })).unwrap();
        assert_eq!(out, "<i>&</i>");
    }

    #[test]
    fn rejects_missing_template() {
        let engine = Engine::new();
        assert!(matches!(engine.render("", &json!({})), Err(Error::MissingTemplate)));
        assert!(matches!(engine.render(None, &json!({})), Err(Error::MissingTemplate)));
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn compile_errors_are_prefixed() {
        let engine = Engine::new();
        let err = engine.render("[[ if (x) { ]]unclosed", &json!({ "x": true })).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.to_string().starts_with("Compilation failed: "));
    }

    #[test]
    fn evaluation_errors_are_prefixed() {
        let engine = Engine::new();
        let err = engine.render("[[= missing ]]", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Render failed: ReferenceError: missing is not defined");
    }

    #[test]
    fn caches_by_raw_template() {
        let engine = Engine::new();
        engine.render("[[= a ]]", &json!({ "a": 1 })).unwrap();
        engine.render("[[= a ]]", &json!({ "a": 2 })).unwrap();
        engine.render("[[= a ]] ", &json!({ "a": 3 })).unwrap();
        assert_eq!(engine.cache_len(), 2);
        engine.clear().clear();
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn new_parameters_invalidate_cached_routines() {
        let mut engine = Engine::new();
        engine.render("[[= 1 ]]", &json!({})).unwrap();
        assert!(engine.is_cached("[[= 1 ]]"));

        engine.context_mut().inject("answer", || Value::Number(42.0));
        assert_eq!(engine.render("[[= answer ]]", &json!({})).unwrap(), "42");
        assert!(!engine.is_cached("[[= 1 ]]"));
    }

    #[test]
    fn unbalanced_injection_is_an_arity_mismatch() {
        let mut engine = Engine::new();
        engine.context_mut().push_param("orphan");
        let err = engine.render("x", &json!({})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Render failed: arity mismatch: routine expects 3 argument(s) but received 2"
        );
    }
}
