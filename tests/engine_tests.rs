#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::{cell::Cell, rc::Rc};
    use test_log::test;
    use tinplate::{
        plugin::{Helpers, HelpersExt},
        script::Value,
        Engine, Error,
    };

    /// An engine whose `helpers.tick()` counts its calls, plus a handle on
    /// the counter.
    fn counting_engine(max_cache: usize) -> (Engine, Rc<Cell<u32>>) {
        let mut engine = Engine::with_max_cache(max_cache);
        engine.use_plugin(Helpers);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        engine
            .register_helper("tick", move |_| {
                counter.set(counter.get() + 1);
                Ok(Value::Number(counter.get() as f64))
            })
            .unwrap();
        (engine, calls)
    }

    /// Counts compilations by counting preprocessor runs.
    fn count_compiles(engine: &mut Engine) -> Rc<Cell<u32>> {
        let compiles = Rc::new(Cell::new(0));
        let counter = Rc::clone(&compiles);
        engine.context_mut().add_preprocessor(move |text| {
            counter.set(counter.get() + 1);
            text.to_string()
        });
        compiles
    }

    #[test]
    fn escaped_output_uses_fixed_entities_once() {
        let engine = Engine::new();
        let data = json!({ "s": r#"&<>"' and &amp;"# });
        assert_eq!(
            engine.render("[[= s ]]", &data).unwrap(),
            "&amp;&lt;&gt;&quot;&#39; and &amp;amp;"
        );
        assert_eq!(engine.render("[[- s ]]", &data).unwrap(), r#"&<>"' and &amp;"#);
    }

    #[test]
    fn escaping_stringifies_non_strings() {
        let engine = Engine::new();
        let data = json!({ "n": 1.5, "b": true, "list": [1, "<"] });
        let out = engine.render("[[= n ]]|[[= b ]]|[[= list ]]", &data);
        assert_eq!(out.unwrap(), "1.5|true|1,&lt;");
    }

    #[test]
    fn same_template_reuses_its_routine() {
        let (mut engine, calls) = counting_engine(10);
        let compiles = count_compiles(&mut engine);

        let template = "[[= name ]]:[[= helpers.tick() ]]";
        assert_eq!(engine.render(template, &json!({ "name": "a" })).unwrap(), "a:1");
        assert_eq!(engine.render(template, &json!({ "name": "b" })).unwrap(), "b:2");
        assert_eq!(calls.get(), 2);
        assert_eq!(compiles.get(), 1);
        assert_eq!(engine.cache_len(), 1);
    }

    #[test]
    fn full_cache_evicts_first_inserted_template() {
        let (mut engine, _) = counting_engine(3);
        let compiles = count_compiles(&mut engine);

        for i in 0..4 {
            engine.render(format!("t{i}").as_str(), &json!({})).unwrap();
        }
        assert_eq!(compiles.get(), 4);
        assert_eq!(engine.cache_len(), 3);
        assert!(!engine.is_cached("t0"));
        assert!(engine.is_cached("t1"));

        // Reads never refresh position, so t1 is next out.
        engine.render("t1", &json!({})).unwrap();
        assert_eq!(compiles.get(), 4);
        engine.render("t0", &json!({})).unwrap();
        assert_eq!(compiles.get(), 5);
        assert!(!engine.is_cached("t1"));
    }

    #[test]
    fn evicted_template_picks_up_new_plugin_state() {
        let mut engine = Engine::with_max_cache(1);
        engine.use_plugin(Helpers);
        engine.register_helper("v", |_| Ok(Value::from("old"))).unwrap();
        let template = "[[= helpers.v() ]]";
        assert_eq!(engine.render(template, &json!({})).unwrap(), "old");

        engine.register_helper("v", |_| Ok(Value::from("new"))).unwrap();
        engine.render("other", &json!({})).unwrap();
        assert!(!engine.is_cached(template));
        assert_eq!(engine.render(template, &json!({})).unwrap(), "new");
    }

    #[test]
    fn clear_is_idempotent_and_forces_recompile() {
        let mut engine = Engine::new();
        let compiles = count_compiles(&mut engine);

        engine.clear().clear();
        assert_eq!(engine.cache_len(), 0);

        engine.render("x", &json!({})).unwrap();
        engine.render("x", &json!({})).unwrap();
        assert_eq!(compiles.get(), 1);

        engine.clear();
        engine.render("x", &json!({})).unwrap();
        assert_eq!(compiles.get(), 2);
    }

    #[test]
    fn missing_template_is_rejected_before_preprocessing() {
        let mut engine = Engine::new();
        let compiles = count_compiles(&mut engine);

        let empty = engine.render("", &json!({})).unwrap_err();
        assert!(matches!(empty, Error::MissingTemplate));
        assert_eq!(empty.to_string(), "template required");
        assert!(matches!(engine.render(None, &json!({})), Err(Error::MissingTemplate)));
        assert_eq!(compiles.get(), 0);
    }

    #[test]
    fn loops_thread_output_through_closures() {
        let engine = Engine::new();
        let template = "[[ items.forEach(item => { ]][[= item ]][[ }) ]]";
        let out = engine.render(template, &json!({ "items": ["A", "B", "C"] })).unwrap();
        assert_eq!(out, "ABC");
    }

    #[test]
    fn conditionals_choose_one_branch() {
        let engine = Engine::new();
        let template = "[[ if (age >= 18) { ]]Adult[[ } else { ]]Minor[[ } ]]";
        assert_eq!(engine.render(template, &json!({ "age": 15 })).unwrap(), "Minor");
        assert_eq!(engine.render(template, &json!({ "age": 30 })).unwrap(), "Adult");
    }

    #[test]
    fn text_around_branches_is_kept_verbatim() {
        let engine = Engine::new();
        let template = "<p>\n  [[ if (ok) { ]] yes [[ } ]]\n</p>";
        assert_eq!(engine.render(template, &json!({ "ok": true })).unwrap(), "<p>\n   yes \n</p>");
    }

    #[test]
    fn unbalanced_blocks_fail_to_compile() {
        let engine = Engine::new();
        let err = engine.render("[[ } ]]", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert!(err.to_string().starts_with("Compilation failed: SyntaxError"));
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn undefined_identifiers_fail_the_render() {
        let engine = Engine::new();
        let err = engine.render("before [[= nope ]] after", &json!({ "yes": 1 })).unwrap_err();
        assert_eq!(err.to_string(), "Render failed: ReferenceError: nope is not defined");
    }

    #[test]
    fn optional_reads_use_the_data_object() {
        let engine = Engine::new();
        let out = engine.render("[[= data.title ?? 'Untitled' ]]", &json!({})).unwrap();
        assert_eq!(out, "Untitled");
    }

    #[test]
    fn injected_binding_is_visible_by_name() {
        let mut engine = Engine::new();
        engine.use_plugin(|_: &mut Engine, context: &mut tinplate::PluginContext| {
            context.push_param("siteName").push_arg(|| Value::from("Docs"));
        });
        assert_eq!(engine.render("[[= siteName ]]", &json!({})).unwrap(), "Docs");
    }

    #[test]
    fn param_without_arg_is_an_arity_mismatch() {
        let mut engine = Engine::new();
        engine.use_plugin(|_: &mut Engine, context: &mut tinplate::PluginContext| {
            context.push_param("siteName");
        });
        let err = engine.render("[[= siteName ]]", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert!(err.to_string().contains("arity mismatch"));
    }

    #[test]
    fn arg_without_param_is_an_arity_mismatch() {
        let mut engine = Engine::new();
        engine.use_plugin(|_: &mut Engine, context: &mut tinplate::PluginContext| {
            context.push_arg(|| Value::from("Docs"));
        });
        let err = engine.render("static", &json!({})).unwrap_err();
        assert!(err.to_string().contains("arity mismatch"));
    }

    #[test]
    fn extra_args_are_read_at_invocation_time() {
        let mut engine = Engine::new();
        let version = Rc::new(Cell::new(1.0));
        let current = Rc::clone(&version);
        engine.context_mut().inject("version", move || Value::Number(current.get()));

        assert_eq!(engine.render("v[[= version ]]", &json!({})).unwrap(), "v1");
        version.set(2.0);
        assert_eq!(engine.render("v[[= version ]]", &json!({})).unwrap(), "v2");
    }

    #[test]
    fn oversized_values_fail_the_render() {
        let engine = Engine::new();
        for template in [
            "[[= 'ab'.repeat(1e19) ]]",
            "[[= 'ab'.padStart(1e19) ]]",
            "[[ const a = []; a[1e19] = 1 ]]ok",
        ] {
            let err = engine.render(template, &json!({})).unwrap_err();
            assert!(matches!(err, Error::Render(_)), "{template}");
            assert!(err.to_string().starts_with("Render failed: RangeError: Invalid"));
        }
    }

    #[test]
    fn failed_render_leaves_no_partial_output() {
        let engine = Engine::new();
        let result = engine.render("start [[ throw 'stop' ]] end", &json!({}));
        assert_eq!(result.unwrap_err().to_string(), "Render failed: stop");
    }
}
