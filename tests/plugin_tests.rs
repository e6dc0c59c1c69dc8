#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;
    use tinplate::{
        compose,
        plugin::{
            Helpers, HelpersExt, I18n, I18nExt, LayoutExt, Layouts, Partials, PartialsExt, Strict,
        },
        script::Value,
        Engine, Error, Plugin, PluginContext,
    };

    /// Rewrites `[[! expr !]]` into uppercased raw output.
    fn shout(_: &mut Engine, context: &mut PluginContext) {
        context.add_preprocessor(|text| {
            text.replace("[[! ", "[[- (").replace(" !]]", ").toUpperCase() ]]")
        });
    }

    /// Appends a comment line to the wrapped routine.
    fn trailer(_: &mut Engine, context: &mut PluginContext) {
        context.add_wrapper(|wrapped, _inner| format!("{wrapped}// wrapped\n"));
    }

    #[test]
    fn preprocessors_rewrite_before_tokenizing() {
        let mut engine = Engine::new();
        engine.use_plugin(shout);
        assert_eq!(engine.render("[[! name !]]", &json!({ "name": "ann" })).unwrap(), "ANN");
    }

    #[test]
    fn wrappers_receive_the_evolving_code() {
        let mut engine = Engine::new();
        engine.use_plugin(trailer).use_plugin(trailer);
        assert_eq!(engine.render("ok", &json!({})).unwrap(), "ok");
        assert_eq!(engine.context().wrappers().len(), 2);
    }

    #[test]
    fn composed_plugins_install_in_order() {
        let mut engine = Engine::new();
        engine.use_plugin(compose(compose(Partials, Helpers), Strict));
        engine.register_partial("p", "[[= helpers.id(x) ]]").unwrap();
        engine.register_helper("id", |args| Ok(args[0].clone())).unwrap();

        assert_eq!(engine.render("<[[> p ]]>", &json!({ "x": "y" })).unwrap(), "<y>");
        assert!(engine.render("[[= z ]]", &json!({})).is_err());
    }

    #[test]
    fn plugin_may_attach_state() {
        struct Greeting(&'static str);
        struct Greeter;

        impl Plugin for Greeter {
            fn install(self, engine: &mut Engine, context: &mut PluginContext) {
                engine.extensions_mut().insert(Greeting("hello"));
                context.inject("greet", || Value::from("hello"));
            }
        }

        let mut engine = Engine::new();
        engine.use_plugin(Greeter);
        assert_eq!(engine.extensions().get::<Greeting>().map(|g| g.0), Some("hello"));
        assert_eq!(engine.render("[[= greet ]]!", &json!({})).unwrap(), "hello!");
    }

    #[test]
    fn extension_methods_need_their_plugin() {
        let engine = Engine::new();
        assert!(matches!(
            engine.register_layout("a", "b"),
            Err(Error::PluginNotInstalled("layout"))
        ));
        assert!(matches!(
            engine.register_partial("a", "b"),
            Err(Error::PluginNotInstalled("partials"))
        ));
        assert!(matches!(
            engine.register_helper("a", |_| Ok(Value::Null)),
            Err(Error::PluginNotInstalled("helpers"))
        ));
        assert!(matches!(engine.locale(), Err(Error::PluginNotInstalled("i18n"))));
    }

    #[test]
    fn all_plugins_together() {
        let mut engine = Engine::new();
        engine
            .use_plugin(Partials)
            .use_plugin(Layouts)
            .use_plugin(Helpers)
            .use_plugin(I18n::new("de"))
            .use_plugin(Strict);

        engine
            .register_layout(
                "base",
                "<h1>[[ block title ]][[@ site ]][[ endblock ]]</h1>[[ block body ]][[ endblock ]]",
            )
            .unwrap();
        engine.register_partial("footer", "<small>[[= owner ]]</small>").unwrap();
        engine
            .register_helper("upper", |args| {
                let text = args.first().map(Value::to_display_string).unwrap_or_default();
                Ok(Value::from(text.to_uppercase()))
            })
            .unwrap();
        engine.add_translations("de", [("site", "Startseite")]).unwrap();

        let page = concat!(
            r#"[[ extends "base" ]][[ block body ]]<ul>"#,
            "[[ for (const item of items) { ]]<li>[[= helpers.upper(item) ]]</li>[[ } ]]",
            "</ul>[[> footer ]][[ endblock ]]",
        );
        let out = engine.render(page, &json!({ "items": ["a", "b"], "owner": "ann" })).unwrap();
        assert_eq!(out, "<h1>Startseite</h1><ul><li>A</li><li>B</li></ul><small>ann</small>");
    }

    #[test]
    fn plugin_may_install_other_plugins() {
        let mut engine = Engine::new();
        engine.use_plugin(|engine: &mut Engine, context: &mut PluginContext| {
            engine.use_plugin(Partials);
            context.inject("site", || Value::from("Docs"));
        });
        engine.register_partial("h", "<h>[[= site ]]</h>").unwrap();

        assert_eq!(engine.render("[[> h ]]", &json!({})).unwrap(), "<h>Docs</h>");
        assert_eq!(engine.context().extra_params().len(), 3);
        assert!(engine.context().is_balanced());

        // Installing it again at the top level is a no-op.
        engine.use_plugin(Partials);
        assert_eq!(engine.context().extra_params().len(), 3);
        assert_eq!(engine.render("[[> h ]]!", &json!({})).unwrap(), "<h>Docs</h>!");
    }

    #[test]
    fn partial_sees_loop_locals_only_through_data() {
        let mut engine = Engine::new();
        engine.use_plugin(Partials);
        engine.register_partial("row", "[[= item ]]").unwrap();

        let err = engine
            .render("[[ for (const item of items) { ]][[> row ]][[ } ]]", &json!({ "items": [1] }))
            .unwrap_err();
        assert_eq!(err.to_string(), "Render failed: ReferenceError: item is not defined");
    }
}
