//! Locale-aware message lookup through an injected `t(key, params?)`.
//!
//! `[[@ key ]]` is shorthand for `[[= t("key") ]]`. Messages interpolate
//! `{name}` placeholders from the optional params object. A key with no
//! translation in the active locale renders as the key itself.

use std::{cell::RefCell, rc::Rc, sync::OnceLock};

use indexmap::IndexMap;
use log::{debug, warn};
use regex::{Captures, Regex};

use super::{Plugin, PluginContext};
use crate::{
    engine::Engine,
    error::{Error, Result},
    script::Value,
};

pub const DEFAULT_LOCALE: &str = "en";

/// Installs translation lookup, starting in `locale`.
#[derive(Debug, Clone)]
pub struct I18n {
    locale: String,
}

impl I18n {
    pub fn new<S: Into<String>>(locale: S) -> Self {
        Self { locale: locale.into() }
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

#[derive(Debug, Default)]
struct Catalog {
    locale: String,
    tables: IndexMap<String, IndexMap<String, String>>,
}

impl Catalog {
    fn message(&self, key: &str) -> Option<&str> {
        self.tables.get(&self.locale)?.get(key).map(String::as_str)
    }
}

#[derive(Clone, Default)]
struct Shared(Rc<RefCell<Catalog>>);

impl Plugin for I18n {
    fn install(self, engine: &mut Engine, context: &mut PluginContext) {
        if engine.extensions().contains::<Shared>() {
            warn!("I18n plugin is already installed; skipping");
            return;
        }
        let shared = Shared::default();
        shared.0.borrow_mut().locale = self.locale;
        engine.extensions_mut().insert(shared.clone());

        context.add_preprocessor(rewrite_shorthand);

        let translate = Value::native("t", move |_, args| {
            let key = args.first().map(Value::to_display_string).unwrap_or_default();
            let catalog = shared.0.borrow();
            let message = catalog.message(&key).unwrap_or(key.as_str());
            Ok(Value::String(interpolate(message, args.get(1))))
        });
        context.inject("t", move || translate.clone());
        debug!("Installed i18n plugin");
    }
}

fn shorthand_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\[\[@\s*(.+?)\s*\]\]").expect("shorthand pattern is valid")
    })
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"))
}

fn rewrite_shorthand(template: &str) -> String {
    shorthand_pattern()
        .replace_all(template, |caps: &Captures| {
            format!("[[= t({}) ]]", serde_json::Value::from(&caps[1]))
        })
        .into_owned()
}

/// Replaces `{name}` with the matching member of `params`; unknown
/// placeholders are left as written.
fn interpolate(message: &str, params: Option<&Value>) -> String {
    let Some(Value::Object(params)) = params else {
        return message.to_string();
    };
    let params = params.borrow();
    placeholder_pattern()
        .replace_all(message, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.to_display_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Translation management on an engine with [`I18n`] installed.
pub trait I18nExt {
    /// Merges `messages` into the table for `locale`.
    fn add_translations<L, I, K, V>(&self, locale: L, messages: I) -> Result<()>
    where
        L: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>;

    fn set_locale<L: Into<String>>(&self, locale: L) -> Result<()>;

    fn locale(&self) -> Result<String>;
}

impl I18nExt for Engine {
    fn add_translations<L, I, K, V>(&self, locale: L, messages: I) -> Result<()>
    where
        L: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let locale = locale.into();
        let mut catalog = shared(self)?.0.borrow_mut();
        let table = catalog.tables.entry(locale.clone()).or_default();
        let before = table.len();
        table.extend(messages.into_iter().map(|(k, v)| (k.into(), v.into())));
        debug!("Added {} translation(s) for locale '{locale}'", table.len() - before);
        Ok(())
    }

    fn set_locale<L: Into<String>>(&self, locale: L) -> Result<()> {
        let locale = locale.into();
        let mut catalog = shared(self)?.0.borrow_mut();
        if !catalog.tables.contains_key(&locale) {
            warn!("Switching to locale '{locale}', which has no translations");
        }
        catalog.locale = locale;
        Ok(())
    }

    fn locale(&self) -> Result<String> {
        Ok(shared(self)?.0.borrow().locale.clone())
    }
}

fn shared(engine: &Engine) -> Result<&Shared> {
    engine.extensions().get::<Shared>().ok_or(Error::PluginNotInstalled("i18n"))
}
