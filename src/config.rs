//! Engine configuration files.
//!
//! A configuration directory holds one of `tinplate.json`, `tinplate.yaml`
//! or `tinplate.yml` (first found wins). Every field is optional:
//!
//! ```yaml
//! max_cache: 50
//! strict: true
//! partials_dir: partials
//! layouts_dir: layouts
//! locale: fr
//! translations:
//!   fr:
//!     greeting: "Bonjour, {name} !"
//! ```
//!
//! Relative directories are resolved against the configuration directory.

use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{
    constants::{CONFIG_FILENAMES, DEFAULT_MAX_CACHE},
    engine::Engine,
    error::{Error, Result},
    loader::load_fragments,
    plugin::{I18n, I18nExt, LayoutExt, Layouts, Partials, PartialsExt, Strict},
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of compiled routines kept in the cache.
    pub max_cache: usize,
    /// Install the strict plugin.
    pub strict: bool,
    /// Directory of fragments for `[[> name ]]`; installs the partials plugin.
    pub partials_dir: Option<PathBuf>,
    /// Directory of layouts for `[[ extends "name" ]]`; installs the layout plugin.
    pub layouts_dir: Option<PathBuf>,
    /// Active locale; setting it or `translations` installs the i18n plugin.
    pub locale: Option<String>,
    pub translations: IndexMap<String, IndexMap<String, String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cache: DEFAULT_MAX_CACHE,
            strict: false,
            partials_dir: None,
            layouts_dir: None,
            locale: None,
            translations: IndexMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_cache == 0 {
            return Err(Error::ConfigValidation("max_cache must be greater than zero".into()));
        }
        if let Some(locale) = &self.locale {
            if locale.trim().is_empty() {
                return Err(Error::ConfigValidation("locale must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Loads and validates the configuration file found in `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        for config_file_name in CONFIG_FILENAMES.iter() {
            let config_file_path = dir.join(config_file_name);
            if !config_file_path.exists() {
                continue;
            }

            debug!("Loading configuration from {}", config_file_path.display());
            let content = std::fs::read_to_string(&config_file_path)?;
            let mut config: EngineConfig = if config_file_name.ends_with(".json") {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };
            config.validate()?;
            config.resolve_paths(dir);
            return Ok(config);
        }

        Err(Error::ConfigNotFound {
            dir: dir.display().to_string(),
            config_files: CONFIG_FILENAMES.join(", "),
        })
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.partials_dir, &mut self.layouts_dir].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Builds an engine with the plugins and fragments this configuration asks for.
    ///
    /// Strict checking is installed last so that its wrapper sees the final
    /// routine shape.
    pub fn build_engine(&self) -> Result<Engine> {
        self.validate()?;
        let mut engine = Engine::with_max_cache(self.max_cache);

        if let Some(dir) = &self.partials_dir {
            engine.use_plugin(Partials);
            let count = engine.register_partials(load_fragments(dir)?)?;
            info!("Loaded {count} partial(s) from {}", dir.display());
        }

        if let Some(dir) = &self.layouts_dir {
            engine.use_plugin(Layouts);
            let count = engine.register_layouts(load_fragments(dir)?)?;
            info!("Loaded {count} layout(s) from {}", dir.display());
        }

        if self.locale.is_some() || !self.translations.is_empty() {
            engine.use_plugin(self.locale.as_deref().map(I18n::new).unwrap_or_default());
            for (locale, messages) in &self.translations {
                engine.add_translations(locale.as_str(), messages.clone())?;
            }
        }

        if self.strict {
            engine.use_plugin(Strict);
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_cache, DEFAULT_MAX_CACHE);
    }

    #[test]
    fn zero_cache_is_rejected() {
        let config = EngineConfig { max_cache: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<EngineConfig>(r#"{"max_cahce": 3}"#).is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = EngineConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
        assert!(err.to_string().contains("tinplate.json, tinplate.yaml, tinplate.yml"));
    }

    #[test]
    fn yaml_config_builds_a_configured_engine() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/header.html"), "<h>[[@ title ]]</h>").unwrap();
        fs::write(
            dir.path().join("tinplate.yaml"),
            concat!(
                "max_cache: 5\nstrict: true\npartials_dir: partials\n",
                "locale: fr\ntranslations:\n  fr:\n    title: Accueil\n",
            ),
        )
        .unwrap();

        let config = EngineConfig::load(dir.path()).unwrap();
        assert_eq!(config.partials_dir, Some(dir.path().join("partials")));

        let engine = config.build_engine().unwrap();
        assert_eq!(engine.render("[[> header ]]", &json!({})).unwrap(), "<h>Accueil</h>");
        let err = engine.render("[[= nope ]]", &json!({})).unwrap_err();
        assert!(err.to_string().contains("Variable \"nope\" is not defined"));
    }

    #[test]
    fn json_config_is_preferred() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tinplate.json"), r#"{"max_cache": 7}"#).unwrap();
        fs::write(dir.path().join("tinplate.yaml"), "max_cache: 9\n").unwrap();
        assert_eq!(EngineConfig::load(dir.path()).unwrap().max_cache, 7);
    }
}
