//! The plugin protocol.
//!
//! A plugin is installed once with [`Engine::use_plugin`] and may:
//! - register preprocessors (text → text, run before tokenizing),
//! - register wrappers (wrapped code, inner code → wrapped code),
//! - inject named routine parameters with live value providers,
//! - attach state to the engine through its [`Extensions`], exposed to
//!   callers through an extension trait.
//!
//! Plugins compose as plain functions: see [`compose`].

pub mod helpers;
pub mod i18n;
pub mod layout;
pub mod partials;
pub mod strict;

pub use helpers::{Helpers, HelpersExt};
pub use i18n::{I18n, I18nExt};
pub use layout::{Layouts, LayoutExt};
pub use partials::{Partials, PartialsExt};
pub use strict::Strict;

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use crate::constants::params;
use crate::engine::Engine;
use crate::script::Value;

pub type Preprocessor = Box<dyn Fn(&str) -> String>;
pub type Wrapper = Box<dyn Fn(&str, &str) -> String>;
/// Produces an injected argument at invocation time.
pub type ArgProvider = Box<dyn Fn() -> Value>;

/// Compilation hooks shared by every installed plugin.
///
/// Parameter names and argument providers are positional and must be pushed
/// in lockstep; [`PluginContext::inject`] does both at once. Changing the
/// parameter list bumps [`PluginContext::bindings_version`], which makes the
/// engine drop routines compiled against the old signature.
#[derive(Default)]
pub struct PluginContext {
    preprocessors: Vec<Preprocessor>,
    wrappers: Vec<Wrapper>,
    extra_params: Vec<String>,
    extra_args: Vec<ArgProvider>,
    bindings_version: u64,
    /// How many entries at the front of each hook list were prepended.
    leading_preprocessors: usize,
    leading_wrappers: usize,
}

/// Lengths of a context's hook lists, taken before a plugin installs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    leading_preprocessors: usize,
    preprocessors: usize,
    leading_wrappers: usize,
    wrappers: usize,
    params: usize,
    args: usize,
}

impl PluginContext {
    /// Appends a preprocessor; it runs after those already registered.
    pub fn add_preprocessor<F>(&mut self, preprocessor: F) -> &mut Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Prepends a preprocessor; it runs before those already registered.
    pub fn prepend_preprocessor<F>(&mut self, preprocessor: F) -> &mut Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.preprocessors.insert(0, Box::new(preprocessor));
        self.leading_preprocessors += 1;
        self
    }

    pub fn add_wrapper<F>(&mut self, wrapper: F) -> &mut Self
    where
        F: Fn(&str, &str) -> String + 'static,
    {
        self.wrappers.push(Box::new(wrapper));
        self
    }

    pub fn prepend_wrapper<F>(&mut self, wrapper: F) -> &mut Self
    where
        F: Fn(&str, &str) -> String + 'static,
    {
        self.wrappers.insert(0, Box::new(wrapper));
        self.leading_wrappers += 1;
        self
    }

    /// Appends a routine parameter name without a matching argument.
    pub fn push_param<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.extra_params.push(name.into());
        self.bindings_version += 1;
        self
    }

    /// Appends an argument provider without a matching parameter name.
    pub fn push_arg<F>(&mut self, provider: F) -> &mut Self
    where
        F: Fn() -> Value + 'static,
    {
        self.extra_args.push(Box::new(provider));
        self
    }

    /// Adds a parameter and its argument provider together.
    pub fn inject<S, F>(&mut self, name: S, provider: F) -> &mut Self
    where
        S: Into<String>,
        F: Fn() -> Value + 'static,
    {
        self.push_param(name).push_arg(provider)
    }

    pub fn preprocessors(&self) -> &[Preprocessor] {
        &self.preprocessors
    }

    pub fn wrappers(&self) -> &[Wrapper] {
        &self.wrappers
    }

    pub fn extra_params(&self) -> &[String] {
        &self.extra_params
    }

    pub fn extra_args(&self) -> &[ArgProvider] {
        &self.extra_args
    }

    pub fn bindings_version(&self) -> u64 {
        self.bindings_version
    }

    /// Full formal parameter list: `data`, `escapeHTML`, then injected names.
    pub fn routine_params(&self) -> Vec<String> {
        [params::DATA, params::ESCAPE]
            .into_iter()
            .map(String::from)
            .chain(self.extra_params.iter().cloned())
            .collect()
    }

    /// Whether every injected parameter has an argument and vice versa.
    pub fn is_balanced(&self) -> bool {
        self.extra_params.len() == self.extra_args.len()
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            leading_preprocessors: self.leading_preprocessors,
            preprocessors: self.preprocessors.len(),
            leading_wrappers: self.leading_wrappers,
            wrappers: self.wrappers.len(),
            params: self.extra_params.len(),
            args: self.extra_args.len(),
        }
    }

    /// Folds in the hooks a nested install registered, placing them as if
    /// they had been installed at `mark`, ahead of anything added since.
    pub(crate) fn absorb(&mut self, nested: PluginContext, mark: Mark) {
        let PluginContext {
            preprocessors,
            wrappers,
            extra_params,
            extra_args,
            bindings_version,
            leading_preprocessors,
            leading_wrappers,
        } = nested;

        graft(
            &mut self.preprocessors,
            preprocessors,
            leading_preprocessors,
            self.leading_preprocessors - mark.leading_preprocessors,
            self.leading_preprocessors + mark.preprocessors - mark.leading_preprocessors,
        );
        self.leading_preprocessors += leading_preprocessors;

        graft(
            &mut self.wrappers,
            wrappers,
            leading_wrappers,
            self.leading_wrappers - mark.leading_wrappers,
            self.leading_wrappers + mark.wrappers - mark.leading_wrappers,
        );
        self.leading_wrappers += leading_wrappers;

        self.extra_params.splice(mark.params..mark.params, extra_params);
        self.extra_args.splice(mark.args..mark.args, extra_args);
        self.bindings_version += bindings_version;
    }
}

/// Inserts the prepended part of `nested` at `front_at` and the appended
/// part at `back_at`.
fn graft<T>(
    list: &mut Vec<T>,
    mut nested: Vec<T>,
    nested_leading: usize,
    front_at: usize,
    back_at: usize,
) {
    let back = nested.split_off(nested_leading);
    list.splice(back_at..back_at, back);
    list.splice(front_at..front_at, nested);
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("preprocessors", &self.preprocessors.len())
            .field("wrappers", &self.wrappers.len())
            .field("extra_params", &self.extra_params)
            .field("extra_args", &self.extra_args.len())
            .field("bindings_version", &self.bindings_version)
            .finish()
    }
}

/// Typed per-engine state attached by plugins.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any>>,
}

impl Extensions {
    /// Stores `value`, returning the previous value of the same type.
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map.get(&TypeId::of::<T>()).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.map.get_mut(&TypeId::of::<T>()).and_then(|value| value.downcast_mut::<T>())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }
}

/// Something that configures an engine once, at install time.
pub trait Plugin {
    fn install(self, engine: &mut Engine, context: &mut PluginContext);
}

impl<F> Plugin for F
where
    F: FnOnce(&mut Engine, &mut PluginContext),
{
    fn install(self, engine: &mut Engine, context: &mut PluginContext) {
        self(engine, context)
    }
}

/// Combines two plugins into one that installs `first`, then `second`.
pub fn compose<A: Plugin, B: Plugin>(first: A, second: B) -> impl Plugin {
    move |engine: &mut Engine, context: &mut PluginContext| {
        first.install(engine, context);
        second.install(engine, context);
    }
}
