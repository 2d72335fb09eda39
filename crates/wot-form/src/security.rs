use alloc::string::String;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use log::warn;

use serde::Serialize;

use crate::form::Form;

/// A security scheme declared by a thing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum SecurityScheme {
    /// No security.
    NoSec,
    /// Pre-shared key security.
    Psk {
        /// Identity associated with the pre-shared key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<String>,
    },
    /// Username and password security.
    Basic,
    /// Bearer token security.
    Bearer,
    /// A scheme not supported by this crate.
    #[serde(other)]
    Unsupported,
}

impl SecurityScheme {
    /// Creates a pre-shared key [`SecurityScheme`] without identity.
    #[must_use]
    pub const fn psk() -> Self {
        Self::Psk { identity: None }
    }

    /// Whether the scheme requires a pre-shared key.
    #[must_use]
    pub const fn is_psk(&self) -> bool {
        matches!(self, Self::Psk { .. })
    }
}

/// The security definitions of a thing.
///
/// Each [`SecurityScheme`] is associated with the name used by forms to
/// reference it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct SecurityDefinitions(IndexMap<String, SecurityScheme, DefaultHashBuilder>);

impl SecurityDefinitions {
    /// Creates empty [`SecurityDefinitions`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self(IndexMap::default())
    }

    /// Adds a [`SecurityScheme`] with the given name.
    ///
    /// A scheme with the same name is replaced.
    #[must_use]
    #[inline]
    pub fn insert(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        let _ = self.0.insert(name.into(), scheme);
        self
    }

    /// Returns the [`SecurityScheme`] with the given name.
    #[must_use]
    #[inline]
    pub fn get(&self, name: &str) -> Option<&SecurityScheme> {
        self.0.get(name)
    }

    /// Whether there are no definitions.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the [`SecurityScheme`]s referenced by a [`Form`].
    ///
    /// References to undeclared definitions are skipped.
    pub fn for_form<'a>(&'a self, form: &'a Form) -> impl Iterator<Item = &'a SecurityScheme> {
        form.security_names().iter().filter_map(move |name| {
            let scheme = self.get(name);
            if scheme.is_none() {
                warn!("Security definition `{name}` is not declared, skip it");
            }
            scheme
        })
    }

    /// Returns the first pre-shared key [`SecurityScheme`] referenced by a
    /// [`Form`], if any.
    #[must_use]
    pub fn psk_for_form<'a>(&'a self, form: &'a Form) -> Option<&'a SecurityScheme> {
        self.for_form(form).find(|scheme| scheme.is_psk())
    }
}
