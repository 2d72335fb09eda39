use std::sync::Arc;

use bytes::Bytes;

use tracing::{debug, warn};

use url::Url;

use wot_form::form::Form;
use wot_form::security::{SecurityDefinitions, SecurityScheme};

use crate::config::{DtlsBackend, DtlsConfig};
use crate::error::{Error, ErrorKind, Result};

/// Pre-shared key credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct PskCredentials {
    /// Client identity.
    pub identity: String,
    /// Pre-shared key.
    pub key: Bytes,
}

impl std::fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskCredentials")
            .field("identity", &self.identity)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl PskCredentials {
    /// Creates [`PskCredentials`].
    #[must_use]
    pub fn new(identity: impl Into<String>, key: impl Into<Bytes>) -> Self {
        Self {
            identity: identity.into(),
            key: key.into(),
        }
    }
}

/// A lookup of pre-shared key credentials.
///
/// Any `Fn(&Url, &Form, &str) -> Option<PskCredentials>` closure is a
/// provider.
pub trait CredentialProvider: Send + Sync + 'static {
    /// Returns the credentials for a target URI, the form referencing it and
    /// the identity hint sent by the device.
    fn credentials(&self, uri: &Url, form: &Form, identity_hint: &str) -> Option<PskCredentials>;
}

impl<F> CredentialProvider for F
where
    F: Fn(&Url, &Form, &str) -> Option<PskCredentials> + Send + Sync + 'static,
{
    fn credentials(&self, uri: &Url, form: &Form, identity_hint: &str) -> Option<PskCredentials> {
        self(uri, form, identity_hint)
    }
}

/// The callback invoked by a transport during a pre-shared key handshake.
#[derive(Clone)]
pub struct PskCallback {
    uri: Url,
    form: Form,
    identity: Option<String>,
    provider: Option<Arc<dyn CredentialProvider>>,
}

impl std::fmt::Debug for PskCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskCallback")
            .field("uri", &self.uri.as_str())
            .field("identity", &self.identity)
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl PskCallback {
    /// Resolves the credentials for an identity hint.
    ///
    /// An empty hint is replaced by the identity declared by the security
    /// definition, if any.
    ///
    /// # Errors
    ///
    /// A [`ErrorKind::Security`] error is returned when no credentials are
    /// available, so the handshake fails instead of falling back to an
    /// insecure exchange.
    pub fn resolve(&self, identity_hint: &str) -> Result<PskCredentials> {
        let hint = if identity_hint.is_empty() {
            self.identity.as_deref().unwrap_or_default()
        } else {
            identity_hint
        };

        self.provider
            .as_ref()
            .and_then(|provider| provider.credentials(&self.uri, &self.form, hint))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Security,
                    format!(
                        "No pre-shared key credentials for `{}` with identity hint `{hint}`",
                        self.uri
                    ),
                )
            })
    }

    /// Returns the target URI.
    #[must_use]
    pub const fn uri(&self) -> &Url {
        &self.uri
    }
}

/// The security parameters of a transport client.
#[derive(Debug, Clone)]
pub enum TransportSecurity {
    /// Plain exchanges.
    NoSec,
    /// Pre-shared key security over `DTLS`.
    Psk {
        /// The `DTLS` implementation.
        backend: DtlsBackend,
        /// The credentials callback.
        callback: PskCallback,
    },
}

impl TransportSecurity {
    /// Whether pre-shared key security is required.
    #[must_use]
    pub const fn is_psk(&self) -> bool {
        matches!(self, Self::Psk { .. })
    }
}

// Chooses the security parameters of each exchange.
#[derive(Clone)]
pub(crate) struct SecuritySelector {
    definitions: SecurityDefinitions,
    provider: Option<Arc<dyn CredentialProvider>>,
    dtls: DtlsConfig,
}

impl SecuritySelector {
    pub(crate) fn new(dtls: DtlsConfig) -> Self {
        Self {
            definitions: SecurityDefinitions::new(),
            provider: None,
            dtls,
        }
    }

    pub(crate) fn set(
        &mut self,
        definitions: SecurityDefinitions,
        provider: Option<Arc<dyn CredentialProvider>>,
    ) {
        self.definitions = definitions;
        self.provider = provider;
    }

    pub(crate) fn select(&self, form: &Form, uri: &Url) -> Result<TransportSecurity> {
        let Some(scheme) = self.definitions.psk_for_form(form) else {
            return Ok(TransportSecurity::NoSec);
        };

        let Some(backend) = self.dtls.backend() else {
            return Err(Error::new(
                ErrorKind::Security,
                format!("`{uri}` requires pre-shared key security but no DTLS backend is enabled"),
            ));
        };

        if self.provider.is_none() {
            warn!("No credential provider for `{uri}`, the DTLS handshake is going to fail");
        }
        debug!("Use the {backend:?} DTLS backend for `{uri}`");

        let identity = match scheme {
            SecurityScheme::Psk { identity } => identity.clone(),
            _ => None,
        };

        Ok(TransportSecurity::Psk {
            backend,
            callback: PskCallback {
                uri: uri.clone(),
                form: form.clone(),
                identity,
                provider: self.provider.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use wot_form::form::Form;
    use wot_form::security::{SecurityDefinitions, SecurityScheme};

    use crate::config::{DtlsBackend, DtlsConfig};
    use crate::error::ErrorKind;

    use super::{CredentialProvider, PskCredentials, SecuritySelector, TransportSecurity};

    const HREF: &str = "coaps://lamp.local/properties/on";

    fn definitions() -> SecurityDefinitions {
        SecurityDefinitions::new()
            .insert("nosec_sc", SecurityScheme::NoSec)
            .insert(
                "psk_sc",
                SecurityScheme::Psk {
                    identity: Some("lamp".into()),
                },
            )
    }

    fn provider() -> Arc<dyn CredentialProvider> {
        Arc::new(|uri: &Url, _: &Form, hint: &str| {
            (uri.host_str() == Some("lamp.local") && hint == "lamp")
                .then(|| PskCredentials::new("lamp", "secret"))
        })
    }

    fn selector(dtls: DtlsConfig, provider: Option<Arc<dyn CredentialProvider>>) -> SecuritySelector {
        let mut selector = SecuritySelector::new(dtls);
        selector.set(definitions(), provider);
        selector
    }

    #[test]
    fn no_psk_no_security() {
        let uri = Url::parse(HREF).unwrap();
        let selector = selector(DtlsConfig::new(), Some(provider()));

        let form = Form::new(HREF).security("nosec_sc");
        assert!(!selector.select(&form, &uri).unwrap().is_psk());

        // Undeclared definitions are skipped.
        let form = Form::new(HREF).security("unknown_sc");
        assert!(!selector.select(&form, &uri).unwrap().is_psk());
    }

    #[test]
    fn psk_backend_choice() {
        let uri = Url::parse(HREF).unwrap();
        let form = Form::new(HREF).security("nosec_sc").security("psk_sc");

        let backend = |dtls| match selector(dtls, Some(provider())).select(&form, &uri) {
            Ok(TransportSecurity::Psk { backend, .. }) => Ok(backend),
            Ok(TransportSecurity::NoSec) => panic!("PSK security expected"),
            Err(e) => Err(e.kind()),
        };

        assert_eq!(backend(DtlsConfig::new()), Ok(DtlsBackend::Lightweight));
        assert_eq!(
            backend(DtlsConfig::new().lightweight(false)),
            Ok(DtlsBackend::General)
        );
        assert_eq!(
            backend(DtlsConfig::new().lightweight(false).general(false)),
            Err(ErrorKind::Security)
        );
    }

    #[test]
    fn psk_callback() {
        let uri = Url::parse(HREF).unwrap();
        let form = Form::new(HREF).security("psk_sc");

        let TransportSecurity::Psk { callback, .. } = selector(DtlsConfig::new(), Some(provider()))
            .select(&form, &uri)
            .unwrap()
        else {
            panic!("PSK security expected");
        };

        // Declared identity used for an empty hint.
        assert_eq!(
            callback.resolve("").unwrap(),
            PskCredentials::new("lamp", "secret")
        );
        assert_eq!(
            callback.resolve("heater").unwrap_err().kind(),
            ErrorKind::Security
        );
        assert!(!format!("{:?}", callback.resolve("lamp").unwrap()).contains("secret"));
    }

    #[test]
    fn psk_without_provider_fails_at_handshake() {
        let uri = Url::parse(HREF).unwrap();
        let form = Form::new(HREF).security("psk_sc");

        let security = selector(DtlsConfig::new(), None)
            .select(&form, &uri)
            .unwrap();
        let TransportSecurity::Psk { callback, .. } = security else {
            panic!("PSK security expected");
        };

        let error = callback.resolve("lamp").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Security);
        assert!(error.info().contains(HREF));
    }
}
