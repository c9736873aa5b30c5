use std::env;

use storage::remote::RemoteConfig;
use url::Url;

use crate::error::ConfigError;

pub const BACKEND_URL_VAR: &str = "COURSE_BACKEND_URL";
pub const ANON_KEY_VAR: &str = "COURSE_BACKEND_ANON_KEY";
pub const DB_URL_VAR: &str = "COURSE_DB_URL";

/// Connection details for the hosted backend. Both the table API and the
/// identity endpoints hang off the same base URL.
#[derive(Clone)]
pub struct BackendConfig {
    base_url: Url,
    anon_key: String,
}

impl BackendConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` does not parse or is not http(s),
    /// and `ConfigError::Missing` if the key is blank.
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(base_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            var: BACKEND_URL_VAR,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                var: BACKEND_URL_VAR,
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }
        let anon_key = anon_key.trim();
        if anon_key.is_empty() {
            return Err(ConfigError::Missing(ANON_KEY_VAR));
        }
        Ok(Self {
            base_url: parsed,
            anon_key: anon_key.to_owned(),
        })
    }

    /// Read `COURSE_BACKEND_URL` and `COURSE_BACKEND_ANON_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if either variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env` with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if either variable is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BACKEND_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(BACKEND_URL_VAR))?;
        let anon_key = lookup(ANON_KEY_VAR).ok_or(ConfigError::Missing(ANON_KEY_VAR))?;
        Self::new(&base_url, &anon_key)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url(), path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn remote(&self) -> RemoteConfig {
        RemoteConfig::new(self.base_url(), self.anon_key.clone())
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Local mirror URL from `COURSE_DB_URL`, if set.
#[must_use]
pub fn mirror_db_url_from_env() -> Option<String> {
    env::var(DB_URL_VAR).ok().filter(|v| !v.trim().is_empty())
}
