//! Configuration resolution for niche-search
//!
//! Provider API keys resolve with Database → ENV → TOML priority. The
//! resolved key lives in an [`ApiCredential`] slot shared with the provider,
//! so a key saved at runtime takes effect on the next search without a
//! restart.

use niche_common::config::{write_toml_config, TomlConfig};
use niche_common::db::settings;
use niche_common::Result;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Default per-provider search limit
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5740;

/// Online providers that need an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyedProvider {
    Fragella,
    FragranceFinder,
}

impl KeyedProvider {
    pub const ALL: [KeyedProvider; 2] = [KeyedProvider::Fragella, KeyedProvider::FragranceFinder];

    /// Key used in the settings table and in URLs
    pub fn settings_key(self) -> &'static str {
        match self {
            KeyedProvider::Fragella => "fragella",
            KeyedProvider::FragranceFinder => "fragrancefinder",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            KeyedProvider::Fragella => "NICHE_FRAGELLA_API_KEY",
            KeyedProvider::FragranceFinder => "NICHE_FRAGRANCEFINDER_API_KEY",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            KeyedProvider::Fragella => "Fragella",
            KeyedProvider::FragranceFinder => "FragranceFinder",
        }
    }

    pub fn from_settings_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.settings_key().eq_ignore_ascii_case(key))
    }

    fn toml_value(self, config: &TomlConfig) -> Option<&String> {
        match self {
            KeyedProvider::Fragella => config.fragella_api_key.as_ref(),
            KeyedProvider::FragranceFinder => config.fragrancefinder_api_key.as_ref(),
        }
    }

    fn set_toml_value(self, config: &mut TomlConfig, key: String) {
        match self {
            KeyedProvider::Fragella => config.fragella_api_key = Some(key),
            KeyedProvider::FragranceFinder => config.fragrancefinder_api_key = Some(key),
        }
    }
}

/// Shared, runtime-updatable API key slot
#[derive(Debug, Clone, Default)]
pub struct ApiCredential(Arc<RwLock<Option<String>>>);

impl ApiCredential {
    pub fn new(key: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(key.filter(|k| is_valid_key(k)))))
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_set(&self) -> bool {
        self.0.read().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Replace the key; blank keys clear the slot
    pub fn set(&self, key: Option<String>) {
        if let Ok(mut guard) = self.0.write() {
            *guard = key.filter(|k| is_valid_key(k));
        }
    }
}

/// Credential slots for every keyed provider
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub fragella: ApiCredential,
    pub fragrance_finder: ApiCredential,
}

impl ProviderCredentials {
    pub fn slot(&self, provider: KeyedProvider) -> &ApiCredential {
        match provider {
            KeyedProvider::Fragella => &self.fragella,
            KeyedProvider::FragranceFinder => &self.fragrance_finder,
        }
    }

    /// Resolve every provider key from its configured sources
    pub async fn resolve(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Self> {
        let credentials = Self::default();
        for provider in KeyedProvider::ALL {
            let key = resolve_api_key(db, toml_config, provider).await?;
            credentials.slot(provider).set(key);
        }
        Ok(credentials)
    }
}

/// Resolve one provider's API key
///
/// **Priority:** Database → ENV → TOML. A missing key is not an error; the
/// provider simply reports itself unavailable.
pub async fn resolve_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    provider: KeyedProvider,
) -> Result<Option<String>> {
    let db_key = settings::get_api_key(db, provider.settings_key())
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(provider.env_var())
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = provider.toml_value(toml_config).filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            provider = provider.display_name(),
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_key.or(env_key).or_else(|| toml_key.cloned());
    match sources.first() {
        Some(source) => info!(provider = provider.display_name(), "API key loaded from {}", source),
        None => info!(
            provider = provider.display_name(),
            "API key not configured; set {} or save one in Settings",
            provider.env_var()
        ),
    }
    Ok(resolved)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Persist a key: database first (authoritative), TOML best-effort
pub async fn persist_api_key(
    db: &Pool<Sqlite>,
    toml_path: Option<&Path>,
    provider: KeyedProvider,
    key: &str,
) -> Result<()> {
    settings::set_api_key(db, provider.settings_key(), key).await?;

    if let Some(path) = toml_path {
        let mut config = niche_common::config::load_toml_config_or_default(path);
        provider.set_toml_value(&mut config, key.to_string());
        match write_toml_config(&config, path) {
            Ok(()) => info!("Settings synced to TOML: {}", path.display()),
            Err(e) => warn!("TOML write failed (database write succeeded): {}", e),
        }
    }
    Ok(())
}
