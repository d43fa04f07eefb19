//! Bot configuration types and loading.
//!
//! ```yaml
//! # ~/.baton/config.yaml (every key optional)
//! prefix: "."
//! registry-path: recruiters.yaml     # relative to ~/.baton/
//! token-file: tokenfile              # relative to ~/.baton/
//! bot-id: 123456789                  # enables "<@123456789> join"
//! announce-channel: 945513732115673192
//! version-label: A is for Alpha
//! log-json: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use baton_core::MemberId;

use crate::error::{io_err, BotError};
use crate::paths::{config_path, resolve_under, TOKEN_FILE};

/// Main bot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BotConfig {
    /// Command prefix, e.g. `.join`.
    pub prefix: String,

    /// Persistence file.
    pub registry_path: PathBuf,

    /// File holding the gateway token.
    pub token_file: PathBuf,

    /// The bot's own member id; messages starting with its mention are commands too.
    pub bot_id: Option<u64>,

    /// Channel that receives the restart announcement.
    pub announce_channel: Option<u64>,

    /// Shown in the `display` embed footer.
    pub version_label: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: ".".to_string(),
            registry_path: PathBuf::from(baton_core::registry::REGISTRY_FILE),
            token_file: PathBuf::from(TOKEN_FILE),
            bot_id: None,
            announce_channel: None,
            version_label: "A is for Alpha".to_string(),
            log_json: false,
        }
    }
}

impl BotConfig {
    /// Load `<home>/.baton/config.yaml`, or defaults if it does not exist.
    pub fn load_at(home: &Path) -> Result<Self, BotError> {
        let path = config_path(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, BotError> {
        let content = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&content).map_err(|source| BotError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn registry_path_at(&self, home: &Path) -> PathBuf {
        resolve_under(home, &self.registry_path)
    }

    pub fn token_path_at(&self, home: &Path) -> PathBuf {
        resolve_under(home, &self.token_file)
    }

    pub fn bot_member_id(&self) -> Option<MemberId> {
        self.bot_id.map(MemberId)
    }

    /// Read the gateway token. A missing or blank file means "no token".
    pub fn read_token_at(&self, home: &Path) -> Result<Option<String>, BotError> {
        let path = self.token_path_at(home);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(path, err)),
        }
    }
}
