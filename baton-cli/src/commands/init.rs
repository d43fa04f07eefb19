//! `baton init [--token <token>]`

use std::fs;

use anyhow::{Context, Result};
use clap::Args;

use baton_bot::paths::config_path;
use baton_bot::BotConfig;
use baton_core::{registry, EmptyDirectory};

/// Create ~/.baton with a default config and an empty queue.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Gateway token to store in the token file. Requests must then carry it.
    #[arg(long)]
    pub token: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::bot::home()?;
        let config_file = config_path(&home);

        let config = if config_file.exists() {
            BotConfig::load_from_file(&config_file).context("failed to load existing config")?
        } else {
            let config = BotConfig::default();
            let parent = registry::baton_dir_at(&home);
            fs::create_dir_all(&parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
            let yaml = serde_yaml::to_string(&config).context("failed to serialize config")?;
            fs::write(&config_file, yaml)
                .with_context(|| format!("cannot write {}", config_file.display()))?;
            println!("✓ Wrote default config to {}", config_file.display());
            config
        };

        // Idempotent: loading creates the file only if it is missing.
        let registry_path = config.registry_path_at(&home);
        let queue = registry::load_at(&registry_path, &EmptyDirectory)
            .with_context(|| format!("failed to open queue at {}", registry_path.display()))?;
        println!(
            "✓ Queue at {} ({} entries)",
            registry_path.display(),
            queue.len()
        );

        if let Some(token) = self.token {
            let token_path = config.token_path_at(&home);
            fs::write(&token_path, format!("{}\n", token.trim()))
                .with_context(|| format!("cannot write {}", token_path.display()))?;
            set_private(&token_path)?;
            println!("✓ Token saved to {}", token_path.display());
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_private(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("cannot chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_private(_path: &std::path::Path) -> Result<()> {
    Ok(())
}
