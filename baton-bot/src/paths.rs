use std::path::{Path, PathBuf};

pub use baton_core::registry::baton_dir_at;

pub const BOT_SOCKET: &str = "baton.sock";
pub const CONFIG_FILE: &str = "config.yaml";
pub const TOKEN_FILE: &str = "tokenfile";

pub fn socket_path(home: &Path) -> PathBuf {
    baton_dir_at(home).join(BOT_SOCKET)
}

pub fn config_path(home: &Path) -> PathBuf {
    baton_dir_at(home).join(CONFIG_FILE)
}

/// Relative paths are taken to live under `<home>/.baton/`.
pub fn resolve_under(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        baton_dir_at(home).join(path)
    }
}
