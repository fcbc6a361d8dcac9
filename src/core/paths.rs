use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "fixit-ar";
const CONFIG_FILE_NAME: &str = "config.json";

fn resource_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            roots.push(parent.to_path_buf());
        }
    }
    roots
}

/// Resolve a relative resource (font, frame) against the working directory
/// and then the executable's directory.
pub fn resolve_resource_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let roots = resource_roots();
    for root in &roots {
        let candidate = root.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    roots
        .first()
        .map(|root| root.join(path))
        .unwrap_or_else(|| path.to_path_buf())
}

/// Per-user config directory for the app; falls back to the temp dir when
/// the platform reports none.
pub fn app_config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    app_config_root().join(CONFIG_FILE_NAME)
}
