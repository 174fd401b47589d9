//! Locations of the files the loader reads and writes.

use std::path::{Path, PathBuf};

use cached::proc_macro::cached;

/// Name of the folder that holds everything the loader keeps on disk.
pub const DATA_DIR_NAME: &str = "project-bo4";

/// Environment variable that overrides the data directory.
pub const DATA_DIR_VAR: &str = "MODS_DATA_DIR";

/// Works out the data directory from an override and the path of the running executable.
fn resolve_data_dir(env_override: Option<PathBuf>, exe_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = env_override.filter(|path| !path.as_os_str().is_empty()) {
        return path;
    }

    match exe_path.as_deref().and_then(Path::parent) {
        Some(exe_dir) => exe_dir.join(DATA_DIR_NAME),

        None => {
            log::warn!("Unable to find the executable's directory. Using the working directory.");
            PathBuf::from(DATA_DIR_NAME)
        }
    }
}

#[cached]
fn find_data_dir_path() -> PathBuf {
    let path = resolve_data_dir(
        std::env::var_os(DATA_DIR_VAR).map(PathBuf::from),
        std::env::current_exe().ok(),
    );

    if !path.exists() {
        if let Err(err) = std::fs::create_dir_all(&path) {
            log::error!("Unable to create data folder {:?}: {}", path, err);
        }
    }

    path
}

/// Returns the path of `resource_name` inside the data directory.
pub fn get_data_path(resource_name: &str) -> PathBuf {
    let mut path = find_data_dir_path();
    path.push(resource_name);

    path
}

pub fn get_mods_path() -> PathBuf {
    get_data_path("mods")
}

pub fn get_log_path() -> PathBuf {
    get_data_path("mods.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        assert_eq!(
            resolve_data_dir(
                Some(PathBuf::from("/tmp/elsewhere")),
                Some(PathBuf::from("/games/bo4/BlackOps4.exe"))
            ),
            PathBuf::from("/tmp/elsewhere")
        );
    }

    #[test]
    fn empty_override_is_ignored() {
        assert_eq!(
            resolve_data_dir(
                Some(PathBuf::new()),
                Some(PathBuf::from("/games/bo4/BlackOps4.exe"))
            ),
            Path::new("/games/bo4").join(DATA_DIR_NAME)
        );
    }

    #[test]
    fn falls_back_to_working_directory() {
        assert_eq!(resolve_data_dir(None, None), PathBuf::from(DATA_DIR_NAME));
    }
}
