//! Finds mods in the mods directory and loads the assets their manifests declare.
//!
//! A mod is any directory directly inside the mods directory that contains a `metadata.json`
//! file. Directories without one are ignored, so mods can keep unrelated folders next to them.

use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use itertools::Itertools;
use serde_json::Value;

use super::load::{Asset, ManifestEntry};

pub const MANIFEST_FILE_NAME: &str = "metadata.json";

/// Counts from a single scan of the mods directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Mods whose manifests were read, including those with failed entries.
    pub mods_loaded: usize,

    /// Assets that were decoded successfully.
    pub assets_loaded: usize,

    /// Manifest entries that couldn't be loaded.
    pub entry_errors: usize,

    /// Mods that were skipped completely because their manifest couldn't be used, plus any
    /// failure to read the mods directory itself.
    pub mod_errors: usize,
}

impl ReloadReport {
    pub fn had_errors(&self) -> bool {
        self.entry_errors != 0 || self.mod_errors != 0
    }
}

/// A parsed manifest file.
struct Manifest {
    /// The name to use for the mod in messages.
    display_name: String,

    /// The mod's directory.
    directory: PathBuf,

    /// The raw items of the `data` list. Each is parsed separately so that one bad item doesn't
    /// prevent the rest from loading.
    data: Vec<Value>,
}

impl Manifest {
    /// Reads the manifest in `directory`.
    fn read(directory: &Path, manifest_path: &Path) -> Result<Manifest> {
        let contents = std::fs::read(manifest_path).wrap_err("can't read mod metadata file")?;
        let document: Value =
            serde_json::from_slice(&contents).wrap_err("can't parse mod json metadata")?;

        ensure!(document.is_object(), "mod json metadata is not an object");

        let display_name = document
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| manifest_path.display().to_string());

        let data = document
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(Manifest {
            display_name,
            directory: directory.to_path_buf(),
            data,
        })
    }

    /// Loads every entry, passing the successful ones to `sink`. Returns the number of assets
    /// loaded and the number of entries that failed.
    fn load_entries(&self, sink: &mut impl FnMut(Asset)) -> (usize, usize) {
        let mut loaded = 0;
        let mut errors = 0;

        for (index, item) in self.data.iter().enumerate() {
            let result = serde_json::from_value::<ManifestEntry>(item.clone())
                .wrap_err("bad data member")
                .and_then(|entry| {
                    entry
                        .load(&self.directory)
                        .wrap_err_with(|| format!("can't load '{}'", entry.name))
                });

            match result {
                Ok(asset) => {
                    sink(asset);
                    loaded += 1;
                }

                Err(err) => {
                    log::error!(
                        "mod {}: data member {}: {:?}",
                        self.display_name,
                        index,
                        err
                    );

                    errors += 1;
                }
            }
        }

        (loaded, errors)
    }
}

/// Returns the directories inside `mods_root` in name order.
fn mod_directories(mods_root: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(mods_root)
        .wrap_err_with(|| format!("can't list mods directory '{}'", mods_root.display()))?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .sorted()
        .collect())
}

/// Loads every mod in `mods_root`, passing each asset to `sink` in load order. The directory is
/// created if it doesn't exist.
///
/// Nothing here is fatal: errors are logged and counted in the returned report.
pub fn scan(mods_root: &Path, mut sink: impl FnMut(Asset)) -> ReloadReport {
    let mut report = ReloadReport::default();

    if let Err(err) = std::fs::create_dir_all(mods_root) {
        log::error!(
            "can't create mods directory '{}': {:?}",
            mods_root.display(),
            err
        );
    }

    let directories = match mod_directories(mods_root) {
        Ok(directories) => directories,
        Err(err) => {
            log::error!("{:?}", err);
            report.mod_errors += 1;
            return report;
        }
    };

    for directory in directories {
        let manifest_path = directory.join(MANIFEST_FILE_NAME);

        if !manifest_path.exists() {
            continue;
        }

        let manifest = match Manifest::read(&directory, &manifest_path) {
            Ok(manifest) => manifest,
            Err(err) => {
                log::error!("skipping mod '{}': {:?}", manifest_path.display(), err);
                report.mod_errors += 1;
                continue;
            }
        };

        log::info!("loading mod {}...", manifest.display_name);

        let (loaded, errors) = manifest.load_entries(&mut sink);

        report.mods_loaded += 1;
        report.assets_loaded += loaded;
        report.entry_errors += errors;

        if errors != 0 {
            log::warn!(
                "mod {} loaded with {} error{}.",
                manifest.display_name,
                errors,
                if errors == 1 { "" } else { "s" }
            );
        }
    }

    report
}
