//! Holds the assets loaded from mods, for the game to look up while it runs.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use eyre::Result;

use super::{
    hash::AssetKey,
    load::{self, Asset, AssetKind},
    manifest::{self, ReloadReport},
};

/// The assets from a single load.
#[derive(Default)]
struct Catalogue {
    assets: HashMap<(AssetKind, AssetKey), Arc<Asset>>,

    /// Keys in the order they were first inserted, so that anything iterating over the assets
    /// sees the same order every time the same mods are loaded.
    order: Vec<(AssetKind, AssetKey)>,
}

impl Catalogue {
    /// Adds `asset`, replacing any asset of the same kind with the same key.
    fn insert(&mut self, asset: Asset) {
        let key = (asset.kind(), asset.name);

        if let Some(previous) = self.assets.insert(key, Arc::new(asset)) {
            log::warn!(
                "{} {} from '{}' was replaced",
                key.0,
                key.1,
                previous.source.display()
            );
        } else {
            self.order.push(key);
        }
    }

    fn clear(&mut self) {
        self.assets.clear();
        self.order.clear();
    }
}

struct StoreState {
    catalogue: Catalogue,

    /// Raw files registered by the host rather than by mods. These are loaded again after every
    /// mod scan.
    registered: Vec<(PathBuf, AssetKey)>,
}

/// The set of loaded mod assets.
///
/// A single lock covers both lookups and reloads, so a lookup never sees a half-loaded set of
/// mods. Assets are never modified once loaded, so the `Arc`s handed out by lookups stay valid
/// (and unchanged) after the lock has been released, even across a reload.
pub struct AssetStore {
    state: Mutex<StoreState>,
}

impl Default for AssetStore {
    fn default() -> Self {
        AssetStore::new()
    }
}

impl AssetStore {
    /// Creates an empty store. Nothing is loaded until `reload` is called.
    pub fn new() -> AssetStore {
        AssetStore {
            state: Mutex::new(StoreState {
                catalogue: Catalogue::default(),
                registered: vec![],
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Nothing is ever left half-modified by a panic in a way that matters: at worst a reload
        // stops early and the store holds fewer assets.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the asset of `kind` with the name `key`, if one has been loaded.
    pub fn get(&self, kind: AssetKind, key: AssetKey) -> Option<Arc<Asset>> {
        self.lock().catalogue.assets.get(&(kind, key)).cloned()
    }

    /// Returns all of the loaded scripts in load order.
    pub fn scripts(&self) -> Vec<Arc<Asset>> {
        let state = self.lock();

        state
            .catalogue
            .order
            .iter()
            .filter(|(kind, _)| *kind == AssetKind::ScriptParseTree)
            .filter_map(|key| state.catalogue.assets.get(key).cloned())
            .collect()
    }

    /// Returns the kind and name of every loaded asset, in load order.
    pub fn keys(&self) -> Vec<(AssetKind, AssetKey)> {
        self.lock().catalogue.order.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().catalogue.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Throws away every loaded asset and loads the mods in `mods_root` again. Returns `true` if
    /// there were any errors.
    pub fn reload(&self, mods_root: impl AsRef<Path>) -> bool {
        self.reload_with_report(mods_root).had_errors()
    }

    /// The same as `reload`, but returns the full report.
    pub fn reload_with_report(&self, mods_root: impl AsRef<Path>) -> ReloadReport {
        let mods_root = mods_root.as_ref();

        // Hold the lock for the whole reload. Reloads are rare, and lookups must not see the
        // store while it's being rebuilt.
        let mut state = self.lock();
        let StoreState {
            catalogue,
            registered,
        } = &mut *state;

        catalogue.clear();

        let mut report = manifest::scan(mods_root, |asset| catalogue.insert(asset));

        for (path, key) in registered.iter() {
            match load::load_raw_file(path, *key) {
                Ok(asset) => {
                    catalogue.insert(asset);
                    report.assets_loaded += 1;
                }

                Err(err) => {
                    log::error!("registered raw file {}: {:?}", key, err);
                    report.entry_errors += 1;
                }
            }
        }

        log::info!(
            "loaded {} asset(s) from {} mod(s) in '{}' ({} entry error(s), {} mod error(s))",
            report.assets_loaded,
            report.mods_loaded,
            mods_root.display(),
            report.entry_errors,
            report.mod_errors
        );

        report
    }

    /// Loads the file at `path` as a raw file with the name `key`, and keeps it registered so it
    /// is loaded again on every reload.
    pub fn register_raw_asset(&self, path: impl AsRef<Path>, key: AssetKey) -> Result<()> {
        let path = path.as_ref();
        let asset = load::load_raw_file(path, key)?;

        let mut state = self.lock();
        state.catalogue.insert(asset);
        state.registered.push((path.to_path_buf(), key));

        Ok(())
    }
}
