//! Loads mods for the game: asset overrides, plus scripts that are linked alongside the game's own.
//!
//! The host creates an [`Engine`] when the library is loaded and forwards the game's asset lookups
//! and script links to it.

use std::{path::PathBuf, sync::Arc};

pub mod game;
pub mod logging;
pub mod meta;

pub use game::mods::{
    Asset, AssetData, AssetKey, AssetKind, AssetStore, GameState, LinkError, LinkOutcome,
    ReloadReport, ScriptInstance, ScriptRuntime,
};
pub use meta::settings::Options;

/// Everything the loader needs while the game is running.
pub struct Engine {
    options: Options,
    store: AssetStore,
}

/// Sets up the loader: settings, then logging, then the first load of mods.
pub fn init() -> Engine {
    let options = Options::load();

    let level = if cfg!(feature = "debug") {
        log::LevelFilter::Trace
    } else {
        options.level_filter()
    };

    // Nothing can be logged if this fails, so there's nowhere to report it except stderr.
    if let Err(err) = logging::init(&options.log_file(), level) {
        eprintln!("mod loader: unable to start logging: {err:?}");
    }

    log::info!("Cargo package version is {}", env!("CARGO_PKG_VERSION"));
    log::info!("Options: {:#?}", options);

    Engine::with_options(options)
}

impl Engine {
    /// Creates an engine without touching the global logger or the settings file.
    pub fn with_options(options: Options) -> Engine {
        let engine = Engine {
            options,
            store: AssetStore::new(),
        };

        if engine.options.load_on_start {
            engine.reload();
        } else {
            log::info!("Not loading mods until asked to.");
        }

        engine
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.options.mods_dir()
    }

    /// Loads every mod again. Returns `true` if there were any errors.
    pub fn reload(&self) -> bool {
        self.store.reload(self.mods_dir())
    }

    /// Handles the `reload_mods` command, returning the message for the user.
    pub fn reload_command(&self, state: &(impl GameState + ?Sized)) -> &'static str {
        game::mods::reload_command(&self.store, state, &self.mods_dir())
    }

    /// See [`game::mods::resolve_asset`].
    pub fn resolve_asset(&self, kind: AssetKind, key: AssetKey) -> Option<Arc<Asset>> {
        game::mods::resolve_asset(&self.store, kind, key)
    }

    /// See [`game::mods::on_script_link`].
    pub fn on_script_link(
        &self,
        runtime: &mut (impl ScriptRuntime + ?Sized),
        instance: ScriptInstance,
        buffer: &[u8],
        run_script: bool,
    ) -> Result<LinkOutcome, LinkError> {
        game::mods::on_script_link(&self.store, runtime, instance, buffer, run_script)
    }
}
