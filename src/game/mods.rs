//! Loads assets from mod folders and substitutes them for the game's own assets, both when the
//! game looks up an asset and when it links a script.

pub mod bridge;
pub mod gsic;
pub mod hash;
pub mod load;
pub mod manifest;
pub mod script;
pub mod store;
pub mod table;

use std::path::Path;

pub use bridge::{on_script_link, resolve_asset, LinkError, LinkOutcome, ScriptInstance, ScriptRuntime};
pub use hash::{hash, hash_pattern, AssetKey};
pub use load::{Asset, AssetData, AssetKind};
pub use manifest::ReloadReport;
pub use store::AssetStore;

/// The game's state, as far as reloading mods is concerned.
pub trait GameState {
    /// Returns `true` while a match is running. Scripts from a running match may still be in use,
    /// so mods can't be reloaded.
    fn is_in_game(&self) -> bool;
}

/// Handler for the `reload_mods` console command. Returns the message to print.
pub fn reload_command(
    store: &AssetStore,
    game: &(impl GameState + ?Sized),
    mods_root: &Path,
) -> &'static str {
    if game.is_in_game() {
        return "can't load mods while in-game!";
    }

    if store.reload(mods_root) {
        "mods reloaded with errors, see logs."
    } else {
        "mods reloaded."
    }
}
