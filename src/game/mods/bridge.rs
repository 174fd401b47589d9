//! The two places where the game calls into the mod system: looking up an asset by name, and
//! linking a script.

use std::sync::Arc;

use super::{
    hash::AssetKey,
    load::{Asset, AssetKind},
    script::{script_name, ScriptObject},
    store::AssetStore,
};

/// The script VM that a script is being linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptInstance {
    Server,
    Client,
}

/// A failed native link. The code is whatever negative value the game returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkError(pub i32);

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "script link failed with code {}", self.0)
    }
}

impl std::error::Error for LinkError {}

/// The game's script runtime, as seen from the link hook.
pub trait ScriptRuntime {
    /// Makes the runtime aware of the detours declared by `script`, so that calls to the replaced
    /// functions go to the script's replacements.
    fn sync_detours(&mut self, instance: ScriptInstance, script: &ScriptObject);

    /// Runs the game's own link function on `buffer`. Negative values are errors.
    fn link(&mut self, instance: ScriptInstance, buffer: &[u8], run_script: bool) -> i32;
}

/// What happened during a script link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkOutcome {
    /// Mod scripts that were linked because they hook the script being linked, in link order.
    pub injected: Vec<AssetKey>,

    /// Whether the script being linked was itself a mod script.
    pub replaced: bool,

    /// The result of the game's link of the original buffer.
    pub code: i32,
}

/// Returns the mod asset the game should use instead of its own asset of `kind` called `key`, or
/// `None` if the game should use its own.
pub fn resolve_asset(store: &AssetStore, kind: AssetKind, key: AssetKey) -> Option<Arc<Asset>> {
    let asset = store.get(kind, key);

    if asset.is_some() {
        log::debug!("overriding {} {}", kind, key);
    }

    asset
}

/// Handles the game linking the script in `buffer`.
///
/// Every mod script that hooks `buffer`'s script has its detours synced and is linked first.
/// If `buffer` is a mod script that was handed to the game by `resolve_asset`, its own detours
/// are synced too. Then the game links `buffer` as normal.
///
/// If linking a hooking script fails, the error is returned and `buffer` is not linked.
pub fn on_script_link<R>(
    store: &AssetStore,
    runtime: &mut R,
    instance: ScriptInstance,
    buffer: &[u8],
    run_script: bool,
) -> Result<LinkOutcome, LinkError>
where
    R: ScriptRuntime + ?Sized,
{
    // Copy out the scripts so the store isn't locked while the game is linking. Linking can
    // load more assets.
    let scripts = store.scripts();
    let scripts = || scripts.iter().filter_map(|asset| asset.as_script());

    let mut outcome = LinkOutcome::default();

    if let Some(linked_name) = script_name(buffer) {
        for script in scripts().filter(|script| script.hooks_into(linked_name)) {
            runtime.sync_detours(instance, script);

            let code = runtime.link(instance, script.bytecode(), run_script);

            if code < 0 {
                log::error!(
                    "linking script_{} for script_{} failed with code {}",
                    script.name(),
                    linked_name,
                    code
                );

                return Err(LinkError(code));
            }

            outcome.injected.push(script.name());
        }
    }

    if let Some(replacement) = scripts().find(|script| script.owns_buffer(buffer)) {
        runtime.sync_detours(instance, replacement);
        outcome.replaced = true;
    }

    outcome.code = runtime.link(instance, buffer, run_script);
    Ok(outcome)
}
