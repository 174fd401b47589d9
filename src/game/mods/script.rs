//! Compiled script objects supplied by mods.
//!
//! The script header is 96 bytes, little-endian. We only touch a handful of fields:
//!
//! | Offset | Type    | Field                 |
//! |--------|---------|-----------------------|
//! | 0      | [u8; 8] | magic                 |
//! | 16     | u64     | script name hash      |
//! | 40     | i16     | import count          |
//! | 56     | i32     | import table offset   |

use std::collections::HashSet;

use byteorder::{ByteOrder, LittleEndian};
use cached::proc_macro::cached;
use eyre::{ensure, Result};

use super::{
    gsic::{self, GsicDetour},
    hash::{canon_hash, AssetKey},
};

/// The first eight bytes of every compiled script.
pub const SCRIPT_MAGIC: u64 = 0x36000a0d43534780;

/// Size of the script header. Anything shorter can't be a script.
pub const HEADER_SIZE: usize = 96;

const NAME_OFFSET: usize = 16;
const IMPORT_COUNT_OFFSET: usize = 40;
const IMPORT_TABLE_OFFSET: usize = 56;

/// Size of an import record, not including the address slots that follow it.
const IMPORT_RECORD_SIZE: usize = 12;

/// Function the compiler emits for its own intrinsics. Calls to it with arguments are redirected
/// to the custom function the host provides.
const COMPILER_SENTINEL: &str = "IsProfileBuild";
const CUSTOM_FUNCTION: &str = "SeriousCustom";

/// Returns the canonical IDs of the compiler sentinel and its replacement.
#[cached]
fn import_rewrite_ids() -> (u32, u32) {
    (canon_hash(COMPILER_SENTINEL), canon_hash(CUSTOM_FUNCTION))
}

/// Reads the name hash a script declares for itself. Returns `None` if the buffer is too short to
/// hold a header.
pub fn script_name(buffer: &[u8]) -> Option<AssetKey> {
    buffer
        .get(NAME_OFFSET..NAME_OFFSET + 8)
        .map(|bytes| AssetKey(LittleEndian::read_u64(bytes)))
}

/// A detour paired with the replacement code it points at.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDetour<'script> {
    pub detour: &'script GsicDetour,

    /// The replacement function's bytes within the owning script.
    pub code: &'script [u8],
}

/// A compiled script loaded from a mod, ready to be handed to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptObject {
    name: AssetKey,
    bytecode: Vec<u8>,
    hooks: HashSet<AssetKey>,
    detours: Vec<GsicDetour>,
}

impl ScriptObject {
    /// Prepares `buffer` for use as the script `name`. The GSIC block is removed, the header is
    /// checked, and the script is patched so that the game treats it as `name`.
    ///
    /// `hooks` are the scripts that should cause this script to be linked alongside them.
    pub fn new(name: AssetKey, buffer: Vec<u8>, hooks: HashSet<AssetKey>) -> Result<ScriptObject> {
        let (mut bytecode, detours) = gsic::strip(buffer)?;

        if !detours.is_empty() {
            log::debug!("loaded {} detours", detours.len());
        }

        ensure!(
            bytecode.len() >= HEADER_SIZE
                && LittleEndian::read_u64(&bytecode[..8]) == SCRIPT_MAGIC,
            "bad scriptparsetree magic ({} bytes after GSIC block)",
            bytecode.len()
        );

        for detour in &detours {
            ensure!(
                detour.fixup_range().end <= bytecode.len(),
                "detour {} points outside of the script ({} bytes)",
                detour,
                bytecode.len()
            );
        }

        // The compiler writes whatever name the source file had, but the game has to see the
        // name of the script we're replacing.
        LittleEndian::write_u64(&mut bytecode[NAME_OFFSET..NAME_OFFSET + 8], name.0);

        let patched = patch_imports(&mut bytecode);

        if patched != 0 {
            log::debug!("redirected {} compiler import(s) in script_{}", patched, name);
        }

        Ok(ScriptObject {
            name,
            bytecode,
            hooks,
            detours,
        })
    }

    pub fn name(&self) -> AssetKey {
        self.name
    }

    /// The script bytes exactly as the game should see them.
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn hooks(&self) -> &HashSet<AssetKey> {
        &self.hooks
    }

    /// Returns `true` if this script should be linked whenever `script` is.
    pub fn hooks_into(&self, script: AssetKey) -> bool {
        self.hooks.contains(&script)
    }

    pub fn detours(&self) -> &[GsicDetour] {
        &self.detours
    }

    /// Pairs each detour with the bytes of its replacement function.
    pub fn resolved_detours(&self) -> impl Iterator<Item = ResolvedDetour<'_>> {
        self.detours.iter().filter_map(|detour| {
            self.bytecode
                .get(detour.fixup_range())
                .map(|code| ResolvedDetour { detour, code })
        })
    }

    /// Returns `true` if `buffer` is this script's own bytecode (not just an equal copy).
    pub fn owns_buffer(&self, buffer: &[u8]) -> bool {
        std::ptr::eq(self.bytecode.as_ptr(), buffer.as_ptr()) && self.bytecode.len() == buffer.len()
    }
}

/// Redirects compiler intrinsic imports to the host's custom function, returning the number of
/// imports changed.
///
/// The address slot counts are trusted to walk the table, since the compiler wrote them. The walk
/// just stops if it runs off the end of the buffer.
fn patch_imports(bytecode: &mut [u8]) -> usize {
    let (sentinel, replacement) = import_rewrite_ids();

    let count = LittleEndian::read_u16(&bytecode[IMPORT_COUNT_OFFSET..IMPORT_COUNT_OFFSET + 2]);
    let table = LittleEndian::read_i32(&bytecode[IMPORT_TABLE_OFFSET..IMPORT_TABLE_OFFSET + 4]);

    let mut position = match usize::try_from(table) {
        Ok(position) => position,
        Err(_) => {
            log::debug!("import table offset {} is negative", table);
            return 0;
        }
    };

    let mut patched = 0;

    for index in 0..count {
        let record = match bytecode.get_mut(position..position.saturating_add(IMPORT_RECORD_SIZE)) {
            Some(record) => record,
            None => {
                log::debug!(
                    "import {} of {} at {:#x} is past the end of the script",
                    index,
                    count,
                    position
                );

                break;
            }
        };

        let name = LittleEndian::read_u32(&record[0..4]);
        let address_count = LittleEndian::read_u16(&record[8..10]) as usize;
        let param_count = record[10];

        if name == sentinel && param_count != 0 {
            LittleEndian::write_u32(&mut record[0..4], replacement);
            patched += 1;
        }

        position = position.saturating_add(IMPORT_RECORD_SIZE + address_count * 4);
    }

    patched
}
