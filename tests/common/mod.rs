//! Helpers for building mod folders on disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use mod_loader::{game::mods::gsic::GsicDetour, AssetKey, Engine, Options};

const SCRIPT_MAGIC: u64 = 0x36000a0d43534780;
const HEADER_SIZE: usize = 96;

/// Builds a script with no imports, followed by `code_len` bytes of code.
pub fn script(compiled_name: AssetKey, code_len: usize) -> Vec<u8> {
    let mut script = vec![0u8; HEADER_SIZE];

    LittleEndian::write_u64(&mut script[..8], SCRIPT_MAGIC);
    LittleEndian::write_u64(&mut script[16..24], compiled_name.0);
    LittleEndian::write_i32(&mut script[56..60], HEADER_SIZE as i32);

    script.extend(std::iter::repeat(0x90).take(code_len));
    script
}

/// Builds a script with a GSIC block declaring `detours` in front of it.
pub fn script_with_detours(compiled_name: AssetKey, detours: &[GsicDetour]) -> Vec<u8> {
    let mut buffer = mod_loader::game::mods::gsic::encode(detours).unwrap();
    buffer.extend(script(compiled_name, 64));
    buffer
}

/// A mod folder being written.
pub struct ModWriter {
    dir: PathBuf,
    entries: Vec<serde_json::Value>,
}

impl ModWriter {
    pub fn new(mods_root: &Path, name: &str) -> ModWriter {
        let dir = mods_root.join(name);
        std::fs::create_dir_all(&dir).unwrap();

        ModWriter {
            dir,
            entries: vec![],
        }
    }

    /// Writes `contents` to `file` and adds an entry for it.
    pub fn file(mut self, kind: &str, name: &str, file: &str, contents: &[u8]) -> ModWriter {
        std::fs::write(self.dir.join(file), contents).unwrap();
        self.entries
            .push(serde_json::json!({ "type": kind, "name": name, "path": file }));
        self
    }

    /// Adds an arbitrary entry.
    pub fn entry(mut self, entry: serde_json::Value) -> ModWriter {
        self.entries.push(entry);
        self
    }

    pub fn finish(self) {
        std::fs::write(
            self.dir.join("metadata.json"),
            serde_json::json!({ "name": "test mod", "data": self.entries }).to_string(),
        )
        .unwrap();
    }
}

/// Creates an engine that loads mods from `mods_root`.
pub fn engine(mods_root: &Path) -> Engine {
    Engine::with_options(Options {
        mods_dir: Some(mods_root.to_path_buf()),
        ..Options::default()
    })
}
