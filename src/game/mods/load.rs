//! Turns manifest entries into assets by reading and decoding the files they point at.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use eyre::{Result, WrapErr};
use serde::Deserialize;
use strum::{Display, EnumString};

use super::{
    hash::{hash_pattern, AssetKey},
    script::ScriptObject,
    table::StringTable,
};

/// The kinds of game asset that mods can replace. The string forms are the `type` values used in
/// manifests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(try_from = "String")]
pub enum AssetKind {
    ScriptParseTree,
    RawFile,
    LuaFile,
    StringTable,
}

impl TryFrom<String> for AssetKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|_| format!("unknown asset type '{value}'"))
    }
}

/// The decoded contents of an asset.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetData {
    Script(ScriptObject),

    /// Delivered to the game exactly as read.
    RawFile(Vec<u8>),

    /// Delivered to the game exactly as read.
    LuaFile(Vec<u8>),

    StringTable(StringTable),
}

/// An asset that replaces (or adds to) the game's own assets.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// The key the game will look this asset up by.
    pub name: AssetKey,

    /// The file the asset was read from.
    pub source: PathBuf,

    pub data: AssetData,
}

impl Asset {
    pub fn kind(&self) -> AssetKind {
        match self.data {
            AssetData::Script(_) => AssetKind::ScriptParseTree,
            AssetData::RawFile(_) => AssetKind::RawFile,
            AssetData::LuaFile(_) => AssetKind::LuaFile,
            AssetData::StringTable(_) => AssetKind::StringTable,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptObject> {
        match &self.data {
            AssetData::Script(script) => Some(script),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&StringTable> {
        match &self.data {
            AssetData::StringTable(table) => Some(table),
            _ => None,
        }
    }

    /// Returns the bytes handed to the game for buffer-backed assets. Tables are decoded, so they
    /// have no single buffer.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            AssetData::Script(script) => Some(script.bytecode()),
            AssetData::RawFile(bytes) | AssetData::LuaFile(bytes) => Some(bytes),
            AssetData::StringTable(_) => None,
        }
    }
}

/// A single item from the `data` list of a mod manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub kind: AssetKind,

    /// Name of the asset being replaced.
    pub name: String,

    /// Path of the replacement file. Relative paths are relative to the mod's directory.
    pub path: PathBuf,

    /// Scripts which, when linked, should cause this script to be linked too. Only used for
    /// script entries.
    #[serde(default)]
    pub hooks: Vec<String>,
}

impl ManifestEntry {
    /// Returns the full path of the file for this entry.
    pub fn resolve_path(&self, mod_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            mod_dir.join(&self.path)
        }
    }

    /// Reads and decodes the file for this entry.
    pub fn load(&self, mod_dir: &Path) -> Result<Asset> {
        let path = self.resolve_path(mod_dir);
        let name = hash_pattern(&self.name);

        let bytes = std::fs::read(&path)
            .wrap_err_with(|| format!("can't read {} '{}'", self.kind, path.display()))?;

        let data = match self.kind {
            AssetKind::ScriptParseTree => {
                let hooks: HashSet<AssetKey> = self.hooks.iter().map(hash_pattern).collect();

                AssetData::Script(ScriptObject::new(name, bytes, hooks).wrap_err_with(|| {
                    format!("error when reading scriptparsetree '{}'", path.display())
                })?)
            }

            AssetKind::RawFile => AssetData::RawFile(bytes),
            AssetKind::LuaFile => AssetData::LuaFile(bytes),

            AssetKind::StringTable => {
                AssetData::StringTable(StringTable::parse(&bytes).wrap_err_with(|| {
                    format!("error when loading stringtable '{}'", path.display())
                })?)
            }
        };

        log::debug!("loaded {} {} -> {}", self.kind, path.display(), name);

        Ok(Asset {
            name,
            source: path,
            data,
        })
    }
}

/// Reads a file into a raw buffer asset with a precomputed key. Other parts of the host use this
/// to publish generated files.
pub fn load_raw_file(path: &Path, name: AssetKey) -> Result<Asset> {
    let bytes = std::fs::read(path)
        .wrap_err_with(|| format!("can't read raw file '{}'", path.display()))?;

    Ok(Asset {
        name,
        source: path.to_path_buf(),
        data: AssetData::RawFile(bytes),
    })
}
