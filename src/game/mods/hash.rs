//! Name hashing. Every asset the game can look up is addressed by a hash of its name, so mod
//! content has to produce exactly the same keys as the game's own asset names.

use once_cell::sync::Lazy;
use regex::Regex;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// The game only uses 63 bits of its asset hashes.
const KEY_MASK: u64 = 0x7fffffffffffffff;

const CANON_OFFSET_BASIS: u32 = 0x4b9ace2f;
const CANON_PRIME: u32 = 0x01000193;

/// Identifies an asset by the hash of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AssetKey(pub u64);

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Normalises a single name byte. Names are case-insensitive and treat both slash directions the
/// same.
fn normalise(byte: u8) -> u8 {
    match byte {
        b'\\' => b'/',
        other => other.to_ascii_lowercase(),
    }
}

/// Widens a name byte the way the game does. The game's hash reads names as signed chars, so
/// bytes above 0x7f are sign-extended.
fn widen(byte: u8) -> u64 {
    byte as i8 as i64 as u64
}

/// Hashes an asset name.
pub fn hash(name: impl AsRef<str>) -> AssetKey {
    let value = name
        .as_ref()
        .bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ widen(normalise(byte))).wrapping_mul(FNV_PRIME)
        });

    AssetKey(value & KEY_MASK)
}

/// Hashes a name that may also be written as a precomputed hash, such as `hash_1a2b3c` or
/// `script_deadbeef`. Tools that dump game assets often only know the hash, so mods refer to
/// those assets this way.
pub fn hash_pattern(text: impl AsRef<str>) -> AssetKey {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?i:hash|script|file)_([0-9a-fA-F]{1,16})$").expect("hash pattern is valid")
    });

    let text = text.as_ref();

    let literal = PATTERN
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| u64::from_str_radix(digits.as_str(), 16).ok());

    match literal {
        Some(value) => AssetKey(value & KEY_MASK),
        None => hash(text),
    }
}

/// Computes the 32-bit canonical ID the script VM uses for function and namespace names.
pub fn canon_hash(name: impl AsRef<str>) -> u32 {
    name.as_ref().bytes().fold(CANON_OFFSET_BASIS, |hash, byte| {
        (hash ^ widen(byte.to_ascii_lowercase()) as u32).wrapping_mul(CANON_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_name_is_offset_basis() {
        assert_eq!(hash(""), AssetKey(FNV_OFFSET_BASIS & KEY_MASK));
    }

    #[test]
    fn separators_are_unified() {
        assert_eq!(
            hash(r"scripts\zm_common\zm_utility.gsc"),
            hash("scripts/zm_common/zm_utility.gsc")
        );
    }

    #[test]
    fn non_ascii_bytes_are_sign_extended() {
        assert_eq!(hash("scripts/a.gsc"), AssetKey(0x716128593cbbf822));
        assert_eq!(hash("scripts/café.gsc"), AssetKey(0x776ef3e5f4b61367));

        // Only ASCII letters are folded.
        assert_eq!(hash(r"SCRIPTS\CAFÉ.GSC"), AssetKey(0x33c7db4c63e689c7));
        assert_ne!(hash("scripts/CAFÉ.gsc"), hash("scripts/café.gsc"));

        assert_eq!(canon_hash("IsProfileBuild"), 0xecb5a71c);
        assert_eq!(canon_hash("função"), 0xad2f15f9);
    }

    #[test]
    fn top_bit_is_always_clear() {
        for name in ["a", "scripts/core_common/load_shared.gsc", "gamedata/tables/x.csv"] {
            assert_eq!(hash(name).0 >> 63, 0);
        }
    }

    #[test]
    fn patterns_are_taken_literally() {
        assert_eq!(hash_pattern("hash_1a2b"), AssetKey(0x1a2b));
        assert_eq!(hash_pattern("SCRIPT_ffffffffffffffff"), AssetKey(KEY_MASK));
        assert_eq!(hash_pattern("file_10"), AssetKey(0x10));
    }

    #[test]
    fn non_patterns_are_hashed() {
        assert_eq!(hash_pattern("hash_xyz"), hash("hash_xyz"));
        assert_eq!(hash_pattern("scripts/a.gsc"), hash("scripts/a.gsc"));
        assert_eq!(
            hash_pattern("hash_00000000000000000"),
            hash("hash_00000000000000000")
        );
    }

    #[test]
    fn canon_ids_ignore_case() {
        assert_eq!(canon_hash("IsProfileBuild"), canon_hash("isprofilebuild"));
        assert_ne!(canon_hash("IsProfileBuild"), canon_hash("SeriousCustom"));
    }

    proptest! {
        #[test]
        fn case_does_not_matter(name in "[ -~]{0,64}") {
            prop_assert_eq!(hash(&name), hash(name.to_uppercase()));
            prop_assert_eq!(hash(&name), hash(name.to_lowercase()));
        }

        #[test]
        fn backslashes_match_slashes(name in r"[a-zA-Z0-9_.\\/]{0,64}") {
            prop_assert_eq!(hash(&name), hash(name.replace('\\', "/")));
        }
    }
}
