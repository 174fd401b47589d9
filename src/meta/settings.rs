use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use eyre::{Result, WrapErr};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use super::resources;

/// The user's mod loader settings.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Options {
    /// The folder that mods are loaded from. `None` means the `mods` folder in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mods_dir: Option<PathBuf>,

    /// The file that the log is written to. `None` means `mods.log` in the data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Whether debug messages are logged.
    pub verbose: bool,

    /// Whether mods are loaded as soon as the loader starts. If not, nothing is loaded until the
    /// first reload.
    pub load_on_start: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            mods_dir: None,
            log_file: None,
            verbose: false,
            load_on_start: true,
        }
    }
}

impl Options {
    /// Attempts to parse the contents of `reader` to get an `Options` value.
    fn parse_json(reader: impl Read) -> Result<Options> {
        // Coerce with `?`.
        Ok(serde_json::from_reader(reader)?)
    }

    /// Returns the path of the file that options are saved to.
    pub fn path() -> PathBuf {
        resources::get_data_path("settings.mods.json")
    }

    /// Loads the settings file at `path`. `Ok(None)` means there is no file.
    pub fn load_from_file(path: &Path) -> Result<Option<Options>> {
        if !path.exists() {
            // This isn't an error, but we didn't find any settings.
            return Ok(None);
        }

        let file =
            File::open(path).wrap_err_with(|| format!("can't open settings file {:?}", path))?;

        Ok(Some(Options::parse_json(file).wrap_err_with(|| {
            format!("can't parse settings file {:?}", path)
        })?))
    }

    /// Either loads the settings from `path` or generates default values for them.
    pub fn load_or_default(path: &Path) -> Options {
        match Options::load_from_file(path) {
            Ok(Some(options)) => return options,

            Ok(None) => log::info!("No settings file found. Defaults will be used."),

            Err(err) => {
                log::error!("Error loading settings file: {err:?}. Defaults will be used.")
            }
        };

        Options::default()
    }

    /// Loads the settings from the usual place, falling back to the defaults.
    pub fn load() -> Options {
        Options::load_or_default(&Options::path())
    }

    /// Saves the settings to `path`, returning any errors encountered.
    pub fn try_save_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        Ok(())
    }

    /// Saves the settings to the usual place. Errors will be logged.
    pub fn save(&self) {
        if let Err(err) = self.try_save_to(&Options::path()) {
            log::error!("Error saving options to file: {err:?}.");
        } else {
            log::info!("Settings saved.");
        }
    }

    /// Returns the folder that mods should be loaded from.
    pub fn mods_dir(&self) -> PathBuf {
        self.mods_dir.clone().unwrap_or_else(resources::get_mods_path)
    }

    /// Returns the path of the log file.
    pub fn log_file(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(resources::get_log_path)
    }

    /// Returns the most detailed level of message that should be logged.
    pub fn level_filter(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let options = Options::parse_json(&br#"{"verbose": true}"#[..]).unwrap();

        assert_eq!(
            options,
            Options {
                verbose: true,
                ..Options::default()
            }
        );
        assert!(options.load_on_start);
        assert_eq!(options.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn paths_are_kept() {
        let options = Options::parse_json(
            &br#"{"mods_dir": "/games/mods", "log_file": "/tmp/x.log", "load_on_start": false}"#[..],
        )
        .unwrap();

        assert_eq!(options.mods_dir(), PathBuf::from("/games/mods"));
        assert_eq!(options.log_file(), PathBuf::from("/tmp/x.log"));
        assert!(!options.load_on_start);
        assert_eq!(options.level_filter(), LevelFilter::Info);
    }

    #[test]
    fn saved_settings_load_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.mods.json");

        let options = Options {
            mods_dir: Some(dir.path().join("mods")),
            verbose: true,
            ..Options::default()
        };

        options.try_save_to(&path).unwrap();
        assert_eq!(Options::load_from_file(&path).unwrap(), Some(options));
    }

    #[test]
    fn missing_or_broken_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.mods.json");

        assert_eq!(Options::load_from_file(&path).unwrap(), None);
        assert_eq!(Options::load_or_default(&path), Options::default());

        std::fs::write(&path, "{ verbose: yes }").unwrap();
        assert!(Options::load_from_file(&path).is_err());
        assert_eq!(Options::load_or_default(&path), Options::default());
    }
}
