//! Persisted config entries, one per physical device.
//!
//! Entries are stored as JSON with a schema `version`. Version 1 entries predate the per-device
//! unique id; they are upgraded once, when the store is loaded.
use std::{
    ffi::OsString,
    fs,
    io::{Error as IoError, ErrorKind},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config_flow::{canonical_host, normalize_host},
    error::ConfigError,
    DEFAULT_NAME, DOMAIN,
};

/// Current schema version of [`ConfigEntry`].
pub const CONFIG_ENTRY_VERSION: u32 = 2;

/// Connection data of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    /// IP address or hostname of the device, with an optional port.
    pub host: String,
}

/// User adjustable options of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    /// Display name of the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub version: u32,
    pub entry_id: String,
    pub unique_id: String,
    pub title: String,
    pub data: EntryData,
    #[serde(default)]
    pub options: EntryOptions,
}

impl ConfigEntry {
    /// Creates an entry with fresh identifiers.
    #[must_use]
    pub fn new(host: &str, name: Option<&str>) -> Self {
        Self {
            version: CONFIG_ENTRY_VERSION,
            entry_id: new_id(),
            unique_id: new_id(),
            title: DOMAIN.to_owned(),
            data: EntryData {
                host: host.to_owned(),
            },
            options: EntryOptions {
                name: name.map(str::to_owned),
            },
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.data.host
    }

    /// Display name, `Ecocompteur` unless overridden.
    #[must_use]
    pub fn name(&self) -> &str {
        self.options.name.as_deref().unwrap_or(DEFAULT_NAME)
    }
}

/// Entry layout before unique ids were introduced.
#[derive(Debug, Deserialize)]
struct EntryV1 {
    #[serde(default = "new_id")]
    entry_id: String,
    #[serde(default = "default_title")]
    title: String,
    data: EntryData,
    #[serde(default)]
    options: EntryOptions,
}

impl EntryV1 {
    fn upgrade(self) -> ConfigEntry {
        let host = normalize_host(&self.data.host).unwrap_or_else(|e| {
            tracing::warn!("Keeping host of entry {} as is: {e}", self.entry_id);
            self.data.host.clone()
        });
        ConfigEntry {
            version: CONFIG_ENTRY_VERSION,
            entry_id: self.entry_id,
            unique_id: new_id(),
            title: self.title,
            data: EntryData { host },
            options: self.options,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(default = "first_version")]
    version: u32,
}

const fn first_version() -> u32 {
    1
}

fn default_title() -> String {
    DOMAIN.to_owned()
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Brings a stored entry to the current schema.
///
/// Returns the entry and whether it was changed.
///
/// # Errors
///
/// Will return an error if the record does not match its declared version, or if the version is newer
/// than [`CONFIG_ENTRY_VERSION`].
pub fn migrate_entry(raw: Value) -> Result<(ConfigEntry, bool), ConfigError> {
    let probe = VersionProbe::deserialize(&raw)?;
    match probe.version {
        1 => {
            let entry = EntryV1::deserialize(&raw)?.upgrade();
            tracing::info!(
                "Migrated config entry {} to version {CONFIG_ENTRY_VERSION}",
                entry.entry_id
            );
            Ok((entry, true))
        }
        CONFIG_ENTRY_VERSION => Ok((ConfigEntry::deserialize(&raw)?, false)),
        version => Err(ConfigError::UnsupportedVersion { version }),
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: Vec<Value>,
}

/// JSON file holding all config entries.
#[derive(Debug)]
pub struct EntryStore {
    path: PathBuf,
    entries: Vec<ConfigEntry>,
    dirty: bool,
}

impl EntryStore {
    /// Loads the store, migrating old entries. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Will return an error if the file cannot be read or one of its entries cannot be migrated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let file: StoreFile = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreFile::default(),
            Err(e) => {
                return Err(io_error(&path, e))
            }
        };

        let mut dirty = false;
        let mut entries = Vec::with_capacity(file.entries.len());
        for raw in file.entries {
            let (entry, migrated) = migrate_entry(raw)?;
            dirty |= migrated;
            entries.push(entry);
        }
        tracing::debug!("Loaded {} config entries from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries,
            dirty,
        })
    }

    /// Writes the store back to disk.
    ///
    /// The entries are written to a sibling temporary file first, then renamed over the store, so
    /// the store file is either the old or the new version.
    ///
    /// # Errors
    ///
    /// Will return an error if the file cannot be written.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        let file = StoreFile {
            entries: self
                .entries
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
        };
        let raw = serde_json::to_string_pretty(&file)?;
        let temp = self.temp_path();
        fs::write(&temp, raw).map_err(|e| io_error(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ignored: Result<(), IoError> = fs::remove_file(&temp);
            return Err(io_error(&self.path, e));
        }
        tracing::debug!("Saved {} config entries to {}", self.entries.len(), self.path.display());
        self.dirty = false;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("entries.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Whether the in-memory entries differ from the file.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Entry configured for a host, if any.
    ///
    /// Hosts are compared normalized, so `10.0.0.5` and `10.0.0.5:80` are the same device.
    #[must_use]
    pub fn find_by_host(&self, host: &str) -> Option<&ConfigEntry> {
        let wanted = canonical_host(host);
        self.entries
            .iter()
            .find(|entry| canonical_host(entry.host()) == wanted)
    }

    pub fn add(&mut self, entry: ConfigEntry) {
        self.entries.push(entry);
        self.dirty = true;
    }
}

fn io_error(path: &Path, source: IoError) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}
