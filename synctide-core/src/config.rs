//! Configuration model for synctide.
//!
//! Two JSON documents drive a run: `config.json` (the task table) and
//! `flags.json` (the shared flag arrays). Both are loaded once at program
//! entry and passed by reference into the components that use them.

use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes and enums
// ---------------------------------------------------------------------------

/// A strongly-typed task name, unique within its sync mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct TaskName(pub String);

impl TaskName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TaskName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Sync discipline for a task: two-way reconciliation or one-way mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Bisync,
    Backup,
}

impl SyncMode {
    /// Subcommand passed to the sync tool. Backup is a one-way mirror and
    /// maps onto plain `sync`; only bisync has a verb of its own.
    pub fn verb(self) -> &'static str {
        match self {
            SyncMode::Bisync => "bisync",
            SyncMode::Backup => "sync",
        }
    }

    /// Direction marker used in log lines.
    pub fn arrow(self) -> &'static str {
        match self {
            SyncMode::Bisync => "<-->",
            SyncMode::Backup => "-->",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Bisync => write!(f, "bisync"),
            SyncMode::Backup => write!(f, "backup"),
        }
    }
}

/// Environment a run executes in, selecting the last shared flag layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnvironment {
    /// Interactive invocation; stdout is a terminal.
    Terminal,
    /// Background invocation through the recurring trigger.
    Service,
}

// ---------------------------------------------------------------------------
// OrderedMap
// ---------------------------------------------------------------------------

/// A map that preserves JSON document order and rejects duplicate keys.
///
/// Iteration order is part of the contract: modes and tasks run in the order
/// the operator declared them, so a hash or tree map would silently
/// reshuffle the schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<K, V>(Vec<(K, V)>);

// Manual impl; a derive would demand `K: Default, V: Default`.
impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<K, V> OrderedMap<K, V> {
    pub fn iter(&self) -> std::slice::Iter<'_, (K, V)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V>
    where
        K: PartialEq,
    {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a, K, V> IntoIterator for &'a OrderedMap<K, V> {
    type Item = &'a (K, V);
    type IntoIter = std::slice::Iter<'a, (K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedMap<K, V>
where
    K: Deserialize<'de> + PartialEq + fmt::Display,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor<K, V>(PhantomData<(K, V)>);

        impl<'de, K, V> Visitor<'de> for OrderedMapVisitor<K, V>
        where
            K: Deserialize<'de> + PartialEq + fmt::Display,
            V: Deserialize<'de>,
        {
            type Value = OrderedMap<K, V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(K, V)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<K, V>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(de::Error::custom(format!("duplicate key '{key}'")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One configured source/destination pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskSpec {
    pub src: String,
    /// Local path, or a remote address when it contains `:`.
    pub dst: String,
    #[serde(default)]
    pub extra_flags: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Root of `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tasks: OrderedMap<SyncMode, OrderedMap<TaskName, TaskSpec>>,
}

/// Root of `flags.json`: ordered flag arrays shared by every task.
///
/// Merge order is `base`, then the mode array, then the environment array,
/// then cascading filters, then per-task extras; the external tool gives
/// later entries precedence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct FlagSet {
    #[serde(default)]
    pub base: Vec<String>,
    #[serde(default)]
    pub bisync: Vec<String>,
    #[serde(default)]
    pub backup: Vec<String>,
    #[serde(default)]
    pub terminal: Vec<String>,
    #[serde(default)]
    pub systemd: Vec<String>,
}

impl FlagSet {
    pub fn for_mode(&self, mode: SyncMode) -> &[String] {
        match mode {
            SyncMode::Bisync => &self.bisync,
            SyncMode::Backup => &self.backup,
        }
    }

    pub fn for_environment(&self, environment: RunEnvironment) -> &[String] {
        match environment {
            RunEnvironment::Terminal => &self.terminal,
            RunEnvironment::Service => &self.systemd,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn read_json<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the task table from `config.json`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_json(path)
}

/// Load the shared flag arrays from `flags.json`.
pub fn load_flags(path: &Path) -> Result<FlagSet, ConfigError> {
    read_json(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
