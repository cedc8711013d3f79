// crates/core/src/preferences.rs
//! Persisted UI preferences (collapsed groups, toggle flags).
//!
//! Preferences are an explicit value loaded once and written back through a
//! single [`PreferenceStore`]; nothing reads them from ambient state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PreferenceError;

/// Toggle: bucket the Done media group by month.
pub const TOGGLE_GROUP_DONE_BY_MONTH: &str = "groupDoneByMonth";

/// User preferences for the dashboard views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub collapsed_groups: BTreeSet<String>,
    #[serde(default)]
    pub toggles: BTreeMap<String, bool>,
}

/// Partial preference update. Toggles merge key by key; a provided
/// `collapsed_groups` replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default)]
    pub collapsed_groups: Option<BTreeSet<String>>,
    #[serde(default)]
    pub toggles: Option<BTreeMap<String, bool>>,
}

impl Preferences {
    pub fn is_collapsed(&self, group: &str) -> bool {
        self.collapsed_groups.contains(group)
    }

    pub fn set_collapsed(&mut self, group: impl Into<String>, collapsed: bool) {
        let group = group.into();
        if collapsed {
            self.collapsed_groups.insert(group);
        } else {
            self.collapsed_groups.remove(&group);
        }
    }

    /// Unset toggles read as `false`.
    pub fn toggle(&self, name: &str) -> bool {
        self.toggles.get(name).copied().unwrap_or(false)
    }

    pub fn set_toggle(&mut self, name: impl Into<String>, value: bool) {
        self.toggles.insert(name.into(), value);
    }

    pub fn group_done_by_month(&self) -> bool {
        self.toggle(TOGGLE_GROUP_DONE_BY_MONTH)
    }

    pub fn merge(&mut self, patch: PreferencesPatch) {
        if let Some(collapsed) = patch.collapsed_groups {
            self.collapsed_groups = collapsed;
        }
        if let Some(toggles) = patch.toggles {
            self.toggles.extend(toggles);
        }
    }
}

/// Where preferences are loaded from and saved to.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load(&self) -> Result<Preferences, PreferenceError>;
    async fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError>;
}

/// JSON file store. A missing file reads as defaults.
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn load(&self) -> Result<Preferences, PreferenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No preferences file, using defaults");
                return Ok(Preferences::default());
            }
            Err(e) => return Err(PreferenceError::io(&self.path, e)),
        };
        serde_json::from_str(&contents).map_err(|e| PreferenceError::Malformed {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    async fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PreferenceError::io(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(preferences)?;
        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| PreferenceError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PreferenceError::io(&self.path, e))?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: Preferences) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn load(&self) -> Result<Preferences, PreferenceError> {
        Ok(self
            .inner
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone()))
    }

    async fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = preferences.clone();
        Ok(())
    }
}
