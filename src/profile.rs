//! Browser profile management for session persistence

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata about a browser profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    /// Profile name
    pub name: String,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// When the profile was last used by a session
    pub last_used: DateTime<Utc>,
}

/// Emulation settings that only take effect when a session starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Manages `<profiles>/<name>/` directories holding the browser's user data
#[derive(Debug, Clone)]
pub struct ProfileStore {
    profiles_dir: PathBuf,
}

/// Profile names become directory names: letters, digits, `-`, `_` and `.`
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        anyhow::bail!(
            "Invalid profile name '{}' (use letters, digits, '-', '_' or '.')",
            name
        );
    }
    Ok(())
}

impl ProfileStore {
    pub fn new(profiles_dir: impl Into<PathBuf>) -> Result<Self> {
        let profiles_dir = profiles_dir.into();
        fs::create_dir_all(&profiles_dir).with_context(|| {
            format!("Unable to create profiles directory {}", profiles_dir.display())
        })?;
        Ok(ProfileStore { profiles_dir })
    }

    pub fn root(&self) -> &Path {
        &self.profiles_dir
    }

    pub fn profile_dir(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(name)
    }

    /// Chromium `--user-data-dir` for a profile
    pub fn user_data_dir(&self, name: &str) -> PathBuf {
        self.profile_dir(name).join("chrome")
    }

    pub fn exists(&self, name: &str) -> bool {
        self.profile_dir(name).join("metadata.json").exists()
    }

    /// Create the profile if needed and mark it as used now.
    pub fn ensure(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let profile_path = self.profile_dir(name);
        fs::create_dir_all(self.user_data_dir(name))
            .with_context(|| format!("Unable to create profile directory {}", profile_path.display()))?;

        let metadata_path = profile_path.join("metadata.json");
        let metadata = match self.read_metadata(&metadata_path) {
            Some(mut existing) => {
                existing.last_used = Utc::now();
                existing
            }
            None => {
                info!("Created profile '{}'", name);
                ProfileMetadata {
                    name: name.to_string(),
                    created_at: Utc::now(),
                    last_used: Utc::now(),
                }
            }
        };
        let metadata_json = serde_json::to_string_pretty(&metadata)?;
        fs::write(&metadata_path, metadata_json)?;
        Ok(profile_path)
    }

    fn read_metadata(&self, path: &Path) -> Option<ProfileMetadata> {
        let json = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&json) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!("Ignoring unreadable profile metadata {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn list(&self) -> Result<Vec<ProfileMetadata>> {
        let mut profiles = Vec::new();

        for entry in fs::read_dir(&self.profiles_dir)? {
            let path = entry?.path();
            if path.is_dir()
                && let Some(metadata) = self.read_metadata(&path.join("metadata.json"))
            {
                profiles.push(metadata);
            }
        }

        profiles.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        Ok(profiles)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let profile_path = self.profile_dir(name);

        if !profile_path.exists() {
            anyhow::bail!("Profile '{}' does not exist", name);
        }

        fs::remove_dir_all(&profile_path)?;
        info!("Deleted profile '{}'", name);
        Ok(())
    }

    pub fn preferences(&self, name: &str) -> Result<ProfilePreferences> {
        let path = self.profile_dir(name).join("preferences.json");
        if !path.exists() {
            return Ok(ProfilePreferences::default());
        }
        let json = fs::read_to_string(&path)?;
        serde_json::from_str(&json)
            .with_context(|| format!("Corrupt preferences file {}", path.display()))
    }

    pub fn save_preferences(&self, name: &str, preferences: &ProfilePreferences) -> Result<()> {
        let dir = self.profile_dir(name);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(preferences)?;
        fs::write(dir.join("preferences.json"), json)?;
        debug!("Saved preferences for profile '{}'", name);
        Ok(())
    }
}
