use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::models::{SessionMetadata, TimingMode};

pub const SUPPORTED_FREQUENCIES_HZ: [u32; 2] = [2, 4];

/// Preferences applied to the next session the user starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub sampling_frequency_hz: u32,
    pub timing_mode: TimingMode,
    pub car_name: Option<String>,
    pub vehicle_name: Option<String>,
    pub driver_name: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            sampling_frequency_hz: 2,
            timing_mode: TimingMode::default(),
            car_name: None,
            vehicle_name: None,
            driver_name: None,
        }
    }
}

impl UserSettings {
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            car_name: self.car_name.clone(),
            vehicle_name: self.vehicle_name.clone(),
            driver_name: self.driver_name.clone(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> Result<UserSettings> {
        Ok(self.read()?.clone())
    }

    pub fn update_sampling_frequency(&self, hz: u32) -> Result<()> {
        if !SUPPORTED_FREQUENCIES_HZ.contains(&hz) {
            bail!("unsupported sampling frequency {hz} Hz (expected 2 or 4)");
        }
        self.update(|settings| settings.sampling_frequency_hz = hz)
    }

    pub fn update_timing_mode(&self, mode: TimingMode) -> Result<()> {
        self.update(|settings| settings.timing_mode = mode)
    }

    pub fn update_metadata(&self, metadata: SessionMetadata) -> Result<()> {
        self.update(|settings| {
            settings.car_name = metadata.car_name;
            settings.vehicle_name = metadata.vehicle_name;
            settings.driver_name = metadata.driver_name;
        })
    }

    fn update(&self, apply: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.write()?;
        apply(&mut guard);
        self.persist(&guard)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, UserSettings>> {
        self.data
            .read()
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, UserSettings>> {
        self.data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
