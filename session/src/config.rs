//! Session configuration as it arrives from the host side.
//!
//! The host passes argument maps across its plugin boundary; these types
//! mirror those maps key for key so they can be parsed straight from JSON.

use std::time::Duration;

use scankit_geometry::CropRegion;
use scankit_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};

use crate::ScanError;

/// What the session looks for in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecognitionType {
    /// One barcode per recognition.
    #[default]
    Barcode,
}

impl TryFrom<u8> for RecognitionType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Barcode),
            other => Err(format!("unknown recognition type {other}")),
        }
    }
}

impl From<RecognitionType> for u8 {
    fn from(kind: RecognitionType) -> Self {
        match kind {
            RecognitionType::Barcode => 0,
        }
    }
}

/// Arguments of a scan start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanOptions {
    /// What to recognize.
    #[serde(rename = "type", default)]
    pub recognition_type: RecognitionType,
    /// Cooldown after each detection, in milliseconds.
    #[serde(rename = "delay", default)]
    pub delay_ms: u32,
}

impl ScanOptions {
    /// Parse a JSON argument map such as `{"type": 0, "delay": 500}`.
    ///
    /// # Errors
    /// Returns [`ScanError::InvalidArguments`] if the map is malformed.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Cooldown as a [`Duration`].
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.delay_ms as u64)
    }
}

/// Initial scanner settings applied when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerParameters {
    /// Scan window to start with; the full frame when absent.
    #[serde(default)]
    pub initial_crop_rect: Option<CropRegion>,
    /// Camera zoom requested by the host. Carried for the camera layer; the
    /// session itself does not act on it.
    #[serde(default)]
    pub initial_zoom: Option<f64>,
}

/// Everything a [`ScanSession`](crate::ScanSession) is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Scan request arguments.
    pub options: ScanOptions,
    /// Initial scanner settings.
    pub parameters: ScannerParameters,
    /// Admit one frame in this many; `1` disables skipping.
    pub frame_skip: u32,
    /// Cooldowns at or below this many milliseconds are skipped.
    pub min_delay_ms: u32,
    /// Hold off for one cooldown before the first frame.
    pub delay_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            options: ScanOptions::default(),
            parameters: ScannerParameters::default(),
            frame_skip: 1,
            min_delay_ms: 0,
            delay_on_start: false,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON configuration; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns [`ScanError::InvalidArguments`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Scheduler settings derived from this configuration.
    #[must_use]
    pub const fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            cooldown: self.options.cooldown(),
            min_cooldown: Duration::from_millis(self.min_delay_ms as u64),
            frame_skip: self.frame_skip,
            cooldown_on_start: self.delay_on_start,
        }
    }

    /// Scan window to start with.
    #[must_use]
    pub fn initial_region(&self) -> CropRegion {
        self.parameters.initial_crop_rect.unwrap_or_default()
    }
}
