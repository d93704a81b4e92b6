// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving link settings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::{
    CodecMode, ConnectTarget, StreamConfig, APP_SERVICE_UUID, FALLBACK_RFCOMM_CHANNEL,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link settings.
    pub link: LinkConfig,
}

/// Settings for the connection core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Service record looked up on the remote device.
    pub service_uuid: Uuid,

    /// RFCOMM channel tried when the service record lookup fails.
    /// `None` disables the fallback.
    pub fallback_channel: Option<u8>,

    /// Wire encoding shared with the peripheral.
    pub codec: CodecMode,

    /// Size of the scratch buffer for each read.
    pub read_chunk_size: usize,

    /// Byte appended to every outbound payload, e.g. 13 for `\r`.
    pub terminator: Option<u8>,

    /// When set, inbound bytes are delivered as frames ending in this byte.
    pub delimiter: Option<u8>,

    /// Bound on each connect strategy, in milliseconds.
    pub connect_timeout_ms: Option<u64>,

    /// Treat a zero-length read as the end of the session.
    pub eof_disconnects: bool,

    /// Pause after a zero-length read, in milliseconds.
    pub idle_read_backoff_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service_uuid: APP_SERVICE_UUID,
            fallback_channel: Some(FALLBACK_RFCOMM_CHANNEL),
            codec: CodecMode::Hex,
            read_chunk_size: 1024,
            terminator: None,
            delimiter: None,
            connect_timeout_ms: None,
            eof_disconnects: false,
            idle_read_backoff_ms: 20,
        }
    }
}

impl LinkConfig {
    /// Reject settings the stream pump cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            bail!("read_chunk_size must be at least 1");
        }
        if self.connect_timeout_ms == Some(0) {
            bail!("connect_timeout_ms must be positive when set");
        }
        if self.idle_read_backoff_ms == 0 {
            bail!("idle_read_backoff_ms must be at least 1");
        }
        Ok(())
    }

    /// Connect strategies in the order they are tried.
    pub fn connect_targets(&self) -> Vec<ConnectTarget> {
        let mut targets = vec![ConnectTarget::ServiceRecord(self.service_uuid)];
        if let Some(channel) = self.fallback_channel {
            targets.push(ConnectTarget::Channel(channel));
        }
        targets
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            read_chunk_size: self.read_chunk_size.max(1),
            codec: self.codec,
            delimiter: self.delimiter,
            terminator: self.terminator,
            eof_disconnects: self.eof_disconnects,
            idle_backoff: Duration::from_millis(self.idle_read_backoff_ms.max(1)),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("btserial")
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let config_dir = config_dir();
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.link.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_dir = config_dir();
        std::fs::create_dir_all(&config_dir)?;
        self.save_to(&config_dir.join("config.toml"))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let link = LinkConfig::default();
        assert_eq!(link.service_uuid, APP_SERVICE_UUID);
        assert_eq!(link.codec, CodecMode::Hex);
        assert_eq!(link.read_chunk_size, 1024);
        assert_eq!(
            link.connect_targets(),
            vec![
                ConnectTarget::ServiceRecord(APP_SERVICE_UUID),
                ConnectTarget::Channel(1)
            ]
        );
        assert!(link.connect_timeout().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [link]
            codec = "raw"
            read_chunk_size = 20
            terminator = 13
            "#,
        )
        .unwrap();

        assert_eq!(config.link.codec, CodecMode::Raw);
        assert_eq!(config.link.read_chunk_size, 20);
        assert_eq!(config.link.terminator, Some(b'\r'));
        assert_eq!(config.link.fallback_channel, Some(1));
        assert!(!config.link.eof_disconnects);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.link.delimiter = Some(b'\n');
        config.link.connect_timeout_ms = Some(5000);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.link, config.link);
        assert_eq!(loaded.link.connect_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_idle_backoff_reaches_stream_config() {
        let link = LinkConfig {
            idle_read_backoff_ms: 75,
            ..Default::default()
        };
        assert_eq!(link.stream_config().idle_backoff, Duration::from_millis(75));

        let zero = LinkConfig {
            idle_read_backoff_ms: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[link]\nread_chunk_size = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_fallback_disabled() {
        let link = LinkConfig {
            fallback_channel: None,
            ..Default::default()
        };
        assert_eq!(link.connect_targets().len(), 1);
    }
}
