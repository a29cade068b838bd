// chatwin — Conversation message window engine for chat clients
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_GAP_THRESHOLD_MS: i64 = 5 * 60 * 1000;
pub const DEFAULT_SPINNER_DELAY_MS: u64 = 1000;
pub const DEFAULT_START_INDEX: i64 = 10_000;
pub const DEFAULT_JUMP_BEFORE: usize = 20;
pub const DEFAULT_JUMP_AFTER: usize = 20;

const CONFIG_DIR_NAME: &str = "chatwin";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Messages requested per older/newer page.
    pub page_size: usize,
    /// Adjacent messages further apart than this get a time separator.
    pub gap_threshold_ms: i64,
    /// How long a send may stay unresolved before its spinner is shown.
    pub spinner_delay_ms: u64,
    /// Virtualization anchor for an empty window.
    pub start_index: i64,
    pub jump_before: usize,
    pub jump_after: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        *default_window_config()
    }
}

#[must_use]
pub fn default_window_config() -> &'static WindowConfig {
    static CONFIG: WindowConfig = WindowConfig {
        page_size: DEFAULT_PAGE_SIZE,
        gap_threshold_ms: DEFAULT_GAP_THRESHOLD_MS,
        spinner_delay_ms: DEFAULT_SPINNER_DELAY_MS,
        start_index: DEFAULT_START_INDEX,
        jump_before: DEFAULT_JUMP_BEFORE,
        jump_after: DEFAULT_JUMP_AFTER,
    };
    &CONFIG
}

impl WindowConfig {
    #[must_use]
    pub fn spinner_delay(&self) -> Duration {
        Duration::from_millis(self.spinner_delay_ms)
    }

    /// Clamp values that would stall paging.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.gap_threshold_ms = self.gap_threshold_ms.max(0);
        self
    }
}

/// `<config_dir>/chatwin/config.json`, when the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
}

/// Resolve the window configuration.
///
/// An explicit path must exist. Without one, the default path is used when
/// present and built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<WindowConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => read_config(&path),
        _ => Ok(WindowConfig::default()),
    }
}

fn read_config(path: &Path) -> anyhow::Result<WindowConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: WindowConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "loaded window config");
    Ok(config.sanitized())
}
