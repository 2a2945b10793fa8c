// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use pointsgo_app::{DEFAULT_PAGE_SIZE, DEFAULT_PROGRAMS, PAGE_SIZES};
use pointsgo_tui::UiOptions;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "pointsgo";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_PATH_ENV: &str = "POINTSGO_CONFIG_PATH";
const BACKEND_URL_ENV: &str = "POINTSGO_BACKEND_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: Backend::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Backend {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub page_size: Option<usize>,
    pub programs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and put values under [backend], [ui], and [log]",
                    path.display()
                )
            })?;
        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)
                .with_context(|| format!("backend.timeout in {}", path.display()))?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !PAGE_SIZES.contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be one of {:?}, got {}",
                path.display(),
                PAGE_SIZES,
                page_size
            );
        }

        if let Some(programs) = &self.ui.programs {
            if programs.is_empty() {
                bail!(
                    "ui.programs in {} must list at least one program tag",
                    path.display()
                );
            }
            if let Some(blank) = programs.iter().position(|tag| tag.trim().is_empty()) {
                bail!(
                    "ui.programs[{blank}] in {} is blank; use tags like \"AA:AAdvantage\"",
                    path.display()
                );
            }
        }

        Ok(())
    }

    /// `--backend-url`, then `[backend].base_url`, then the environment,
    /// then the local default.
    pub fn backend_url(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_owned)
            .or_else(|| self.backend.base_url.clone())
            .or_else(|| env::var(BACKEND_URL_ENV).ok().filter(|url| !url.trim().is_empty()))
            .unwrap_or_else(|| pointsgo_api::DEFAULT_BASE_URL.to_owned())
    }

    pub fn backend_timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn ui_options(&self) -> UiOptions {
        UiOptions {
            page_size: self.ui.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            programs: self.ui.programs.clone().unwrap_or_else(|| {
                DEFAULT_PROGRAMS.iter().map(|tag| (*tag).to_owned()).collect()
            }),
        }
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let root = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow!("cannot resolve a log directory; set [log].file"))?;
        Ok(root.join(APP_NAME).join(format!("{APP_NAME}.log")))
    }

    pub fn example_config(path: &Path) -> String {
        let programs = DEFAULT_PROGRAMS
            .iter()
            .map(|tag| format!("  \"{tag}\","))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "# pointsgo config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\n# Falls back to {BACKEND_URL_ENV}, then {}\nbase_url = \"{}\"\ntimeout = \"{DEFAULT_TIMEOUT}\"\n\n[ui]\npage_size = {DEFAULT_PAGE_SIZE}\nprograms = [\n{programs}\n]\n\n[log]\n# RUST_LOG overrides this\nlevel = \"{DEFAULT_LOG_LEVEL}\"\n# file = \"/absolute/path/to/pointsgo.log\"\n",
            path.display(),
            pointsgo_api::DEFAULT_BASE_URL,
            pointsgo_api::DEFAULT_BASE_URL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let parsed = if let Some(value) = raw.strip_suffix("ms") {
        value.parse().ok().map(Duration::from_millis)
    } else if let Some(value) = raw.strip_suffix('s') {
        value.parse().ok().map(Duration::from_secs)
    } else if let Some(value) = raw.strip_suffix('m') {
        value
            .parse::<u64>()
            .ok()
            .and_then(|mins| mins.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        None
    };
    parsed.ok_or_else(|| {
        anyhow!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
    })
}
