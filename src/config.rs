use std::{net::SocketAddr, path::PathBuf};

use anyhow::{ensure, Context, Result};

use crate::db::{DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_CANCEL_PROGRAM: &str = "python3";
const DEFAULT_CANCEL_SCRIPT: &str = "backend/main.py";

/// Service configuration, read from `NOISEDASH_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub cancel_program: String,
    pub cancel_script: PathBuf,
    /// `None` disables the retention sweep.
    pub retention_days: Option<u32>,
    pub monitor_on_start: bool,
    /// Remote `/readings` endpoint; readings are stored locally when unset.
    pub sampler_endpoint: Option<String>,
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            value(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        let bind_raw = value("NOISEDASH_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("NOISEDASH_BIND is not a socket address: '{bind_raw}'"))?;

        let retention_days = match value("NOISEDASH_RETENTION_DAYS") {
            Some(raw) => raw.trim().parse::<u32>().with_context(|| {
                format!("NOISEDASH_RETENTION_DAYS is not a day count: '{raw}'")
            })?,
            None => DEFAULT_RETENTION_DAYS,
        };
        ensure!(
            retention_days <= MAX_RETENTION_DAYS,
            "NOISEDASH_RETENTION_DAYS must be at most {MAX_RETENTION_DAYS}"
        );

        Ok(Self {
            bind_addr,
            data_dir: value("NOISEDASH_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.into())
                .into(),
            cancel_program: value("NOISEDASH_CANCEL_PROGRAM")
                .unwrap_or_else(|| DEFAULT_CANCEL_PROGRAM.into()),
            cancel_script: value("NOISEDASH_CANCEL_SCRIPT")
                .unwrap_or_else(|| DEFAULT_CANCEL_SCRIPT.into())
                .into(),
            retention_days: (retention_days > 0).then_some(retention_days),
            monitor_on_start: flag("NOISEDASH_MONITOR"),
            sampler_endpoint: value("NOISEDASH_SAMPLER_ENDPOINT"),
            debug: flag("NOISEDASH_DEBUG"),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("noisedash.sqlite3")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}
