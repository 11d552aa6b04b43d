// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! `key=value` configuration file, `$XDG_CONFIG_HOME/radae-decoder.conf`.
//!
//! All keys are optional; unknown keys and `#` comments are ignored.  The
//! percentage sliders persist as integers 0–100 and map onto the codec
//! scale factors via [`Config::tx_scale`] and [`Config::mic_gain`].

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::callsign::sanitize_callsign;

pub const CONFIG_FILE_NAME: &str = "radae-decoder.conf";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// RX capture device name.
    pub input: Option<String>,
    /// RX playback device name.
    pub output: Option<String>,
    /// TX microphone device name.
    pub tx_input: Option<String>,
    /// TX radio output device name.
    pub tx_output: Option<String>,
    /// TX drive level, percent.
    pub tx_level: u32,
    /// Microphone level, percent.
    pub mic_level: u32,
    pub bpf_enabled: bool,
    /// Station callsign, up to 8 chars.
    pub callsign: String,
    /// Maidenhead locator, up to 8 chars (persisted pass-through).
    pub gridsquare: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            tx_input: None,
            tx_output: None,
            tx_level: 50,
            mic_level: 50,
            bpf_enabled: false,
            callsign: String::new(),
            gridsquare: String::new(),
        }
    }
}

impl Config {
    /// Default config file location, `None` when no config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    pub fn load() -> Self {
        Self::default_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn parse(contents: &str) -> Self {
        let mut cfg = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let device = |v: &str| (!v.is_empty()).then(|| v.to_string());
            match key {
                "input" => cfg.input = device(value),
                "output" => cfg.output = device(value),
                "tx_input" => cfg.tx_input = device(value),
                "tx_output" => cfg.tx_output = device(value),
                "tx_level" => {
                    if let Ok(v) = value.parse::<u32>() {
                        cfg.tx_level = v.min(100);
                    }
                }
                "mic_level" => {
                    if let Ok(v) = value.parse::<u32>() {
                        cfg.mic_level = v.min(100);
                    }
                }
                "bpf_enabled" => cfg.bpf_enabled = value == "1",
                "callsign" => cfg.callsign = sanitize_callsign(value),
                "gridsquare" => {
                    cfg.gridsquare = value.chars().take(8).collect::<String>().to_uppercase()
                }
                _ => {}
            }
        }
        cfg
    }

    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::default_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no config directory")
        })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }

    fn render(&self) -> String {
        let mut out = String::from("# radae-decoder configuration\n");
        let devices = [
            ("input", self.input.as_deref()),
            ("output", self.output.as_deref()),
            ("tx_input", self.tx_input.as_deref()),
            ("tx_output", self.tx_output.as_deref()),
        ];
        for (key, value) in devices {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{key}={value}");
            }
        }
        let _ = writeln!(out, "tx_level={}", self.tx_level);
        let _ = writeln!(out, "mic_level={}", self.mic_level);
        let _ = writeln!(out, "bpf_enabled={}", u8::from(self.bpf_enabled));
        for (key, value) in [("callsign", &self.callsign), ("gridsquare", &self.gridsquare)] {
            if !value.is_empty() {
                let _ = writeln!(out, "{key}={value}");
            }
        }
        out
    }

    /// TX level percentage mapped to the codec output scale.
    pub fn tx_scale(&self) -> f32 {
        self.tx_level as f32 / 100.0 * 32767.0
    }

    /// Mic level percentage mapped to the capture gain (100% = 2.0).
    pub fn mic_gain(&self) -> f32 {
        self.mic_level as f32 / 100.0 * 2.0
    }
}
