use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::options::{ConvertOptions, PdfOptions};
use crate::transport::chromium::{DEFAULT_LAUNCH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use crate::transport::BrowserOptions;
use crate::{Error, Result};

/// Defaults loaded from a TOML file.
///
/// ```toml
/// timeout = "45s"
/// print_background = true
///
/// [browser]
/// executable = "/usr/bin/chromium"
/// sandbox = false
///
/// [pdf]
/// landscape = true
/// margin_top = 0.4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub print_background: bool,
    pub browser: BrowserSection,
    pub pdf: PdfOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSection {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub args: Vec<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: true,
            window_width: None,
            window_height: None,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from a TOML file, the central config, or defaults.
    /// Priority: explicit path > `$XDG_CONFIG_HOME/html2pdf/config.toml`
    /// (or `~/.config/html2pdf/config.toml`) > defaults.
    ///
    /// An explicit path must exist; the central file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::central_config_path().filter(|p| p.is_file()) {
                Some(central) => central,
                None => return Ok(Self::default()),
            },
        };
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let cfg = Self::from_toml(&raw)
            .map_err(|e| Error::Config(format!("Invalid config ({}): {}", path.display(), e)))?;
        Ok(cfg)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        let cfg: Config = toml::from_str(raw).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn central_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("html2pdf").join("config.toml"))
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.browser.launch_timeout.is_zero() {
            return Err("browser.launch_timeout must be greater than zero".to_string());
        }
        if self.browser.request_timeout.is_zero() {
            return Err("browser.request_timeout must be greater than zero".to_string());
        }
        match (self.browser.window_width, self.browser.window_height) {
            (Some(0), _) | (_, Some(0)) => {
                return Err("browser window dimensions must be positive".to_string())
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(
                    "browser.window_width and browser.window_height must be set together"
                        .to_string(),
                )
            }
            _ => {}
        }
        if let Some(scale) = self.pdf.scale {
            if !(0.1..=2.0).contains(&scale) {
                return Err(format!("pdf.scale must be between 0.1 and 2.0, got {scale}"));
            }
        }
        for (name, value) in [
            ("pdf.paper_width", self.pdf.paper_width),
            ("pdf.paper_height", self.pdf.paper_height),
        ] {
            if value.is_some_and(|v| v <= 0.0) {
                return Err(format!("{name} must be positive"));
            }
        }
        for (name, value) in [
            ("pdf.margin_top", self.pdf.margin_top),
            ("pdf.margin_bottom", self.pdf.margin_bottom),
            ("pdf.margin_left", self.pdf.margin_left),
            ("pdf.margin_right", self.pdf.margin_right),
        ] {
            if value.is_some_and(|v| v < 0.0) {
                return Err(format!("{name} must not be negative"));
            }
        }
        Ok(())
    }

    pub fn browser_options(&self) -> BrowserOptions {
        let window_size = self.browser.window_width.zip(self.browser.window_height);
        BrowserOptions {
            executable: self.browser.executable.clone(),
            headless: self.browser.headless,
            sandbox: self.browser.sandbox,
            window_size,
            launch_timeout: self.browser.launch_timeout,
            request_timeout: self.browser.request_timeout,
            args: self.browser.args.clone(),
        }
    }

    /// Conversion defaults described by this config.
    pub fn convert_options(&self) -> ConvertOptions {
        let mut opts = ConvertOptions::new()
            .print_background(self.print_background)
            .pdf(self.pdf.clone());
        if let Some(timeout) = self.timeout {
            opts = opts.timeout(timeout);
        }
        opts
    }
}
