use std::path::{Path, PathBuf};
use std::time::Duration;

use html2pdf_lib::{BrowserOptions, Config, ConvertOptions, Error, PdfOptions};

use crate::cli::Cli;

/// Settings after merging the config file with CLI flags.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub browser: BrowserOptions,
    pub defaults: ConvertOptions,
    pub output_path: PathBuf,
}

/// Loads the config file named by `--config`, or the central one.
pub fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    Config::load(path)
}

/// Layers CLI flags over `config`. Boolean flags can only switch a feature
/// on; leaving them off keeps the config value.
pub fn resolve_settings(cli: &Cli, config: &Config) -> Result<ResolvedSettings, Error> {
    let mut config = config.clone();

    if let Some(secs) = cli.timeout {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(Error::Config(format!(
                "--timeout must be a positive number of seconds, got {secs}"
            )));
        }
        let timeout = Duration::try_from_secs_f64(secs)
            .map_err(|e| Error::Config(format!("--timeout {secs} is out of range: {e}")))?;
        config.timeout = Some(timeout);
    }
    if cli.print_background {
        config.print_background = true;
    }
    if let Some(chrome) = &cli.chrome {
        config.browser.executable = Some(chrome.clone());
    }
    if cli.no_sandbox {
        config.browser.sandbox = false;
    }
    config.pdf = config.pdf.merged_with(&PdfOptions {
        landscape: cli.landscape.then_some(true),
        scale: cli.scale,
        ..PdfOptions::default()
    });
    config.validate().map_err(Error::Config)?;

    Ok(ResolvedSettings {
        browser: config.browser_options(),
        defaults: config.convert_options(),
        output_path: output_path_for(cli),
    })
}

/// `-o` if given, otherwise the input with a `.pdf` extension.
pub fn output_path_for(cli: &Cli) -> PathBuf {
    match &cli.output {
        Some(path) => path.clone(),
        None if cli.reads_stdin() => PathBuf::from("output.pdf"),
        None => Path::new(&cli.input).with_extension("pdf"),
    }
}

/// Human readable summary of the effective settings, used with `--verbose`.
pub fn format_effective_settings(settings: &ResolvedSettings) -> String {
    let resolved = ConvertOptions::new().resolve_over(&settings.defaults);
    let timeout = resolved
        .timeout
        .map(|t| format!("{:.1}s", t.as_secs_f64()))
        .unwrap_or_else(|| "none".to_string());
    let chrome = settings
        .browser
        .executable
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "auto-detect".to_string());
    format!(
        "Effective settings: output={}, timeout={}, printBackground={}, landscape={}, scale={}, chrome={}, sandbox={}",
        settings.output_path.display(),
        timeout,
        resolved.print.print_background,
        resolved.print.layout.landscape.unwrap_or(false),
        resolved
            .print
            .layout
            .scale
            .map(|s| s.to_string())
            .unwrap_or_else(|| "default".to_string()),
        chrome,
        settings.browser.sandbox,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["html2pdf"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn output_defaults_to_input_with_pdf_extension() {
        assert_eq!(
            output_path_for(&cli(&["docs/report.html"])),
            PathBuf::from("docs/report.pdf")
        );
        assert_eq!(output_path_for(&cli(&["notes"])), PathBuf::from("notes.pdf"));
        assert_eq!(output_path_for(&cli(&["-"])), PathBuf::from("output.pdf"));
        assert_eq!(
            output_path_for(&cli(&["a.html", "-o", "b.pdf"])),
            PathBuf::from("b.pdf")
        );
    }

    #[test]
    fn cli_flags_override_config() {
        let config = Config::from_toml(
            r#"
timeout = "60s"
[browser]
executable = "/opt/chrome"
[pdf]
scale = 0.5
"#,
        )
        .expect("config");
        let settings = resolve_settings(
            &cli(&[
                "a.html",
                "--timeout",
                "5",
                "--chrome",
                "/usr/bin/chromium",
                "--scale",
                "1.5",
                "--no-sandbox",
            ]),
            &config,
        )
        .expect("resolve");

        let resolved = ConvertOptions::new().resolve_over(&settings.defaults);
        assert_eq!(resolved.timeout, Some(Duration::from_secs(5)));
        assert_eq!(resolved.print.layout.scale, Some(1.5));
        assert_eq!(
            settings.browser.executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        assert!(!settings.browser.sandbox);
    }

    #[test]
    fn config_values_survive_when_flags_absent() {
        let config = Config::from_toml("print_background = true\n[pdf]\nlandscape = true")
            .expect("config");
        let settings = resolve_settings(&cli(&["a.html"]), &config).expect("resolve");
        let resolved = ConvertOptions::new().resolve_over(&settings.defaults);
        assert!(resolved.print.print_background);
        assert_eq!(resolved.print.layout.landscape, Some(true));
        assert!(settings.browser.sandbox);
    }

    #[test]
    fn rejects_invalid_flag_values() {
        let config = Config::default();
        assert!(resolve_settings(&cli(&["a.html", "--timeout", "0"]), &config).is_err());
        assert!(resolve_settings(&cli(&["a.html", "--scale", "5"]), &config).is_err());
    }

    #[test]
    fn effective_settings_mention_output_and_timeout() {
        let settings =
            resolve_settings(&cli(&["a.html", "--timeout", "3"]), &Config::default())
                .expect("resolve");
        let text = format_effective_settings(&settings);
        assert!(text.contains("output=a.pdf"));
        assert!(text.contains("timeout=3.0s"));
        assert!(text.contains("chrome=auto-detect"));
    }
}
