use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Stdin marker for the input argument.
pub const STDIN_MARKER: &str = "-";

#[derive(Parser, Debug)]
#[command(name = "html2pdf")]
#[command(
    version,
    about = "Convert HTML to PDF using headless Chrome",
    long_about = "html2pdf\n\nRenders an HTML file (or HTML read from stdin with `-`) in a headless Chrome/Chromium and writes the printed PDF next to it, or to --output.\n\nSettings come from built-in defaults, then the config file, then flags."
)]
pub struct Cli {
    #[arg(value_name = "INPUT", help = "HTML file to convert, or `-` to read from stdin")]
    pub input: String,

    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Where to write the PDF (defaults to INPUT with a .pdf extension, or output.pdf for stdin)"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        help = "Optional config file (TOML); CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output", conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(long, help = "Print nothing on success")]
    pub quiet: bool,

    #[arg(long, value_name = "SECS", help = "Overall conversion timeout in seconds")]
    pub timeout: Option<f64>,

    #[arg(long, help = "Print CSS background colors and images")]
    pub print_background: bool,

    #[arg(long, help = "Landscape paper orientation")]
    pub landscape: bool,

    #[arg(long, value_name = "F", help = "Rendering scale (0.1 to 2.0)")]
    pub scale: Option<f64>,

    #[arg(long, value_name = "PATH", help = "Chrome/Chromium executable to launch")]
    pub chrome: Option<PathBuf>,

    #[arg(long, help = "Launch the browser without its sandbox (containers, CI)")]
    pub no_sandbox: bool,

    #[arg(long, value_enum, default_value = "json", help = "Report format")]
    pub format: OutputFormat,
}

impl Cli {
    pub fn reads_stdin(&self) -> bool {
        self.input == STDIN_MARKER
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}
