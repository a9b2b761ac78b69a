use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use html2pdf_lib::{Error, ErrorOutput, Html2PdfOutput, InputKind, OUTPUT_VERSION};

use crate::cli::OutputFormat;

/// Write the report in the requested format to stdout.
pub fn write_output(body: &Html2PdfOutput, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(body)?),
        OutputFormat::Pretty => write_pretty_output(body),
    }
    Ok(())
}

/// Render an error and return the fatal exit code.
pub fn render_error(err: Error, format: OutputFormat) -> ExitCode {
    let payload = Html2PdfOutput::Error(ErrorOutput {
        version: OUTPUT_VERSION.to_string(),
        error: err.to_payload(),
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            println!("{content}");
        }
        OutputFormat::Pretty => write_pretty_output(&payload),
    }

    ExitCode::from(2)
}

fn write_pretty_output(body: &Html2PdfOutput) {
    if io::stdout().is_terminal() {
        println!("{}", format_pretty(body, true));
        return;
    }

    // Piped stdout keeps the JSON shape.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    println!("{content}");
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &Html2PdfOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        Html2PdfOutput::Convert(out) => {
            let header = color("[OK]", "32", colorize);
            writeln!(buf, "{} Wrote {}", header, out.output_path.display()).ok();
            let source = match (out.input.kind, &out.input.path) {
                (InputKind::File, Some(path)) => path.display().to_string(),
                _ => "stdin".to_string(),
            };
            writeln!(buf, "Input: {source}").ok();
            writeln!(
                buf,
                "Size: {} ({} bytes)",
                human_size(out.bytes),
                out.bytes
            )
            .ok();
            writeln!(buf, "Elapsed: {} ms", out.elapsed_ms).ok();
            if out.print_background {
                writeln!(buf, "Backgrounds: printed").ok();
            }
        }
        Html2PdfOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            writeln!(buf, "{} {}", header, out.error.message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

fn human_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes >= KIB * KIB {
        format!("{:.1} MiB", bytes / (KIB * KIB))
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}
