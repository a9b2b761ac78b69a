use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use html2pdf_lib::transport::Transport;
use html2pdf_lib::{
    Context, ConvertOptions, ConvertOutput, Converter, Done, Error, Html2PdfOutput,
    InputDescriptor, InputKind, Logger, Phase, OUTPUT_VERSION,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::cli::Cli;
use crate::formatting::{render_error, write_output};
use crate::settings::{format_effective_settings, load_config, resolve_settings};

/// Where the HTML comes from.
#[derive(Debug)]
pub enum InputSource {
    File(PathBuf),
    Stdin(String),
}

impl InputSource {
    fn descriptor(&self) -> InputDescriptor {
        match self {
            InputSource::File(path) => InputDescriptor {
                kind: InputKind::File,
                path: Some(path.clone()),
            },
            InputSource::Stdin(_) => InputDescriptor {
                kind: InputKind::Stdin,
                path: None,
            },
        }
    }
}

/// Run the convert command.
pub async fn run_convert(cli: Cli, ctx: Context) -> ExitCode {
    let format = cli.format;
    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format),
    };
    let settings = match resolve_settings(&cli, &config) {
        Ok(settings) => settings,
        Err(err) => return render_error(err, format),
    };
    if cli.verbose {
        eprintln!("{}", format_effective_settings(&settings));
    }

    let input = if cli.reads_stdin() {
        match read_html(&ctx, tokio::io::stdin()).await {
            Ok(html) => InputSource::Stdin(html),
            Err(err) => return render_error(err, format),
        }
    } else {
        InputSource::File(PathBuf::from(&cli.input))
    };

    let mut defaults = settings.defaults;
    if cli.quiet {
        defaults = defaults.logger(Logger::Silent);
    }
    let converter = Converter::new(settings.browser).with_defaults(defaults);

    match convert_and_write(&converter, &ctx, &input, &settings.output_path).await {
        Ok(report) => {
            if cli.quiet {
                return ExitCode::SUCCESS;
            }
            if let Err(err) = write_output(&Html2PdfOutput::Convert(report), format) {
                eprintln!("Failed to write output: {err}");
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        Err(err) => render_error(err, format),
    }
}

/// Converts `input` and writes the PDF to `output_path`, creating parent
/// directories as needed. Nothing is written when conversion fails.
pub async fn convert_and_write<T: Transport>(
    converter: &Converter<T>,
    ctx: &Context,
    input: &InputSource,
    output_path: &Path,
) -> Result<ConvertOutput, Error> {
    let started = Instant::now();
    let pdf = match input {
        InputSource::File(path) => {
            converter
                .convert_file(ctx, path, ConvertOptions::new())
                .await?
        }
        InputSource::Stdin(html) => {
            converter
                .convert_content(ctx, html, ConvertOptions::new())
                .await?
        }
    };

    if let Some(parent) = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    tokio::fs::write(output_path, &pdf)
        .await
        .map_err(|e| Error::io(output_path, e))?;
    debug!(path = %output_path.display(), bytes = pdf.len(), "wrote PDF");

    let print_background = ConvertOptions::new()
        .resolve_over(converter.defaults())
        .print
        .print_background;
    Ok(ConvertOutput {
        version: OUTPUT_VERSION.to_string(),
        input: input.descriptor(),
        output_path: output_path.to_path_buf(),
        bytes: pdf.len(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        print_background,
    })
}

/// Reads all of `reader` as HTML, giving up as soon as `ctx` is done.
async fn read_html<R>(ctx: &Context, mut reader: R) -> Result<String, Error>
where
    R: AsyncRead + Unpin,
{
    let mut html = String::new();
    ctx.run(reader.read_to_string(&mut html))
        .await
        .map_err(|done| match done {
            Done::Cancelled => Error::Cancelled {
                phase: Phase::Setup,
            },
            Done::DeadlineExceeded => Error::DeadlineExceeded {
                phase: Phase::Setup,
            },
        })?
        .map_err(|e| Error::io("<stdin>", e))?;
    Ok(html)
}
