use clap::{CommandFactory, Parser};
use dcmconv::cli::Args;
use dcmconv::dicom::ProcessError;
use dcmconv::display_metadata::format_metadata;
use dcmconv::{Conversion, ExternalDecoder, convert_file, display, output};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.files.is_empty() {
        let _ = Args::command().print_help();
        println!();
        return;
    }

    let decoder = args.decoder();
    let multiple_files = args.files.len() > 1;
    let mut any_failed = false;

    for (idx, file_path) in args.files.iter().enumerate() {
        if multiple_files {
            println!("{}", file_path.display());
        }

        match process_file(file_path, &args, &decoder) {
            Ok(conversion) => {
                if let Err(e) = show_conversion(&conversion, &args) {
                    println!("Error: {e:#}");
                    any_failed = true;
                }
            }
            Err(e) => {
                print!("{}", failure_report(&e, args.verbose));
                any_failed = true;
            }
        }

        if multiple_files && idx < args.files.len() - 1 {
            println!();
        }
    }

    if any_failed {
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Convert a single DICOM file and write its outputs
fn process_file(file_path: &Path, args: &Args, decoder: &dyn ExternalDecoder) -> Result<Conversion, ProcessError> {
    // Stage 1: Read, parse and convert
    let conversion = convert_file(file_path, decoder, &args.convert_options())?;

    // Stage 2: Write outputs
    let written = output::write_conversion(
        &conversion,
        file_path,
        args.output_dir.as_deref(),
        !args.no_metadata,
    )
    .map_err(|error| ProcessError::OutputFailed {
        metadata: Box::new(conversion.metadata().clone()),
        error,
    })?;
    for path in &written {
        info!(path = %path.display(), "written");
    }

    Ok(conversion)
}

/// Verbose metadata listing, then the preview or the document kind
fn show_conversion(conversion: &Conversion, args: &Args) -> anyhow::Result<()> {
    if args.verbose {
        dcmconv::print_metadata(conversion.metadata());
    }

    match conversion {
        Conversion::Image { raster, .. } if args.preview => display::print_image(raster, args)?,
        Conversion::Document { kind, .. } => println!("No image: {kind}"),
        Conversion::Image { .. } => {}
    }
    Ok(())
}

/// Error line, preceded in verbose mode by whatever metadata was read
fn failure_report(error: &ProcessError, verbose: bool) -> String {
    let mut report = String::new();
    if verbose && let Some(metadata) = error.metadata() {
        report.push_str(&format_metadata(metadata));
    }
    report.push_str(&format!("Error: {error}\n"));
    report
}
