//! Main entry point for the storage-report CLI application.
//!
//! The work itself is synchronous and runs on a blocking thread; the async
//! side only waits for it and turns Ctrl-C into a cancellation so temporary
//! files get cleaned up before the process exits.

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use storage_report::zip::CompressionMethod;
use storage_report::{
    ArchiveExtractor, Cancellation, Cli, CsvPacker, CsvSelection, ReportConfig, Summary,
    run_storage_report,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cancel = Cancellation::new();
    let mut work = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || execute(&cli, &cancel))
    };

    tokio::select! {
        result = &mut work => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, stopping");
            cancel.cancel();
            work.await?
        }
    }
}

fn execute(cli: &Cli, cancel: &Cancellation) -> Result<()> {
    if let Some(archive) = &cli.read {
        return read_archive(cli, archive, cancel);
    }
    match (&cli.gather, &cli.concat) {
        (Some(pattern), _) => pack_csv(cli, pattern, false, cancel),
        (_, Some(pattern)) => pack_csv(cli, pattern, true, cancel),
        _ => write_archive(cli, cancel),
    }
}

fn report_config(cli: &Cli) -> Result<ReportConfig> {
    let compression = if cli.stored {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflate
    };

    let mut config = ReportConfig::new(cli.paths.clone())?
        .with_fieldnames(cli.fields.clone())
        .with_output_file_name(cli.output_file_name.clone())
        .with_max_csv_lines(cli.max_csv_lines)
        .with_compression(compression);
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_path(dir);
    }
    config.validate()?;
    Ok(config)
}

/// Walk the given roots and write the archive.
fn write_archive(cli: &Cli, cancel: &Cancellation) -> Result<()> {
    let config = report_config(cli)?;
    let archive = run_storage_report(&config, cancel).context("storage report failed")?;
    if cli.quiet == 0 {
        println!("{}", archive.display());
    }
    Ok(())
}

/// Zip the matching CSV files of the given directories, as-is or merged.
fn pack_csv(cli: &Cli, pattern: &str, merge: bool, cancel: &Cancellation) -> Result<()> {
    let config = report_config(cli)?;
    let archive = config.destination();
    let packer = CsvPacker::new(CsvSelection::new(config.paths.clone(), pattern)?)
        .with_compression(config.compression)
        .with_cancellation(cancel.clone());

    let packed = if merge {
        packer.concat(&archive)
    } else {
        packer.gather(&archive)
    };
    packed.with_context(|| format!("cannot pack CSV files into {}", archive.display()))?;

    if cli.quiet == 0 {
        println!("{}", archive.display());
    }
    Ok(())
}

/// Load an archive into one table and print a summary plus the first rows.
fn read_archive(cli: &Cli, archive: &std::path::Path, cancel: &Cancellation) -> Result<()> {
    let table = ArchiveExtractor::new()
        .with_cancellation(cancel.clone())
        .extract_and_concat(archive)
        .with_context(|| format!("cannot read {}", archive.display()))?;

    print!("{}", Summary::of(&table)?);

    let head = cli.head.min(table.num_rows());
    if head > 0 {
        println!("{}", pretty_format_batches(&[table.batch().slice(0, head)])?);
    }
    Ok(())
}
