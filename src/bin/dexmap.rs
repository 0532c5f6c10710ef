//! dexmap
//!
//! Inspect, rewrite and verify dex files

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dexfile::{integrity, read_dex, DexFile, DexOptions, MapEntry, SectionStats};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dexmap")]
#[command(about = "Inspect, rewrite and verify Dalvik executable files")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the header and map directory
    Info {
        file: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Read, re-place and write a file
    Rewrite {
        input: PathBuf,
        output: PathBuf,

        /// Keep every item in its original order
        #[arg(long)]
        in_place: bool,

        /// Sort data sections into canonical order
        #[arg(long)]
        canonical: bool,

        /// Write all debug-info registers as unsigned LEB128
        #[arg(long)]
        normalize_registers: bool,

        /// TOML file with read and layout options; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check the stored checksum and signature
    Verify { file: PathBuf },
}

#[derive(Serialize)]
struct Report {
    version: String,
    file_size: u32,
    checksum: String,
    signature: String,
    map: Vec<MapEntry>,
    sections: Vec<SectionStats>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn info(file: PathBuf, json: bool) -> Result<()> {
    let dex = DexFile::open(&file, &DexOptions::default())
        .with_context(|| format!("failed to read {}", file.display()))?;
    let header = dex.header_item();
    let report = Report {
        version: header.version(),
        file_size: header.file_size,
        checksum: format!("{:#010x}", header.checksum),
        signature: hex(&header.signature),
        map: dex.map_entries(),
        sections: dex.section_stats(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", file.display());
    println!("  version    {}", report.version);
    println!("  file size  {}", report.file_size);
    println!("  checksum   {}", report.checksum);
    println!("  signature  {}", report.signature);
    println!();
    println!("  {:<28} {:>8} {:>10}", "kind", "count", "offset");
    for entry in &report.map {
        println!(
            "  {:<28} {:>8} {:>#10x}",
            entry.kind.name(),
            entry.count,
            entry.offset
        );
    }
    Ok(())
}

fn rewrite(
    input: PathBuf,
    output: PathBuf,
    in_place: bool,
    canonical: bool,
    normalize_registers: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut options = match &config {
        Some(path) => DexOptions::load(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => DexOptions::default(),
    };
    if in_place {
        options.in_place = true;
    }
    if canonical {
        options.sort_all_items = true;
    }
    if normalize_registers {
        options.preserve_signed_registers = false;
    }
    info!("Rewriting {:?} -> {:?} with {:?}", input, output, options);

    let mut dex = DexFile::open(&input, &options)
        .with_context(|| format!("failed to read {}", input.display()))?;
    dex.save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!("Wrote {} bytes", dex.header_item().file_size);
    Ok(())
}

fn verify(file: PathBuf) -> Result<()> {
    let bytes = read_dex(&file).with_context(|| format!("failed to read {}", file.display()))?;
    if let Err(err) = integrity::verify(&bytes) {
        bail!("{}: {}", file.display(), err);
    }
    println!("{}: ok", file.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Info { file, json } => info(file, json),
        Command::Rewrite {
            input,
            output,
            in_place,
            canonical,
            normalize_registers,
            config,
        } => rewrite(input, output, in_place, canonical, normalize_registers, config),
        Command::Verify { file } => verify(file),
    }
}
