use anyhow::Context;
use clap::{Parser, Subcommand};
use relic_core::geometry::presets;
use relic_core::{
    FileSystem, FilesystemRegistry, ImageConfig, ImageSource, RelicError, Resolver, Volume,
};
use relic_filesystems::{builtin_registry, families, family_summary, open_raw};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relic")]
#[command(about = "Identify and browse legacy disk images", long_about = None)]
struct Cli {
    /// More log output (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ImageArgs {
    /// JSON file with image interpretation settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Linear block size to try (repeatable, replaces the defaults)
    #[arg(long = "block-size")]
    block_sizes: Vec<usize>,
    /// Geometry preset to try even if the image size does not match
    #[arg(long = "geometry")]
    geometries: Vec<String>,
    /// Report unknown images instead of opening them as raw blocks
    #[arg(long)]
    no_fallback: bool,
}

impl ImageArgs {
    fn load(&self) -> anyhow::Result<ImageConfig> {
        let mut config = match &self.config {
            Some(path) => ImageConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => ImageConfig::default(),
        };
        if !self.block_sizes.is_empty() {
            config.block_sizes = self.block_sizes.clone();
        }
        config.geometries.extend(self.geometries.iter().cloned());
        if self.no_fallback {
            config.raw_fallback = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Determine the file system on one or more images
    Identify {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[command(flatten)]
        args: ImageArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the directory of an image
    Ls {
        image: PathBuf,
        #[command(flatten)]
        args: ImageArgs,
    },
    /// Hex dump one block of an image
    Block {
        image: PathBuf,
        index: u64,
        #[arg(long, default_value_t = 512)]
        block_size: usize,
    },
    /// List built-in geometry presets and file-system families
    Geometries,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("RELIC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn candidates(paths: &[PathBuf], config: &ImageConfig) -> anyhow::Result<Vec<Arc<dyn Volume>>> {
    let mut volumes = Vec::new();
    for path in paths {
        let source = ImageSource::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        volumes.extend(source.candidates(config)?);
    }
    Ok(volumes)
}

/// Identify and construct, falling back to raw access when allowed.
fn open(
    registry: &FilesystemRegistry,
    paths: &[PathBuf],
    config: &ImageConfig,
) -> anyhow::Result<Option<Box<dyn FileSystem>>> {
    let volumes = candidates(paths, config)?;
    match Resolver::new(registry).mount(&volumes) {
        Ok(fs) => Ok(Some(fs)),
        Err(RelicError::UnidentifiedVolume) => {
            eprintln!("type unknown");
            // the first image supplied, at its first interpretation
            match volumes.first() {
                Some(first) if config.raw_fallback => {
                    warn!("opening {} as raw blocks", first.source());
                    Ok(Some(open_raw(registry, Arc::clone(first))?))
                }
                _ => Ok(None),
            }
        }
        Err(RelicError::NotConstructible { kind, variant }) => {
            eprintln!("no browser for {} on {} volumes", kind, variant);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn describe(fs: &dyn FileSystem) -> serde_json::Value {
    let volume = fs.volume();
    serde_json::json!({
        "kind": fs.kind(),
        "label": fs.label(),
        "source": volume.source(),
        "variant": volume.variant().to_string(),
        "block_size": volume.block_size(),
        "block_count": volume.block_count(),
        "view": volume.info(),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = builtin_registry()?;
    debug!(probes = registry.probes().len(), "registry ready");

    match cli.command {
        Commands::Identify { images, args, json } => {
            let config = args.load()?;
            let Some(fs) = open(&registry, &images, &config)? else {
                std::process::exit(1);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&describe(fs.as_ref()))?);
            } else {
                let volume = fs.volume();
                println!("Type: {}", fs.kind());
                if let Some(label) = fs.label() {
                    println!("  Label: {}", label);
                }
                println!("  Source: {}", volume.source());
                println!("  Block size: {}", volume.block_size());
                println!("  Blocks: {}", volume.block_count());
                println!("  View: {}", volume.info());
            }
        }
        Commands::Ls { image, args } => {
            let config = args.load()?;
            let Some(fs) = open(&registry, &[image], &config)? else {
                std::process::exit(1);
            };
            let entries = fs.entries()?;
            if let Some(label) = fs.label() {
                println!("Volume: {}", label);
            }
            for entry in &entries {
                let start = entry.start_block.map_or_else(|| "-".to_string(), |b| b.to_string());
                println!(
                    "{:<20} {:<10} {:>6} {:>8}",
                    entry.name, entry.file_type, entry.size_blocks, start
                );
            }
            println!("{} entries", entries.len());
        }
        Commands::Block { image, index, block_size } => {
            let source = ImageSource::open(&image)
                .with_context(|| format!("opening {}", image.display()))?;
            let volume = source.linear(block_size)?;
            let block = volume.read_block(index)?;
            for (row, chunk) in block.as_slice().chunks(16).enumerate() {
                let ascii: String = chunk
                    .iter()
                    .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                    .collect();
                let address = block.offset() * block_size as u64 + row as u64 * 16;
                println!("{:08x}  {:<32}  {}", address, hex::encode(chunk), ascii);
            }
        }
        Commands::Geometries => {
            println!("Geometry presets:\n");
            for preset in presets() {
                println!("  {} - {}", preset.name, preset.description);
                println!(
                    "    {} sectors of {} bytes ({} bytes)",
                    preset.geometry.block_count(),
                    preset.sector_size,
                    preset.image_size()
                );
                if let Some(spec) = preset.interleave {
                    println!(
                        "    interleave {}:1, skew {}, from block {}",
                        spec.interleave, spec.skew, spec.start_block
                    );
                }
            }
            println!("\nFile-system families:\n");
            for family in families() {
                println!("{}\n", family_summary(&family));
            }
        }
    }

    Ok(())
}
