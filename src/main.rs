//! SCS CLI - Command-line tool for SCS trucking-simulation game files.
//!
//! Inputs are read from the filesystem, or from one or more `.scs` packages
//! when `--archive` is given (later packages override earlier ones).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use scs::hashfs::list_files;
use scs::prelude::*;
use scs::sii::{materialize, IncludeCollector};

/// SCS - trucking-simulation game file extraction tool
#[derive(Parser)]
#[command(name = "scs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Packages {
    /// Package files or directories of `.scs` files, base game first
    #[arg(short, long = "archive", env = "SCS_ARCHIVES", value_delimiter = ',')]
    archives: Vec<PathBuf>,
}

#[derive(Args)]
struct Input {
    /// File path, inside the packages when `--archive` is given
    input: String,

    #[command(flatten)]
    packages: Packages,
}

#[derive(Subcommand)]
enum Commands {
    /// List files in one or more packages
    List {
        #[command(flatten)]
        packages: Packages,

        /// Directory to start from
        #[arg(short, long, default_value = "")]
        root: String,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show sizes and compression
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract files from one or more packages
    Extract {
        #[command(flatten)]
        packages: Packages,

        /// Output directory
        #[arg(short, long, env = "SCS_OUTPUT")]
        output: PathBuf,

        /// Directory to start from
        #[arg(short, long, default_value = "")]
        root: String,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Parse an SII file and print it as JSON
    Sii {
        #[command(flatten)]
        input: Input,

        /// Decode as a typed record instead of the raw tree
        #[arg(long, value_enum)]
        record: Option<RecordKind>,

        /// Print the resolved `@include` targets instead
        #[arg(long)]
        includes: bool,
    },

    /// Decode a prefab description (`.ppd`) to JSON
    Prefab {
        #[command(flatten)]
        input: Input,
    },

    /// Print the bounds of a model (`.pmg`) as JSON
    Model {
        #[command(flatten)]
        input: Input,
    },

    /// Summarize sector files (`.base`), or a directory of them
    Sector {
        /// Sector file or directory
        input: PathBuf,

        /// Print every sector as JSON instead of item counts
        #[arg(long)]
        json: bool,
    },

    /// Convert a DDS texture to PNG
    Texture {
        #[command(flatten)]
        input: Input,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RecordKind {
    City,
    Country,
    Company,
    Ferry,
    PrefabModel,
    Localization,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::List {
            packages,
            root,
            filter,
            detailed,
        } => cmd_list(&packages, &root, filter.as_deref(), detailed)?,
        Commands::Extract {
            packages,
            output,
            root,
            filter,
        } => cmd_extract(&packages, &output, &root, filter.as_deref())?,
        Commands::Sii {
            input,
            record,
            includes,
        } => cmd_sii(&input, record, includes)?,
        Commands::Prefab { input } => cmd_prefab(&input)?,
        Commands::Model { input } => cmd_model(&input)?,
        Commands::Sector { input, json } => cmd_sector(&input, json)?,
        Commands::Texture { input, output } => cmd_texture(&input, &output)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Expand directories into the `.scs` files they contain, sorted by path.
fn package_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if !path.is_dir() {
            out.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for ent in WalkDir::new(path).follow_links(false).max_depth(1) {
            let ent = ent.with_context(|| format!("Failed to list {}", path.display()))?;
            if ent.file_type().is_file()
                && ent.path().extension().and_then(|e| e.to_str()) == Some("scs")
            {
                found.push(ent.into_path());
            }
        }
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

fn open_packages(packages: &Packages) -> Result<CompositeEntries> {
    let paths = package_paths(&packages.archives)?;
    if paths.is_empty() {
        bail!("No packages given (use --archive or SCS_ARCHIVES)");
    }

    let start = Instant::now();
    let archives = paths
        .iter()
        .map(|p| HashFsArchive::open(p).with_context(|| format!("Failed to open {}", p.display())))
        .collect::<Result<Vec<_>>>()?;

    let mut diagnostics = Diagnostics::new();
    let composite =
        CompositeEntries::new(archives, &mut diagnostics).context("Failed to read package entries")?;
    report(&diagnostics);
    tracing::info!(
        packages = composite.archives().len(),
        elapsed = ?start.elapsed(),
        "opened packages"
    );
    Ok(composite)
}

fn read_input(input: &Input) -> Result<Vec<u8>> {
    if input.packages.archives.is_empty() {
        return fs::read(&input.input).with_context(|| format!("Failed to read {}", input.input));
    }
    let composite = open_packages(&input.packages)?;
    let path = input.input.trim_start_matches('/');
    let data = composite
        .files()
        .get(path)
        .with_context(|| format!("{path} not found in packages"))?
        .read()
        .with_context(|| format!("Failed to read {path}"))?;
    composite.dispose();
    Ok(data)
}

fn filtered_paths(composite: &CompositeEntries, root: &str, filter: Option<&str>) -> Result<Vec<String>> {
    let pattern = filter
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid glob pattern")?;
    Ok(list_files(composite, root)
        .into_iter()
        .filter(|path| pattern.as_ref().map_or(true, |p| p.matches(path)))
        .collect())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Warnings were already logged as they happened; this only totals them.
fn report(diagnostics: &Diagnostics) {
    let warnings = diagnostics.warnings().count();
    if warnings > 0 {
        tracing::info!(warnings, "finished with warnings");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize")?);
    Ok(())
}

fn cmd_list(packages: &Packages, root: &str, filter: Option<&str>, detailed: bool) -> Result<()> {
    let composite = open_packages(packages)?;
    let paths = filtered_paths(&composite, root, filter)?;

    for path in &paths {
        if detailed {
            if let Some(file) = composite.files().get(path) {
                println!(
                    "{:>12} {:>12} {:>8} {}",
                    file.compressed_size(),
                    file.size(),
                    file.compression(),
                    path
                );
            }
        } else {
            println!("{path}");
        }
    }

    println!("\nTotal: {} files", paths.len());
    composite.dispose();
    Ok(())
}

fn cmd_extract(packages: &Packages, output: &Path, root: &str, filter: Option<&str>) -> Result<()> {
    let composite = open_packages(packages)?;
    let paths = filtered_paths(&composite, root, filter)?;

    println!("Extracting {} files...", paths.len());
    fs::create_dir_all(output)?;

    let pb = progress_bar(paths.len())?;
    let start = Instant::now();
    let mut errors = 0;

    for path in &paths {
        let Some(file) = composite.files().get(path) else {
            pb.inc(1);
            continue;
        };
        let output_path = output.join(path);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        match file.read() {
            Ok(data) => fs::write(&output_path, data)
                .with_context(|| format!("Failed to write {}", output_path.display()))?,
            Err(e) => {
                pb.suspend(|| eprintln!("Error extracting {path}: {e}"));
                errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?} ({errors} errors)", start.elapsed());
    composite.dispose();

    if errors > 0 {
        bail!("{errors} files could not be extracted");
    }
    Ok(())
}

fn print_records<T: SiiRecord + Serialize>(
    bytes: &[u8],
    name: &str,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let records = decode_records::<T>(bytes, diagnostics)
        .with_context(|| format!("Failed to decode {name} as {}", T::CLASS))?;
    print_json(&records)
}

fn cmd_sii(input: &Input, record: Option<RecordKind>, includes: bool) -> Result<()> {
    let bytes = read_input(input)?;
    let mut diagnostics = Diagnostics::new();

    if let Some(kind) = record {
        let name = input.input.as_str();
        match kind {
            RecordKind::City => print_records::<CityData>(&bytes, name, &mut diagnostics)?,
            RecordKind::Country => print_records::<CountryData>(&bytes, name, &mut diagnostics)?,
            RecordKind::Company => {
                print_records::<CompanyPermanent>(&bytes, name, &mut diagnostics)?
            }
            RecordKind::Ferry => print_records::<FerryData>(&bytes, name, &mut diagnostics)?,
            RecordKind::PrefabModel => {
                print_records::<PrefabModel>(&bytes, name, &mut diagnostics)?
            }
            RecordKind::Localization => {
                print_records::<LocalizationDb>(&bytes, name, &mut diagnostics)?
            }
        }
    } else {
        let text = scs::sii::decode_text(&bytes)?;
        let tree = parse_sii(&text)
            .into_result()
            .with_context(|| format!("Failed to parse {}", input.input))?;
        if includes {
            let base = input.input.rsplit_once('/').map_or("", |(dir, _)| dir);
            for path in IncludeCollector::new(base).collect(&tree) {
                println!("{path}");
            }
        } else {
            print_json(&materialize(&tree, &mut diagnostics))?;
        }
    }

    report(&diagnostics);
    Ok(())
}

fn cmd_prefab(input: &Input) -> Result<()> {
    let data = read_input(input)?;
    let mut diagnostics = Diagnostics::new();
    let prefab = PrefabDescription::parse(&data, &mut diagnostics)
        .with_context(|| format!("Failed to decode prefab {}", input.input))?;
    print_json(&prefab)?;
    report(&diagnostics);
    Ok(())
}

fn cmd_model(input: &Input) -> Result<()> {
    let data = read_input(input)?;
    let bounds = ModelBounds::parse(&data)
        .with_context(|| format!("Failed to decode model {}", input.input))?;
    print_json(&bounds)
}

fn cmd_sector(input: &Path, json: bool) -> Result<()> {
    let mut files = Vec::new();
    if input.is_dir() {
        for ent in WalkDir::new(input).follow_links(false).sort_by_file_name() {
            let ent = ent.with_context(|| format!("Failed to list {}", input.display()))?;
            if ent.file_type().is_file()
                && ent.path().extension().and_then(|e| e.to_str()) == Some("base")
            {
                files.push(ent.into_path());
            }
        }
    } else {
        files.push(input.to_path_buf());
    }

    let start = Instant::now();
    let mut counts = vec![0usize; scs::formats::ItemKind::ALL.len()];
    for path in &files {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let sector = Sector::parse(&data)
            .with_context(|| format!("Failed to decode sector {}", path.display()))?;
        if json {
            print_json(&sector)?;
            continue;
        }
        for (i, kind) in scs::formats::ItemKind::ALL.iter().enumerate() {
            counts[i] += sector.items_of(*kind).count();
        }
    }

    if !json {
        for (kind, count) in scs::formats::ItemKind::ALL.iter().zip(&counts) {
            if *count > 0 {
                println!("{:>8} {}", count, kind.name());
            }
        }
        println!(
            "\nDecoded {} sectors in {:?}",
            files.len(),
            start.elapsed()
        );
    }
    Ok(())
}

fn cmd_texture(input: &Input, output: &Path) -> Result<()> {
    let data = read_input(input)?;
    let texture = Texture::decode(&data)
        .with_context(|| format!("Failed to decode texture {}", input.input))?;
    let image = image::RgbaImage::from_raw(texture.width, texture.height, texture.rgba)
        .context("Decoded pixels do not match the texture size")?;
    image
        .save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "{}x{} ({:?}) -> {}",
        texture.width,
        texture.height,
        texture.source,
        output.display()
    );
    Ok(())
}
