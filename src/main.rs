use carlot::imaging::{ImageFile, RustCodec, normalize_all};
use carlot::listing::{self, Listing};
use carlot::store::FsStore;
use carlot::upload::{self, UploadRequest};
use carlot::{config, naming, output};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "carlot")]
#[command(about = "Normalize and store car listing photos")]
#[command(long_about = "\
Normalize and store car listing photos

Every photo is re-encoded until its size falls inside a fixed band
(50-100 KB by default). Photos already inside the band are kept as-is.
Re-encoded photos are JPEG.

Object keys:

  {key_prefix}/{owner}/{stamp}-{index}-{hash8}-{stem}.jpg
  cars/user-42/1700000000-00-9f86d081-front.jpg

Logging goes to stderr. Use -v / -vv for more, or set RUST_LOG.

Run 'carlot gen-config' to generate a documented carlot.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "carlot.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that touch the object store.
#[derive(clap::Args, Clone)]
struct StoreArgs {
    /// Root directory of the object store
    #[arg(long)]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize local photos into the size band and write them to a directory
    Compress {
        /// Files or directories to compress
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "compressed")]
        out_dir: PathBuf,
    },
    /// Normalize photos and upload them under an owner's prefix
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        store: StoreArgs,
        /// Owner user id
        #[arg(long)]
        owner: String,
        /// Batch stamp for object keys (default: seconds since the epoch)
        #[arg(long)]
        stamp: Option<u64>,
    },
    /// Delete every stored image a listing document references
    DeleteListing {
        /// Listing document (JSON)
        document: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        /// Listing id (default: the document's "id" field, then the file stem)
        #[arg(long)]
        id: Option<String>,
    },
    /// List (or delete) stored images no listing references
    Orphans {
        /// Listing export: JSON object of id → document, or array of documents with "id"
        listings: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        /// Owner user id
        #[arg(long)]
        owner: String,
        /// Delete the orphans instead of listing them
        #[arg(long)]
        delete: bool,
    },
    /// Print a stock carlot.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let app_config = config::load_config(&cli.config)?;
    debug!(config = %cli.config.display(), "configuration loaded");
    init_thread_pool(&app_config.processing);

    match cli.command {
        Command::Compress { inputs, out_dir } => {
            let (relative, files): (Vec<String>, Vec<ImageFile>) =
                read_inputs(&inputs)?.into_iter().unzip();
            std::fs::create_dir_all(&out_dir)?;
            let results =
                normalize_all(&RustCodec::new(), &files, &app_config.normalize_config());

            let written: Vec<(&str, &str)> = relative
                .iter()
                .zip(&results)
                .filter_map(|(rel, result)| {
                    let normalized = result.as_ref().ok()?;
                    Some((rel.as_str(), normalized.file.name.as_str()))
                })
                .collect();
            // One path per successful result, in order.
            let mut out_paths = naming::output_paths(&written).into_iter();

            let mut failed = 0;
            let entries = relative.iter().zip(&files).zip(&results);
            for (index, ((rel, input), result)) in entries.enumerate() {
                match result {
                    Ok(normalized) => {
                        let Some(out_rel) = out_paths.next() else {
                            break;
                        };
                        let out_path = out_rel.split('/').fold(out_dir.clone(), |p, s| p.join(s));
                        if let Some(parent) = out_path.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::write(&out_path, &normalized.file.bytes)?;
                        debug!(path = %out_path.display(), "written");
                        output::print_normalize_result(
                            index,
                            rel,
                            input.size(),
                            &out_rel,
                            normalized,
                        );
                    }
                    Err(e) => {
                        failed += 1;
                        println!("{} skipped: {}", rel, e);
                    }
                }
            }
            if failed > 0 {
                return Err(
                    format!("{} of {} files could not be compressed", failed, files.len()).into(),
                );
            }
        }
        Command::Upload {
            inputs,
            store,
            owner,
            stamp,
        } => {
            let files: Vec<ImageFile> =
                read_inputs(&inputs)?.into_iter().map(|(_, file)| file).collect();
            let store = FsStore::new(store.store);
            let request = UploadRequest {
                owner_uid: owner,
                batch_stamp: stamp.unwrap_or_else(unix_now),
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_upload_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = upload::upload_images(
                &RustCodec::new(),
                &store,
                &files,
                &request,
                &app_config,
                Some(tx),
            );
            printer.join().map_err(|_| "progress printer panicked")?;
            let report = result?;
            output::print_upload_report(&report);
            if !report.is_complete() {
                return Err(format!("{} uploads failed", report.failures.len()).into());
            }
        }
        Command::DeleteListing {
            document,
            store,
            id,
        } => {
            let text = std::fs::read_to_string(&document)?;
            let value: serde_json::Value = serde_json::from_str(&text)?;
            let id = id
                .or_else(|| value.get("id").and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| file_stem(&document));
            let listing = Listing::from_document(&id, value)?;
            info!(
                listing = %listing.id,
                images = listing.image_keys().len(),
                "deleting listing images"
            );

            let report = upload::delete_listing_images(&FsStore::new(store.store), &listing);
            output::print_delete_report(&report);
            if !report.is_complete() {
                return Err(format!("{} deletes failed", report.failures.len()).into());
            }
        }
        Command::Orphans {
            listings,
            store,
            owner,
            delete,
        } => {
            let text = std::fs::read_to_string(&listings)?;
            let listings = listing::listings_from_json(&text)?;
            let store = FsStore::new(store.store);
            let prefix = &app_config.upload.key_prefix;

            if delete {
                let report = upload::cleanup_orphans(&store, prefix, &owner, &listings)?;
                output::print_delete_report(&report);
                if !report.is_complete() {
                    return Err(format!("{} deletes failed", report.failures.len()).into());
                }
            } else {
                let orphans = upload::find_orphans(&store, prefix, &owner, &listings)?;
                output::print_orphans(&orphans);
            }
        }
        // Printed before the config was loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Expand directories (recursively, sorted) and read every file.
///
/// Each file comes with its `/`-separated path relative to the directory it
/// was found in; plain file arguments are relative to their own directory.
fn read_inputs(
    inputs: &[PathBuf],
) -> Result<Vec<(String, ImageFile)>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            paths.extend(found.into_iter().map(|path| (input.clone(), path)));
        } else {
            let base = input.parent().map(Path::to_path_buf).unwrap_or_default();
            paths.push((base, input.clone()));
        }
    }
    let mut files = Vec::with_capacity(paths.len());
    for (base, path) in &paths {
        let relative = path.strip_prefix(base).unwrap_or(path);
        let relative: Vec<String> = relative
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        files.push((relative.join("/"), ImageFile::from_path(path)?));
    }
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
