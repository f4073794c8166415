// Command-line front end for .wrap archives.
//
// Subcommands cover packing a directory, creating an empty archive, adding
// single files, listing, header info and extraction.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::builder::TypedValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::compression::CompressionLevel;
use crate::pack::{PackOptions, PackReport, pack_directory};
use crate::wrap::{ENTRY_SIZE, HEADER_SIZE, WRAP_EXTENSION, WRAP_VERSION, Wrap};

const DEFAULT_LEVEL: u8 = 6;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// WRAP asset archive tool.
#[derive(Parser, Debug)]
#[command(
    name = "wrapfile",
    version,
    about = "Pack, inspect and extract .wrap asset archives",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output reports as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Pack every file under a directory into a new archive.
    Pack(PackArgs),
    /// Create an empty archive with a fixed number of entries.
    Create(CreateArgs),
    /// Add (or replace) one file in an existing archive.
    Add(AddArgs),
    /// List the entries of an archive.
    List(ArchiveArgs),
    /// Print the archive header.
    Info(ArchiveArgs),
    /// Extract one entry.
    Extract(ExtractArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct LevelArgs {
    /// Compression level (0 stores verbatim, 9 is smallest).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u8).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u8,

    /// Reserved slot size per entry in bytes (0 = exactly the stored size).
    #[arg(long, default_value_t = 0)]
    reserve: u32,
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Directory to pack.
    #[arg(value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    /// Output archive (default: `<name>.wrap` next to the directory).
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Archive name (default: directory name).
    #[arg(long, short = 'n')]
    name: Option<String>,

    /// Base virtual path shared by all entries (default: the directory path).
    #[arg(long, short = 'b')]
    base: Option<PathBuf>,

    /// Content version number.
    #[arg(long = "content-version", default_value_t = 0)]
    content_version: u32,

    #[command(flatten)]
    tuning: LevelArgs,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Archive to create (replaced if it exists).
    #[arg(value_hint = ValueHint::FilePath)]
    archive: PathBuf,

    /// Number of entry rows.
    #[arg(long, short = 'e')]
    entries: u32,

    /// Archive name (default: file stem).
    #[arg(long, short = 'n')]
    name: Option<String>,

    /// Base virtual path.
    #[arg(long, short = 'b', default_value = "", value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from))]
    base: PathBuf,

    /// Content version number.
    #[arg(long = "content-version", default_value_t = 0)]
    content_version: u32,
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Archive to modify.
    #[arg(value_hint = ValueHint::FilePath)]
    archive: PathBuf,

    /// File to add.
    #[arg(value_hint = ValueHint::FilePath)]
    file: PathBuf,

    /// Virtual path to store the file under (default: the file path).
    #[arg(long = "as")]
    virtual_path: Option<PathBuf>,

    #[command(flatten)]
    tuning: LevelArgs,
}

#[derive(Args, Debug)]
struct ArchiveArgs {
    /// Archive to read.
    #[arg(value_hint = ValueHint::FilePath)]
    archive: PathBuf,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Archive to read.
    #[arg(value_hint = ValueHint::FilePath)]
    archive: PathBuf,

    /// Virtual path of the entry.
    entry: PathBuf,

    /// Output file (default: stdout).
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Command {
    Pack {
        dir: PathBuf,
        output: Option<PathBuf>,
        pack: PackOptions,
    },
    Create {
        archive: PathBuf,
        name: String,
        entries: u32,
        base: PathBuf,
        content_version: u32,
    },
    Add {
        archive: PathBuf,
        file: PathBuf,
        virtual_path: PathBuf,
        level: CompressionLevel,
        reserve: u32,
    },
    List(PathBuf),
    Info(PathBuf),
    Extract {
        archive: PathBuf,
        entry: PathBuf,
        output: Option<PathBuf>,
    },
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

fn level(value: u8) -> CompressionLevel {
    CompressionLevel::new(value).unwrap_or_default()
}

fn resolve_options(cli: Cli) -> Options {
    let command = match cli.command {
        Cmd::Pack(args) => Command::Pack {
            dir: args.dir,
            output: args.output,
            pack: PackOptions {
                name: args.name,
                base_path: args.base,
                content_version: args.content_version,
                level: level(args.tuning.level),
                reserve: args.tuning.reserve,
            },
        },
        Cmd::Create(args) => {
            let name = args.name.unwrap_or_else(|| {
                args.archive
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            Command::Create {
                archive: args.archive,
                name,
                entries: args.entries,
                base: args.base,
                content_version: args.content_version,
            }
        }
        Cmd::Add(args) => Command::Add {
            virtual_path: args.virtual_path.unwrap_or_else(|| args.file.clone()),
            archive: args.archive,
            file: args.file,
            level: level(args.tuning.level),
            reserve: args.tuning.reserve,
        },
        Cmd::List(args) => Command::List(args.archive),
        Cmd::Info(args) => Command::Info(args.archive),
        Cmd::Extract(args) => Command::Extract {
            archive: args.archive,
            entry: args.entry,
            output: args.output,
        },
        Cmd::Config => Command::Config,
    };

    Options {
        command,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("wrapfile".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn log_filter(opts: &Options) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => eprintln!("{text}"),
        Err(e) => eprintln!("wrapfile: json error: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("wrapfile version {version} (Rust)");

    let ptr_size = std::mem::size_of::<*const ()>();
    eprintln!("WRAP_VERSION={WRAP_VERSION}");
    eprintln!("WRAP_EXTENSION={WRAP_EXTENSION}");
    eprintln!("HEADER_SIZE={HEADER_SIZE}");
    eprintln!("ENTRY_SIZE={ENTRY_SIZE}");
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Pack command
// ---------------------------------------------------------------------------

fn print_pack_report(report: &PackReport) {
    let stats = [
        ("File: ", report.file.display().to_string()),
        ("Name: ", report.name.clone()),
        (
            "Time Elapsed: ",
            format!("{:.3}s", report.elapsed.as_secs_f64()),
        ),
        ("Version: ", report.content_version.to_string()),
        ("Entry Count: ", report.entry_count.to_string()),
        ("Base Path: ", report.base_path.clone()),
        ("Compression Level: ", report.level.to_string()),
        (
            "Compression Percent: ",
            format!("{:.2}%", report.compression_percent()),
        ),
        ("Compressed Size: ", format!("{}b", report.compressed_size)),
        ("Uncompressed Size: ", format!("{}b", report.uncompressed_size)),
    ];

    let width = stats
        .iter()
        .map(|(left, right)| left.len() + right.len())
        .max()
        .unwrap_or(0)
        .max(20);

    println!("{}", "=".repeat(width + 1));
    for (left, right) in &stats {
        let dots = width - left.len() - right.len();
        println!("{left}{}{right}", ".".repeat(dots + 1));
    }
    println!("{}", "=".repeat(width + 1));
}

fn cmd_pack(opts: &Options) -> i32 {
    let Command::Pack { dir, output, pack } = &opts.command else {
        return 1;
    };

    let report = match pack_directory(dir, pack, output.as_deref()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("wrapfile: pack {}: {e}", dir.display());
            return 1;
        }
    };

    if !opts.quiet {
        print_pack_report(&report);
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "pack",
            "file": report.file.display().to_string(),
            "name": report.name,
            "elapsed_s": report.elapsed.as_secs_f64(),
            "content_version": report.content_version,
            "entry_count": report.entry_count,
            "base_path": report.base_path,
            "level": report.level.get(),
            "compression_percent": report.compression_percent(),
            "compressed_size": report.compressed_size,
            "uncompressed_size": report.uncompressed_size,
            "skipped": report.skipped.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Create / add commands
// ---------------------------------------------------------------------------

fn cmd_create(opts: &Options) -> i32 {
    let Command::Create {
        archive,
        name,
        entries,
        base,
        content_version,
    } = &opts.command
    else {
        return 1;
    };

    if let Err(e) = Wrap::create(archive, name, *entries, base, *content_version) {
        eprintln!("wrapfile: create {}: {e}", archive.display());
        return 1;
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "create",
            "file": archive.display().to_string(),
            "name": name,
            "entry_count": entries,
        }));
    }

    0
}

fn cmd_add(opts: &Options) -> i32 {
    let Command::Add {
        archive,
        file,
        virtual_path,
        level,
        reserve,
    } = &opts.command
    else {
        return 1;
    };

    let mut wrap = match Wrap::load(archive) {
        Ok(wrap) => wrap,
        Err(e) => {
            eprintln!("wrapfile: {}: {e}", archive.display());
            return 1;
        }
    };

    let index = match wrap.emplace(file, virtual_path, *level, *reserve) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("wrapfile: add {}: {e}", file.display());
            return 1;
        }
    };

    let Some(entry) = wrap.entry(index as usize) else {
        return 1;
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "wrapfile: added {} as row {index}: {} -> {} bytes at offset {}",
            entry.path, entry.uncompressed_size, entry.compressed_size, entry.offset
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "add",
            "index": index,
            "path": entry.path,
            "level": entry.compression_level,
            "reserved_size": entry.reserved_size,
            "compressed_size": entry.compressed_size,
            "uncompressed_size": entry.uncompressed_size,
            "offset": entry.offset,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// List / info commands
// ---------------------------------------------------------------------------

fn load_or_report(archive: &Path) -> Option<Wrap> {
    match Wrap::load(archive) {
        Ok(wrap) => Some(wrap),
        Err(e) => {
            eprintln!("wrapfile: {}: {e}", archive.display());
            None
        }
    }
}

fn cmd_list(opts: &Options) -> i32 {
    let Command::List(archive) = &opts.command else {
        return 1;
    };
    let Some(wrap) = load_or_report(archive) else {
        return 1;
    };

    if !opts.quiet {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for (index, entry) in wrap.entries().iter().enumerate() {
            if entry.is_empty() {
                if opts.verbose > 0 {
                    let _ = writeln!(
                        out,
                        "{index:>5}  <free>  reserved {} at {}",
                        entry.reserved_size, entry.offset
                    );
                }
                continue;
            }
            let _ = writeln!(
                out,
                "{index:>5}  {:>10}  {:>10}  L{}  {}",
                entry.uncompressed_size, entry.compressed_size, entry.compression_level, entry.path
            );
        }
    }

    if opts.json_output {
        let entries: Vec<_> = wrap
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(index, entry)| {
                serde_json::json!({
                    "index": index,
                    "path": entry.path,
                    "level": entry.compression_level,
                    "reserved_size": entry.reserved_size,
                    "compressed_size": entry.compressed_size,
                    "uncompressed_size": entry.uncompressed_size,
                    "offset": entry.offset,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "command": "list",
            "entries": entries,
        }));
    }

    0
}

fn cmd_info(opts: &Options) -> i32 {
    let Command::Info(archive) = &opts.command else {
        return 1;
    };
    let Some(wrap) = load_or_report(archive) else {
        return 1;
    };

    let size = match wrap.size() {
        Ok(size) => size,
        Err(e) => {
            eprintln!("wrapfile: {}: {e}", archive.display());
            return 1;
        }
    };

    if !opts.quiet {
        println!("File: {}", archive.display());
        println!("Name: {}", wrap.name());
        println!("Type: {:?}", wrap.wrap_type());
        println!("Wrap Version: {}", wrap.wrap_version());
        println!("Content Version: {}", wrap.content_version());
        println!("Base Path: {}", wrap.base_path());
        println!("Entry Count: {}", wrap.entry_count());
        println!("Free Entries: {}", wrap.free_count());
        println!("Size: {size}b");
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "info",
            "file": archive.display().to_string(),
            "name": wrap.name(),
            "type": wrap.wrap_type().to_u16(),
            "wrap_version": wrap.wrap_version(),
            "content_version": wrap.content_version(),
            "base_path": wrap.base_path(),
            "entry_count": wrap.entry_count(),
            "free_count": wrap.free_count(),
            "size": size,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Extract command
// ---------------------------------------------------------------------------

fn cmd_extract(opts: &Options) -> i32 {
    let Command::Extract {
        archive,
        entry,
        output,
    } = &opts.command
    else {
        return 1;
    };
    let Some(wrap) = load_or_report(archive) else {
        return 1;
    };

    let data = match wrap.read(entry) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("wrapfile: extract {}: {e}", entry.display());
            return 1;
        }
    };

    let written = match output {
        Some(path) => std::fs::write(path, &data),
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            out.write_all(&data).and_then(|_| out.flush())
        }
    };
    if let Err(e) = written {
        eprintln!("wrapfile: write error: {e}");
        return 1;
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "extract",
            "path": entry.display().to_string(),
            "size": data.len(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&opts)))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Pack { .. } => cmd_pack(&opts),
        Command::Create { .. } => cmd_create(&opts),
        Command::Add { .. } => cmd_add(&opts),
        Command::List(_) => cmd_list(&opts),
        Command::Info(_) => cmd_info(&opts),
        Command::Extract { .. } => cmd_extract(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
