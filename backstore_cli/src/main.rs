use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backstore_core::mount::is_mounted;
use backstore_core::names::generate_name;
use backstore_core::{
    block_checksum, file_checksum, Executor, Pipeline, Reconciler, SystemMounter, Timeouts,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "backstore",
    about = "Compress and verify backup blocks, run bounded helper commands, reconcile backend mounts",
    version
)]
struct Cli {
    /// Default deadline for external commands, in seconds
    #[arg(long, global = true, default_value_t = 60)]
    cmd_timeout_secs: u64,
    /// Deadline for forced mount cleanup, in seconds
    #[arg(long, global = true, default_value_t = 30)]
    cleanup_timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file as a single block and print its block checksum
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination for the compressed block
        output: PathBuf,
        /// Compression method: none | gzip | zstd | lz4
        #[arg(short, long, default_value = "lz4")]
        method: String,
    },
    /// Decompress a block and verify it against its checksum
    Decompress {
        /// Compressed block
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
        /// Method the block was compressed with
        #[arg(short, long)]
        method: String,
        /// Block checksum recorded at compression time
        #[arg(short, long)]
        checksum: String,
    },
    /// Print the checksum of a file
    Checksum {
        file: PathBuf,
        /// Block checksum (truncated SHA-512) instead of the file checksum (SHA-256)
        #[arg(long)]
        block: bool,
    },
    /// Run a command under a deadline and print its combined output
    Exec {
        /// Override the default command timeout, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        binary: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Check that a directory carries a mount of the expected kind, cleaning it up otherwise
    MountCheck {
        /// Expected filesystem kind, matched as a substring (e.g. "nfs")
        kind: String,
        mount_dir: PathBuf,
    },
    /// List the supported compression methods
    Methods,
    /// Generate a backup object name
    Name { prefix: String },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn read_input(input: &Path) -> anyhow::Result<Vec<u8>> {
    let mut data = Vec::new();
    if input.to_str() == Some("-") {
        io::stdin().lock().read_to_end(&mut data)?;
    } else {
        File::open(input)
            .with_context(|| format!("opening input file {:?}", input))?
            .read_to_end(&mut data)?;
    }
    Ok(data)
}

fn open_output(output: &Path) -> anyhow::Result<Box<dyn Write>> {
    if output.to_str() == Some("-") {
        return Ok(Box::new(io::stdout()));
    }
    let file =
        File::create(output).with_context(|| format!("creating output file {:?}", output))?;
    Ok(Box::new(file))
}

fn throughput(bytes: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(input: PathBuf, output: PathBuf, method: &str) -> anyhow::Result<()> {
    let data = read_input(&input)?;
    let pipeline = Pipeline::new(backstore_codecs::registry());

    let t0 = Instant::now();
    let checksum = block_checksum(&data);
    let mut stream = pipeline.compress_data(method, &data)?;
    let mut dst = open_output(&output)?;
    let written = io::copy(&mut stream, &mut dst)?;
    dst.flush()?;
    let elapsed = t0.elapsed();

    eprintln!("  method      : {}", method);
    eprintln!("  raw size    : {}", human_bytes(data.len() as u64));
    eprintln!("  compressed  : {}", human_bytes(written));
    if written > 0 {
        eprintln!("  ratio       : {:.2}x", data.len() as f64 / written as f64);
    }
    eprintln!("  throughput  : {}", throughput(data.len(), elapsed));
    println!("{}", checksum);
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: PathBuf,
    method: &str,
    checksum: &str,
) -> anyhow::Result<()> {
    let src = File::open(&input).with_context(|| format!("opening block {:?}", input))?;
    let pipeline = Pipeline::new(backstore_codecs::registry());

    let t0 = Instant::now();
    let mut verified = pipeline
        .decompress_and_verify(method, src, checksum)
        .with_context(|| format!("reading block {:?}", input))?;
    let raw_len = verified.get_ref().len();
    let elapsed = t0.elapsed();

    let mut dst = open_output(&output)?;
    io::copy(&mut verified, &mut dst)?;
    dst.flush()?;

    eprintln!("  method      : {}", method);
    eprintln!("  raw size    : {}", human_bytes(raw_len as u64));
    eprintln!("  verified    : {}", checksum);
    eprintln!("  throughput  : {}", throughput(raw_len, elapsed));
    Ok(())
}

fn run_checksum(file: PathBuf, block: bool) -> anyhow::Result<()> {
    let sum = if block {
        let data = std::fs::read(&file).with_context(|| format!("reading {:?}", file))?;
        block_checksum(&data)
    } else {
        file_checksum(&file).with_context(|| format!("hashing {:?}", file))?
    };
    println!("{}  {}", sum, file.display());
    Ok(())
}

fn run_exec(
    executor: Executor,
    binary: &str,
    args: &[String],
    timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    let timeout = timeout_ms.map_or(executor.timeout(), Duration::from_millis);
    let t0 = Instant::now();
    let output = executor.run_with_timeout(binary, args, timeout)?;
    print!("{}", output);
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_mount_check(timeouts: &Timeouts, kind: &str, mount_dir: PathBuf) -> anyhow::Result<()> {
    let executor = Executor::from_timeouts(timeouts);
    let mounter = SystemMounter::new(executor);
    let reconciler = Reconciler::from_timeouts(timeouts);

    let listed = is_mounted(&executor, &mount_dir);
    let healthy = reconciler
        .check_and_cleanup(kind, &mount_dir, &mounter)
        .with_context(|| format!("checking mountpoint {:?}", mount_dir))?;

    eprintln!("  mount dir   : {}", mount_dir.display());
    eprintln!("  listed      : {}", listed);
    println!("{}", if healthy { "healthy" } else { "not mounted" });
    Ok(())
}

fn run_methods() {
    for name in backstore_codecs::registry().names() {
        println!("{}", name);
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let timeouts = Timeouts::new(
        Duration::from_secs(cli.cmd_timeout_secs),
        Duration::from_secs(cli.cleanup_timeout_secs),
    );
    tracing::debug!(?timeouts, "starting");

    match cli.command {
        Commands::Compress {
            input,
            output,
            method,
        } => run_compress(input, output, &method),
        Commands::Decompress {
            input,
            output,
            method,
            checksum,
        } => run_decompress(input, output, &method, &checksum),
        Commands::Checksum { file, block } => run_checksum(file, block),
        Commands::Exec {
            timeout_ms,
            binary,
            args,
        } => run_exec(Executor::from_timeouts(&timeouts), &binary, &args, timeout_ms),
        Commands::MountCheck { kind, mount_dir } => run_mount_check(&timeouts, &kind, mount_dir),
        Commands::Methods => {
            run_methods();
            Ok(())
        }
        Commands::Name { prefix } => {
            println!("{}", generate_name(&prefix));
            Ok(())
        }
    }
}
