use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};

use flowc::pipeline::{self, Emit, Syntax};
use flowc::registry::Registry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_TEMPLATES: &str = "templates";

#[derive(Parser, Debug)]
#[command(
    name = "flowc",
    version,
    about = "flowc — converts node-graph workflows between code, staged-call, markdown and JSON forms"
)]
struct Cli {
    /// Input source file, or `-` for stdin
    source: PathBuf,

    /// Input syntax (default: inferred from the file extension)
    #[arg(long, value_enum)]
    from: Option<Syntax>,

    /// Output form
    #[arg(long, value_enum, default_value_t = Emit::Workflow)]
    emit: Emit,

    /// Template file or directory (repeatable)
    #[arg(long = "templates", env = "FLOWC_TEMPLATES", value_delimiter = ':')]
    templates: Vec<PathBuf>,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log compiler phases at debug level
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("flowc=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .try_init();
}

fn infer_syntax(path: &Path) -> Syntax {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") => Syntax::Markdown,
        Some("json") => Syntax::Workflow,
        _ => Syntax::Sequential,
    }
}

fn load_registry(paths: &[PathBuf]) -> Result<Registry, flowc::registry::RegistryError> {
    let mut registry = Registry::new();
    let default = [PathBuf::from(DEFAULT_TEMPLATES)];
    let paths = if paths.is_empty() && default[0].is_dir() {
        &default[..]
    } else {
        paths
    };
    for path in paths {
        if path.is_dir() {
            let n = registry.load_dir(path)?;
            tracing::debug!(count = n, dir = %path.display(), "Loaded templates");
        } else {
            registry.load_file(path)?;
        }
    }
    Ok(registry)
}

fn read_source(path: &Path) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path)
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // ── Load template registry ──
    let registry = match load_registry(&cli.templates) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("flowc: error: {e}");
            std::process::exit(2);
        }
    };
    tracing::debug!(templates = registry.len(), "Registry ready");

    // ── Read and compile source ──
    let source = match read_source(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("flowc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };
    let syntax = cli.from.unwrap_or_else(|| infer_syntax(&cli.source));

    let output = match pipeline::convert(&source, syntax, cli.emit, &registry) {
        Ok(text) => text,
        Err(diag) => {
            eprintln!("flowc: {diag}");
            std::process::exit(1);
        }
    };

    // ── Write result ──
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, output) {
                eprintln!("flowc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{output}"),
    }
}
