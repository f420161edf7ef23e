//! Server implementation

#![warn(missing_docs)]

mod http;

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;

use eyre::{eyre, WrapErr};
use serde::Deserialize;
use tracing::{error, info, warn};
use vending_core::{Config, RequestHandler};

const USAGE: &str = "Usage: vending-server [-config <file.toml>] [-host <addr>] [-port <u16>]
       [-workers <n>] [-item <name>] [-price <i64>] [-stock <u32>]
       [-max-upload-size <bytes>] [-upload-dir <dir>]";

/// Command line options
#[derive(Debug)]
struct Opts {
    /// Configuration of the vending machine
    config: Config,

    /// Port for the HTTP server to listen on
    port: u16,
    /// Address for the HTTP server to listen on
    host: String,
    /// Number of worker threads, i.e., the maximum number of requests
    /// served concurrently
    workers: u32,
}

/// Contents of a `-config` file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
struct FileOpts {
    host: Option<String>,
    port: Option<u16>,
    workers: Option<u32>,
    machine: Option<Config>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            config: Config::default(),
            port: 5555,
            host: String::from("0.0.0.0"),
            workers: 8,
        }
    }
}

impl Opts {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        if args.iter().any(|arg| arg == "-help" || arg == "--help") {
            println!("{USAGE}");
            std::process::exit(0);
        }
        match Self::parse(args) {
            Ok(opts) => opts,
            Err(err) => {
                eprintln!("Error: {err}\n{USAGE}");
                std::process::exit(1);
            }
        }
    }

    /// Resolve the options: defaults, then the `-config` file, then flags
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, String> {
        let mut pairs = Vec::new();
        let mut args = args.into_iter();
        while let Some(opt) = args.next() {
            let Some(arg) = args.next() else {
                return Err(format!("option {opt} takes a value"));
            };
            pairs.push((opt, arg));
        }

        let mut opts = Opts::default();
        if let Some((_, path)) = pairs.iter().rev().find(|(opt, _)| opt == "-config") {
            opts.merge_file(Path::new(path))?;
        }

        for (opt, arg) in pairs {
            match opt.as_str() {
                "-config" => {}
                "-host" => opts.host = arg,
                "-port" => opts.port = parse_value(&opt, &arg, "a decimal u16")?,
                "-workers" => opts.workers = parse_value(&opt, &arg, "a decimal u32")?,
                "-item" => opts.config.item = arg,
                "-price" => opts.config.price = parse_value(&opt, &arg, "a decimal i64")?,
                "-stock" => opts.config.stock = parse_value(&opt, &arg, "a decimal u32")?,
                "-max-upload-size" => {
                    opts.config.max_upload_size = parse_value(&opt, &arg, "a decimal u64")?
                }
                "-upload-dir" => opts.config.upload_dir = PathBuf::from(arg),
                _ => return Err(format!("unknown option {opt}")),
            }
        }

        if opts.workers == 0 {
            return Err("-workers must be at least 1".into());
        }
        opts.config.validate()?;
        Ok(opts)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let file: FileOpts =
            toml::from_str(&contents).map_err(|e| format!("invalid {}: {e}", path.display()))?;

        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(config) = file.machine {
            self.config = config;
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(opt: &str, arg: &str, what: &str) -> Result<T, String> {
    arg.parse().map_err(|_| format!("{opt} takes {what}, got {arg:?}"))
}

/// Install the global `tracing` subscriber, filtered by `RUST_LOG`
fn setup_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .compact()
        .init();
}

fn http_loop<H: RequestHandler>(server: &tiny_http::Server, handler: &H) {
    loop {
        match server.recv() {
            Ok(rq) => {
                if let Some(rq) = http::parse(rq) {
                    handler.handle(rq);
                }
            }
            Err(err) => {
                error!("HTTP receive failed: {err}");
                return;
            }
        }
    }
}

fn main() -> eyre::Result<()> {
    setup_tracing();
    let opts = Opts::from_args();

    let machine = vending_machine::launch(&opts.config)?;

    let server = tiny_http::Server::http((opts.host.as_str(), opts.port))
        .map_err(|e| eyre!("cannot listen on {}:{}: {e}", opts.host, opts.port))?;
    info!(host = %opts.host, port = opts.port, workers = opts.workers, "listening");

    serve(&server, &machine, opts.workers).wrap_err("cannot spawn worker thread")?;

    machine.shutdown();
    Ok(())
}

/// Run `workers` request threads on `server` until all of them return
///
/// If a thread cannot be spawned, the already running ones are released
/// before the error is returned.
fn serve<H: RequestHandler + Sync>(
    server: &tiny_http::Server,
    handler: &H,
    workers: u32,
) -> io::Result<()> {
    thread::scope(|s| {
        for i in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("worker_{i}"))
                .spawn_scoped(s, || http_loop(server, handler));
            if let Err(err) = spawned {
                release_workers(server, i);
                return Err(err);
            }
        }
        Ok(())
    })
}

/// Make `count` threads blocked in [`http_loop`] return
fn release_workers(server: &tiny_http::Server, count: u32) {
    warn!(count, "releasing request threads");
    for _ in 0..count {
        server.unblock();
    }
}
