//! Misery CLI
//!
//! Local tooling: a relay that stands in for the gateway, and direct access
//! to the file-backed document store and the memcached cache.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use misery::cache::{Cache, MemcachedCache};
use misery::network::{Relay, RelayEvent};
use misery::partition::DEFAULT_PARTITION_LIMIT;
use misery::store::FileStore;
use misery::{BlobPartitioner, CompositeKey, Datastore, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// Misery CLI
#[derive(Parser, Debug)]
#[command(name = "misery-cli")]
#[command(about = "CLI for the Misery bot")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Act as the gateway: accept the bot and relay stdin lines as messages
    Relay {
        /// Listen address (host:port)
        #[arg(short, long, default_value = "127.0.0.1:7878")]
        listen: String,

        /// Token the bot must identify with
        #[arg(short, long, env = "MISERYBOT_OAUTH_KEY")]
        token: String,

        /// Identity assigned to the bot
        #[arg(long, default_value = "1")]
        bot_id: u64,

        /// Identity the typed messages come from
        #[arg(short, long, default_value = "2")]
        author_id: u64,

        /// Channel the typed messages are posted in
        #[arg(short, long, default_value = "1")]
        channel_id: u64,
    },

    /// Read and write the file store directly
    Store {
        /// Store root (data dir joined with the namespace)
        #[arg(short, long, default_value = "./misery_data/default")]
        root: PathBuf,

        /// Chunk ceiling in bytes for striping large values
        #[arg(short, long, default_value_t = DEFAULT_PARTITION_LIMIT)]
        partition_limit: usize,

        #[command(subcommand)]
        op: StoreOp,
    },

    /// Read and write the memcached cache directly
    Cache {
        /// Memcached endpoint (host:port)
        #[arg(short, long, env = "MEMCACHIER_ENDPOINT")]
        endpoint: String,

        #[arg(short, long, env = "MEMCACHIER_USERNAME")]
        username: Option<String>,

        #[arg(short, long, env = "MEMCACHIER_PASSWORD")]
        password: Option<String>,

        /// Socket timeout in milliseconds
        #[arg(long, default_value = "2000")]
        timeout_ms: u64,

        #[command(subcommand)]
        op: CacheOp,
    },
}

#[derive(Subcommand, Debug)]
enum CacheOp {
    /// Print a cached value
    Get { key: String },

    /// Cache a string value
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum StoreOp {
    /// Print a record or field
    Get {
        key: String,

        /// Write byte values to this file instead of summarizing them
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Set a field to a string value
    Put { key: String, value: String },

    /// Set a field to the contents of a file
    PutFile { key: String, path: PathBuf },

    /// Delete a record or field
    Del { key: String },

    /// List child records
    Ls { key: String },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();
    let result = match args.command {
        Commands::Relay {
            listen,
            token,
            bot_id,
            author_id,
            channel_id,
        } => run_relay(&listen, &token, bot_id, author_id, channel_id),
        Commands::Store {
            root,
            partition_limit,
            op,
        } => run_store(root, partition_limit, op),
        Commands::Cache {
            endpoint,
            username,
            password,
            timeout_ms,
            op,
        } => run_cache(endpoint, username.zip(password), timeout_ms, op),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run_relay(
    listen: &str,
    token: &str,
    bot_id: u64,
    author_id: u64,
    channel_id: u64,
) -> misery::Result<()> {
    let relay = Relay::bind(listen, token, bot_id)?;
    eprintln!("waiting for bot on {}", relay.local_addr()?);
    let mut session = relay.accept()?;
    eprintln!("bot connected; type messages, Ctrl+D to end");

    let events = session.events().clone();
    let printer = thread::spawn(move || {
        for event in events.iter() {
            match event {
                RelayEvent::Reply {
                    channel_id,
                    content,
                } => println!("[{}] {}", channel_id, content),
                RelayEvent::Closed => {
                    eprintln!("bot closed the session");
                    break;
                }
            }
        }
    });

    for line in io::stdin().lock().lines() {
        let line = line?;
        if printer.is_finished() {
            break;
        }
        session.send_message(author_id, channel_id, &line)?;
    }

    // give the last replies a moment before closing
    thread::sleep(Duration::from_millis(200));
    session.close()?;
    let _ = printer.join();
    Ok(())
}

fn run_store(root: PathBuf, partition_limit: usize, op: StoreOp) -> misery::Result<()> {
    let backend = std::sync::Arc::new(FileStore::open(root)?);
    let store = Datastore::new(backend, BlobPartitioner::new(partition_limit)?);
    let mut stdout = io::stdout().lock();

    match op {
        StoreOp::Get { key, out } => match store.read(&key)? {
            None => writeln!(stdout, "(not found)")?,
            Some(Value::Bytes(bytes)) => match out {
                Some(path) => {
                    std::fs::write(&path, &bytes)?;
                    writeln!(stdout, "wrote {} bytes to {}", bytes.len(), path.display())?;
                }
                None => writeln!(stdout, "<{} bytes>", bytes.len())?,
            },
            Some(value) => writeln!(stdout, "{:?}", value)?,
        },
        StoreOp::Put { key, value } => {
            store.write(&key, Value::String(value), true)?;
        }
        StoreOp::PutFile { key, path } => {
            let data = std::fs::read(&path)?;
            let parts = store.partitioner().partition_count(data.len());
            store.write(&key, Value::Bytes(data), true)?;
            writeln!(stdout, "stored in {} partition(s)", parts.max(1))?;
        }
        StoreOp::Del { key } => {
            let removed = store.delete(&key)?;
            writeln!(stdout, "{}", if removed { "deleted" } else { "(not found)" })?;
        }
        StoreOp::Ls { key } => {
            let key = CompositeKey::parse(&key)?;
            for child in store.backend().children(key.segments())? {
                if !Datastore::is_stripe_segment(&child) {
                    writeln!(stdout, "{}", child)?;
                }
            }
        }
    }
    Ok(())
}

fn run_cache(
    endpoint: String,
    credentials: Option<(String, String)>,
    timeout_ms: u64,
    op: CacheOp,
) -> misery::Result<()> {
    let cache = MemcachedCache::connect(endpoint, credentials, Duration::from_millis(timeout_ms))?;
    let mut stdout = io::stdout().lock();

    match op {
        CacheOp::Get { key } => match cache.read(&key)? {
            None => writeln!(stdout, "(not found)")?,
            Some(raw) => match String::from_utf8(raw) {
                Ok(text) => writeln!(stdout, "{}", text)?,
                Err(e) => writeln!(stdout, "<{} bytes>", e.as_bytes().len())?,
            },
        },
        CacheOp::Set { key, value } => cache.write(&key, value.as_bytes())?,
    }
    Ok(())
}
