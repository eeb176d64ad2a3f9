mod logger;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use async_std::task::block_on;
use clap::{Parser, Subcommand};
use config::Config;
use dnslink::{resolver_from_config, DnsLink, DnsLinkEvent, ProgressSink, ResolveOptions};
use namesys::LocalStore;
use store::Store;
use tracing::{debug, info};
use types::{base32_lower, AbortController};

use crate::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "namesys", version, about = "Resolve DNSLink names and inspect local name records.")]
struct Args {
    /// Sets config file.
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Log file.
    #[arg(short, long, value_name = "PATH")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the DNSLink of a domain and print the path it points to.
    Dnslink {
        domain: String,
        /// Skip the DNS answer cache.
        #[arg(long)]
        nocache: bool,
    },
    /// List routing keys of every record in the local store.
    Records,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    setup_logger(args.log.as_deref())?;

    let config = Config::from_config_file(&args.config)?;

    match args.command {
        Command::Dnslink { domain, nocache } => {
            let path = block_on(dnslink(&config, &domain, nocache))?;
            println!("{path}");
        }
        Command::Records => {
            let store = Store::new(config.db_path())?;
            let local = LocalStore::new(Arc::new(store));
            for (routing_key, record) in local.list()? {
                println!("{}\t{} bytes", base32_lower(&routing_key), record.len());
            }
        }
    }
    Ok(())
}

async fn dnslink(config: &Config, domain: &str, nocache: bool) -> Result<String, Box<dyn Error>> {
    let controller = AbortController::new();
    let signal = controller.signal();
    ctrlc::set_handler(move || {
        info!("interrupted, aborting lookup");
        controller.abort();
    })?;

    let resolver = resolver_from_config(config).await?;
    let dnslink = DnsLink::new(resolver).with_max_depth(config.max_recursion_depth);
    let progress: ProgressSink = Arc::new(|event: DnsLinkEvent| match event {
        DnsLinkEvent::Cache(domain) => debug!(%domain, "answered from cache"),
        DnsLinkEvent::Query(domain) => debug!(%domain, "querying TXT records"),
        DnsLinkEvent::Answer { domain, answers } => {
            debug!(%domain, answers = answers.len(), "received TXT answer")
        }
    });
    let options = ResolveOptions {
        nocache,
        signal: Some(signal),
        on_progress: Some(progress),
    };
    Ok(dnslink.resolve(domain, &options).await?)
}
