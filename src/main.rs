use std::{
    fs::File,
    io::{self, BufReader},
    process,
};

use anyhow::Context as _;
use clap::Parser;
use dnastore_engine::{DnaTrie, StoreConfig, TrieError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dnastore::{cli::Opts, controller::Controller};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let opts = Opts::parse();
    match run(opts) {
        Ok(()) => process::exit(exitcode::OK),
        Err(error) => {
            error!(error = %format!("{error:#}"), "run failed");
            eprintln!("dnastore: {error:#}");
            process::exit(exit_code_for(&error));
        }
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let config = StoreConfig {
        data_path: opts.data_file,
        num_buffers: opts.num_buffers.get(),
        block_size: opts.block_size.get(),
        initial_pool_size: opts.pool_size,
        growth_step: opts.growth,
    };
    info!(
        data_file = %config.data_path.display(),
        num_buffers = config.num_buffers,
        block_size = config.block_size,
        "opening store"
    );
    let trie = DnaTrie::open(config).context("failed to open store")?;

    let commands = File::open(&opts.command_file)
        .with_context(|| format!("failed to open command file {}", opts.command_file.display()))?;

    let mut controller = Controller::new(trie);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    controller.run(BufReader::new(commands), &mut out)?;

    let stats = controller.cache_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        disk_reads = stats.disk_reads,
        disk_writes = stats.disk_writes,
        sequences = controller.sequences(),
        "run complete"
    );
    controller.close().context("failed to close store")?;
    Ok(())
}

/// Corruption maps to a data error; everything else that aborts a run is
/// an I/O-class failure.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(trie_error) = cause.downcast_ref::<TrieError>() {
            return match trie_error {
                TrieError::Corrupt { .. } => exitcode::DATAERR,
                _ => exitcode::IOERR,
            };
        }
    }
    exitcode::IOERR
}
