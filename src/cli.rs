use std::{num::NonZeroUsize, path::PathBuf};

use clap::Parser;

/// Embedded DNA sequence store driven by a command file.
#[derive(Debug, Parser)]
#[command(name = "dnastore", version, about)]
pub struct Opts {
    /// Command file, one command per line.
    pub command_file: PathBuf,

    /// Number of buffers held by the block cache.
    pub num_buffers: NonZeroUsize,

    /// Size in bytes of one cache block.
    pub block_size: NonZeroUsize,

    /// Backing file for the memory pool.
    #[arg(long, default_value = "dnastore.dat")]
    pub data_file: PathBuf,

    /// Initial pool size in bytes for a fresh store.
    #[arg(long, default_value_t = 256)]
    pub pool_size: u32,

    /// Pool growth step in bytes; 0 disables growth.
    #[arg(long, default_value_t = 100)]
    pub growth: u32,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Opts;

    #[test]
    fn positional_arguments_parse_in_order() {
        let opts = Opts::parse_from(["dnastore", "cmds.txt", "4", "64"]);
        assert_eq!(opts.command_file.to_str(), Some("cmds.txt"));
        assert_eq!(opts.num_buffers.get(), 4);
        assert_eq!(opts.block_size.get(), 64);
        assert_eq!(opts.data_file.to_str(), Some("dnastore.dat"));
        assert_eq!(opts.pool_size, 256);
        assert_eq!(opts.growth, 100);
    }

    #[test]
    fn missing_and_zero_arguments_are_usage_errors() {
        assert!(Opts::try_parse_from(["dnastore", "cmds.txt"]).is_err());
        assert!(Opts::try_parse_from(["dnastore", "cmds.txt", "0", "64"]).is_err());
        assert!(Opts::try_parse_from(["dnastore", "cmds.txt", "4", "0"]).is_err());
    }
}
