use clap::{Parser, Subcommand, ValueEnum};
use hiverpc_core::Network;

/// Query Hive, Steem and Blurt nodes over JSON-RPC.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// RPC nodes to use, comma separated. Defaults to the network's public nodes.
    #[arg(short = 'n', long, env = "HIVERPC_NODES", value_delimiter = ',')]
    pub nodes: Vec<String>,

    /// Network: hive, steem or blurt.
    #[arg(short = 'N', long, default_value = "hive", env = "HIVERPC_NETWORK")]
    pub network: Network,

    /// Retries per call before giving up.
    #[arg(long, default_value = "10")]
    pub max_retry: u32,

    /// Seconds to wait before retrying on the next node.
    #[arg(short = 'd', long, default_value = "2")]
    pub retry_delay: f64,

    /// Maximum number of concurrent chunks a block range is split into.
    #[arg(long, default_value = "40")]
    pub batch_size: usize,

    /// Use the legacy `call` envelope instead of appbase method names.
    #[arg(long)]
    pub no_appbase: bool,

    /// Print compact JSON instead of pretty-printed JSON.
    #[arg(short = 'r', long, alias = "no-pretty")]
    pub raw: bool,

    /// How decimal amounts are rendered.
    #[arg(long, value_enum, default_value = "str")]
    pub decimal_cast: DecimalCast,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecimalCast {
    /// Exact decimal string, e.g. "2015.429".
    #[value(alias = "string")]
    Str,
    /// JSON number (may lose precision).
    Float,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print a block (the head block if no number is given).
    GetBlock { number: Option<u64> },

    /// Print a range of blocks. Negative values count back from the head;
    /// a missing end means the head block.
    GetBlocks {
        #[arg(default_value = "-10", allow_negative_numbers = true)]
        start: i64,
        #[arg(allow_negative_numbers = true)]
        end: Option<i64>,
    },

    /// Print the head block number.
    GetHeadBlock,

    /// Print the dynamic global properties.
    GetProps,

    /// Print the node configuration.
    GetConfig,

    /// Print an account with resolved balances.
    GetAccount { name: String },

    /// Print an account's balances.
    GetBalances { name: String },

    /// Print an account's operation history.
    GetAccountHistory {
        name: String,
        /// History index to end at; -1 for the most recent entry.
        #[arg(short, long, default_value = "-1", allow_negative_numbers = true)]
        start: i64,
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Print a witness.
    GetWitness { name: String },

    /// Print witnesses ordered by votes.
    GetWitnessList {
        #[arg(default_value = "21")]
        limit: u32,
        /// Witness to start the listing from.
        name: Option<String>,
    },

    /// Print blocks as they are produced, one JSON document per block.
    Stream {
        /// Blocks before the head to print first.
        #[arg(long, default_value = "20")]
        before: u64,
        /// Stop after this many blocks past the head; runs until Ctrl-C if omitted.
        #[arg(long)]
        end_after: Option<u64>,
        /// Seconds between head polls.
        #[arg(long, default_value = "3.5")]
        wait: f64,
    },

    /// Send a raw JSON-RPC call and print its result.
    Call {
        /// Full method name, e.g. condenser_api.get_accounts.
        method: String,
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
        /// Parse every param as JSON.
        #[arg(short = 'j', long, conflicts_with = "csv_params")]
        json_params: bool,
        /// Split params containing commas into lists.
        #[arg(short = 'c', long)]
        csv_params: bool,
        /// Turn numeric params into JSON numbers.
        #[arg(short = 'I', long, alias = "num")]
        parse_numbers: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_block_range_parses() {
        let cli = Cli::try_parse_from(["hiverpc", "get-blocks", "-100", "-50"]).expect("parses");
        match cli.command {
            Command::GetBlocks { start, end } => {
                assert_eq!(start, -100);
                assert_eq!(end, Some(-50));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn global_flags_parse() {
        let cli = Cli::try_parse_from([
            "hiverpc",
            "--nodes",
            "https://a.test,https://b.test",
            "--network",
            "Steem",
            "--no-appbase",
            "--decimal-cast",
            "float",
            "get-balances",
            "alice",
        ])
        .expect("parses");
        assert_eq!(cli.nodes, vec!["https://a.test", "https://b.test"]);
        assert_eq!(cli.network, Network::Steem);
        assert!(cli.no_appbase);
        assert_eq!(cli.decimal_cast, DecimalCast::Float);
    }

    #[test]
    fn unknown_network_is_rejected() {
        assert!(Cli::try_parse_from(["hiverpc", "--network", "golos", "get-props"]).is_err());
    }
}
