use std::env;
use std::sync::Once;
use std::time::Duration;

use futures::TryStreamExt;
use hiverpc_core::{ChainClient, ClientConfig, Network};

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hiverpc_core=debug")),
            )
            .with_target(true)
            .try_init();
    });
}

fn live_client() -> ChainClient {
    let network: Network = env::var("HIVERPC_TEST_NETWORK")
        .unwrap_or_else(|_| "hive".to_owned())
        .parse()
        .expect("HIVERPC_TEST_NETWORK must be hive, steem or blurt");
    let nodes: Vec<String> = env::var("HIVERPC_TEST_NODES")
        .expect("HIVERPC_TEST_NODES must be set (comma separated node URLs)")
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .collect();
    let config = ClientConfig::new(network)
        .with_nodes(nodes)
        .with_retry(3, Duration::from_secs(1));
    ChainClient::new(config).expect("live client must construct")
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network access; set HIVERPC_TEST_NODES"]
async fn live_block_range_and_head() {
    init_tracing();
    let client = live_client();

    let head = client
        .get_head_block_number()
        .await
        .expect("head block number");
    assert!(head > 1_000, "live chain must be past genesis");

    let blocks = client
        .get_block_range(head - 100, head - 50)
        .await
        .expect("block range");
    assert_eq!(blocks.len(), 50);
    for (offset, block) in blocks.iter().enumerate() {
        assert_eq!(block.number, head - 100 + offset as u64);
        assert!(!block.block_id.is_empty());
    }
    eprintln!("[itest] fetched {} blocks below head {head}", blocks.len());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network access; set HIVERPC_TEST_NODES and HIVERPC_TEST_ACCOUNT"]
async fn live_account_balances() {
    init_tracing();
    let client = live_client();
    let account = env::var("HIVERPC_TEST_ACCOUNT").expect("HIVERPC_TEST_ACCOUNT must be set");

    let chain_id = client.chain_id().await.expect("chain id");
    assert!(chain_id.len() >= 64, "chain id must be 64 hex chars: {chain_id}");

    let balances = client.get_balances(&account).await.expect("balances");
    assert!(balances.contains_key("VESTS"), "{balances:?}");
    for (symbol, amount) in &balances {
        eprintln!("[itest] {account}: {amount} ({symbol})");
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires network access; set HIVERPC_TEST_NODES"]
async fn live_stream_preload_and_follow() {
    init_tracing();
    let client = live_client();

    let blocks: Vec<_> = client
        .stream_blocks(3, Some(2), Duration::from_secs(3))
        .try_collect()
        .await
        .expect("stream");
    assert_eq!(blocks.len(), 5);
    assert!(blocks.windows(2).all(|w| w[1].number == w[0].number + 1));
}
