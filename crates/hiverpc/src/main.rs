mod cli;
mod output;
mod params;

use std::time::Duration;

use clap::Parser;
use eyre::{eyre, WrapErr};
use futures::{pin_mut, TryStreamExt};
use serde_json::Value;

use hiverpc_core::{ChainClient, ClientConfig};

use cli::{Cli, Command};
use output::Printer;
use params::{parse_call_params, ParamMode};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let client = ChainClient::new(client_config(&args)?).context("build RPC client")?;
    let printer = Printer {
        raw: args.raw,
        decimal_cast: args.decimal_cast,
    };
    tracing::debug!(network = %client.network(), nodes = ?client.nodes(), "client ready");

    let _session = client.session();
    run(&client, &printer, args.command).await
}

fn client_config(args: &Cli) -> eyre::Result<ClientConfig> {
    let mut config = ClientConfig::new(args.network)
        .with_appbase(!args.no_appbase)
        .with_retry(args.max_retry, seconds(args.retry_delay, "--retry-delay")?)
        .with_batch_size(args.batch_size);
    if !args.nodes.is_empty() {
        config = config.with_nodes(args.nodes.iter().map(|n| n.trim().to_owned()));
    }
    Ok(config)
}

fn seconds(value: f64, flag: &str) -> eyre::Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| eyre!("{flag} must be a non-negative number of seconds, got {value}"))
}

async fn run(client: &ChainClient, printer: &Printer, command: Command) -> eyre::Result<()> {
    let value: Value = match command {
        Command::GetBlock { number } => {
            let block = match number {
                Some(number) => client.get_block(number).await,
                None => client.get_head_block().await,
            }
            .context("fetch block")?;
            serde_json::to_value(block)?
        }
        Command::GetBlocks { start, end } => {
            let blocks = client
                .get_blocks(start, end)
                .await
                .context("fetch block range")?;
            serde_json::to_value(blocks)?
        }
        Command::GetHeadBlock => Value::from(client.get_head_block_number().await?),
        Command::GetProps => client.get_props().await?,
        Command::GetConfig => client.get_config().await?,
        Command::GetAccount { name } => {
            let accounts = client.get_accounts(&[name.as_str()]).await?;
            let account = accounts
                .get(&name)
                .ok_or_else(|| eyre!("account `{name}` not found"))?;
            printer.account(account)
        }
        Command::GetBalances { name } => printer.balances(&client.get_balances(&name).await?),
        Command::GetAccountHistory { name, start, limit } => {
            let history = client
                .account_history(&name, start, limit)
                .await
                .with_context(|| format!("fetch history of {name}"))?;
            serde_json::to_value(history)?
        }
        Command::GetWitness { name } => client
            .get_witness(&name)
            .await?
            .ok_or_else(|| eyre!("`{name}` is not a witness"))?,
        Command::GetWitnessList { limit, name } => {
            let witnesses = client
                .get_witness_list(name.as_deref().unwrap_or(""), limit)
                .await?;
            Value::Array(witnesses)
        }
        Command::Stream {
            before,
            end_after,
            wait,
        } => return stream(client, printer, before, end_after, seconds(wait, "--wait")?).await,
        Command::Call {
            method,
            params,
            json_params,
            csv_params,
            parse_numbers,
        } => {
            let mode = ParamMode {
                json: json_params,
                csv: csv_params,
                parse_numbers,
            };
            let params = parse_call_params(&params, mode)?;
            let mut response = client
                .call(&method, params)
                .await
                .with_context(|| format!("call {method}"))?;
            response
                .get_mut("result")
                .map(Value::take)
                .unwrap_or(Value::Null)
        }
    };
    printer.print(&value)
}

/// Print blocks until the stream ends or Ctrl-C stops it.
async fn stream(
    client: &ChainClient,
    printer: &Printer,
    before: u64,
    end_after: Option<u64>,
    wait: Duration,
) -> eyre::Result<()> {
    let stop = client.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing the current batch");
            stop.stop();
        }
    });

    let blocks = client.stream_blocks(before, end_after, wait);
    pin_mut!(blocks);
    while let Some(block) = blocks.try_next().await.context("stream blocks")? {
        printer.print(&serde_json::to_value(&block)?)?;
    }
    Ok(())
}
