//! Block range fetching.
//!
//! A range is turned into one `get_block` request per block number, using
//! the block number as the request id. Short ranges go out as one batch to
//! one node; longer ones are split into at most `batch_size` contiguous
//! chunks which are dispatched concurrently, each retrying on its own.

use std::collections::HashMap;
use std::ops::Range;

use futures::future::try_join_all;
use serde_json::json;
use tracing::{debug, info};

use crate::client::ChainClient;
use crate::error::CoreError;
use crate::head::block_number;
use crate::rpc::protocol::{bulk_requests, parse_response_id};
use crate::rpc::{CallStyle, JsonRpcRequest, Retry};
use crate::types::Block;

impl ChainClient {
    /// Blocks `start..end`, ascending. Fails as a whole if any chunk runs
    /// out of retries.
    pub async fn get_block_range(&self, start: u64, end: u64) -> Result<Vec<Block>, CoreError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let requests = self.block_requests(start..end);
        let batch_size = self.batch_size();

        if requests.len() < batch_size {
            debug!(start, end, "fetching block range in a single batch");
            return self.fetch_block_chunk(&requests).await;
        }

        let chunk_size = requests.len().div_ceil(batch_size);
        let chunks: Vec<&[JsonRpcRequest]> = requests.chunks(chunk_size).collect();
        info!(
            start,
            end,
            blocks = requests.len(),
            chunks = chunks.len(),
            "dividing block range into chunks"
        );
        // try_join_all yields results in input order, so chunk position (not
        // completion order) decides where each chunk's blocks land.
        let fetched = try_join_all(chunks.into_iter().map(|c| self.fetch_block_chunk(c))).await?;
        Ok(fetched.into_iter().flatten().collect())
    }

    /// Blocks from `start` up to (not including) `end`, where negative
    /// values count back from the head and `end = None` means the head.
    pub async fn get_blocks(&self, start: i64, end: Option<i64>) -> Result<Vec<Block>, CoreError> {
        let (head, resolved) = self.relative_head_block(&[Some(start), end], true).await?;
        let start = resolved[0].map_or(head, block_number);
        let end = resolved[1].map_or(head, block_number);
        self.get_block_range(start, end).await
    }

    pub(crate) fn block_requests(&self, range: Range<u64>) -> Vec<JsonRpcRequest> {
        let style = self.rpc.call_style();
        let api = match style {
            CallStyle::Appbase => "condenser_api",
            CallStyle::Legacy => "database_api",
        };
        bulk_requests(range, |n| style.route(api, "get_block", json!([n])))
    }

    /// One batch with its own retry loop. A response that cannot be turned
    /// into a block (missing id, `null` block) fails the attempt so the
    /// chunk is resent to the next node.
    async fn fetch_block_chunk(&self, requests: &[JsonRpcRequest]) -> Result<Vec<Block>, CoreError> {
        self.rpc
            .with_retry(Retry::Auto, |_node| async move {
                let responses = self.rpc.batch_call_with(requests, Retry::Never).await?;
                assemble_blocks(requests, responses)
            })
            .await
    }
}

/// Match batch responses back to request order by id.
fn assemble_blocks(
    requests: &[JsonRpcRequest],
    responses: Vec<serde_json::Value>,
) -> Result<Vec<Block>, CoreError> {
    let mut by_id: HashMap<u64, serde_json::Value> = HashMap::with_capacity(responses.len());
    for mut item in responses {
        let id = item
            .get("id")
            .and_then(parse_response_id)
            .ok_or_else(|| CoreError::domain(format!("batch response item has no usable id: {item}")))?;
        let result = item
            .get_mut("result")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        by_id.insert(id, result);
    }

    requests
        .iter()
        .map(|req| {
            let raw = by_id
                .remove(&req.id)
                .ok_or_else(|| CoreError::domain(format!("missing batch response for block {}", req.id)))?;
            Block::from_rpc(req.id, raw)
        })
        .collect()
}
