//! Live block streaming.
//!
//! [`ChainClient::stream_blocks`] returns a pull-based stream driven by an
//! explicit state machine:
//!
//! ```text
//! PRELOAD -> CATCHUP <-> POLL_WAIT
//!               |
//!               v
//!           FINALIZE -> DONE
//! ```
//!
//! Cancellation goes through a shared [`StopSignal`] that is only checked
//! between fetches, so a batch already in flight is still delivered after
//! [`ChainClient::stop_streaming`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tracing::{debug, info};

use crate::client::ChainClient;
use crate::error::CoreError;
use crate::head::block_number;
use crate::types::Block;

/// Cooperative cancellation flag shared between a client and its streams.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Preload,
    PollWait,
    Catchup,
    Finalize,
    Done,
}

struct StreamState<'a> {
    client: &'a ChainClient,
    phase: Phase,
    buffer: VecDeque<Block>,
    before: u64,
    end_after: Option<u64>,
    wait_block: Duration,
    /// Next block number to fetch.
    cursor: u64,
    /// Exclusive upper bound, if the stream is bounded.
    end: Option<u64>,
}

impl ChainClient {
    /// Stream blocks as they are produced.
    ///
    /// Starts with the `before` blocks preceding the current head, then
    /// follows the chain, polling every `wait_block`. With `end_after =
    /// Some(n)` the stream ends after `n` blocks past the head at start
    /// (`Some(0)` delivers only the preload); `None` streams until
    /// [`Self::stop_streaming`] is called.
    ///
    /// Any error ends the stream after being yielded. Resume by starting a
    /// new stream from the last delivered block.
    pub fn stream_blocks(
        &self,
        before: u64,
        end_after: Option<u64>,
        wait_block: Duration,
    ) -> impl Stream<Item = Result<Block, CoreError>> + '_ {
        let state = StreamState {
            client: self,
            phase: Phase::Preload,
            buffer: VecDeque::new(),
            before,
            end_after,
            wait_block,
            cursor: 0,
            end: None,
        };
        stream::try_unfold(state, |state| next_block(state))
    }

    /// Ask running streams to finish after their current batch.
    pub fn stop_streaming(&self) {
        info!("stopping block streams");
        self.stop.stop();
    }

    /// Clear the stop signal so new streams run.
    pub fn start_streaming(&self) {
        self.stop.reset();
    }

    /// A handle on this client's stop signal, e.g. for a signal handler task.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn set_auto_reset_stream(&self, auto_reset: bool) {
        self.auto_reset_stream.store(auto_reset, Ordering::Relaxed);
    }
}

async fn next_block<'a>(
    mut state: StreamState<'a>,
) -> Result<Option<(Block, StreamState<'a>)>, CoreError> {
    loop {
        if let Some(block) = state.buffer.pop_front() {
            return Ok(Some((block, state)));
        }
        state.phase = match state.phase {
            Phase::Preload => preload(&mut state).await?,
            Phase::PollWait => {
                tokio::time::sleep(state.wait_block).await;
                Phase::Catchup
            }
            Phase::Catchup => catchup(&mut state).await?,
            Phase::Finalize => {
                if state.client.auto_reset_stream.load(Ordering::Relaxed) {
                    state.client.stop.reset();
                }
                debug!(cursor = state.cursor, "block stream finished");
                Phase::Done
            }
            Phase::Done => return Ok(None),
        };
    }
}

async fn preload(state: &mut StreamState<'_>) -> Result<Phase, CoreError> {
    let before = i64::try_from(state.before).unwrap_or(i64::MAX);
    let end_after = state
        .end_after
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX));
    let (head, resolved) = state
        .client
        .relative_head_block(&[Some(-before), end_after], false)
        .await?;
    // A start at or below genesis (`before >= head`) skips the preload.
    let start = resolved[0].filter(|start| *start > 0).map(block_number);
    state.end = resolved[1].map(block_number);
    state.cursor = head;

    debug!(head, start = ?start, end = ?state.end, "block stream preload");
    if let Some(start) = start.filter(|start| *start < head) {
        let blocks = state.client.get_block_range(start, head).await?;
        state.buffer.extend(blocks);
    }

    if state.end_after == Some(0) {
        return Ok(Phase::Finalize);
    }
    Ok(Phase::Catchup)
}

async fn catchup(state: &mut StreamState<'_>) -> Result<Phase, CoreError> {
    let client = state.client;
    if client.stop.is_stopped() {
        return Ok(Phase::Finalize);
    }

    let head = client.get_head_block_number().await?;
    if head < state.cursor {
        return Ok(Phase::PollWait);
    }

    if let Some(end) = state.end {
        if head + 1 >= end {
            let blocks = client.get_block_range(state.cursor, end).await?;
            state.buffer.extend(blocks);
            state.cursor = end;
            return Ok(Phase::Finalize);
        }
    }

    let blocks = client.get_block_range(state.cursor, head + 1).await?;
    debug!(from = state.cursor, to = head, fetched = blocks.len(), "block stream catch-up");
    state.buffer.extend(blocks);
    state.cursor = head + 1;

    // Blocks fetched before the stop was noticed are still delivered.
    if client.stop.is_stopped() {
        return Ok(Phase::Finalize);
    }
    Ok(Phase::PollWait)
}
