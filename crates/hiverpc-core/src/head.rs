use crate::client::ChainClient;
use crate::error::CoreError;

impl ChainClient {
    /// Fetch the head block number once and resolve `diffs` against it.
    ///
    /// `None` passes through. With `neg_only`, non-negative values are taken
    /// as absolute block numbers and only negative ones as "blocks behind
    /// head"; without it every value becomes `head + diff`.
    ///
    /// ```text
    /// relative_head_block(&[Some(-100), Some(50)], true)  -> (H, [H-100, 50])
    /// relative_head_block(&[Some(-100), Some(50)], false) -> (H, [H-100, H+50])
    /// ```
    pub async fn relative_head_block(
        &self,
        diffs: &[Option<i64>],
        neg_only: bool,
    ) -> Result<(u64, Vec<Option<i64>>), CoreError> {
        let head = self.get_head_block_number().await?;
        Ok((head, resolve_relative(head, diffs, neg_only)))
    }
}

pub fn resolve_relative(head: u64, diffs: &[Option<i64>], neg_only: bool) -> Vec<Option<i64>> {
    let head = i64::try_from(head).unwrap_or(i64::MAX);
    diffs
        .iter()
        .map(|diff| match *diff {
            None => None,
            Some(d) if neg_only && d >= 0 => Some(d),
            Some(d) => Some(head.saturating_add(d)),
        })
        .collect()
}

/// Clamp a resolved block number to the valid range.
pub(crate) fn block_number(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
