/// Most blocks a single cycle will look back from the head. Anything older is
/// skipped for good.
pub const MAX_LOOKBACK: u64 = 1000;

/// Inclusive block range to fetch in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub from_block: u64,
    pub to_block: u64,
    /// Blocks between the checkpoint and `from_block` that will never be
    /// ingested. Zero unless the window was clamped.
    pub skipped_blocks: u64,
}

impl BlockWindow {
    pub fn is_clamped(&self) -> bool {
        self.skipped_blocks > 0
    }

    pub fn len(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }
}

/// Window `[max(last_ingested, latest - max_lookback), latest]`.
///
/// A checkpoint ahead of `latest` yields `[last_ingested, last_ingested]` so
/// the cycle never moves progress backwards.
pub fn compute_window(last_ingested: u64, latest: u64, max_lookback: u64) -> BlockWindow {
    if last_ingested >= latest {
        return BlockWindow {
            from_block: last_ingested,
            to_block: last_ingested,
            skipped_blocks: 0,
        };
    }

    let earliest_allowed = latest.saturating_sub(max_lookback);
    if last_ingested < earliest_allowed {
        BlockWindow {
            from_block: earliest_allowed,
            to_block: latest,
            skipped_blocks: earliest_allowed - last_ingested,
        }
    } else {
        BlockWindow {
            from_block: last_ingested,
            to_block: latest,
            skipped_blocks: 0,
        }
    }
}
