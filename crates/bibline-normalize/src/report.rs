//! Per-batch completeness report

use std::collections::BTreeMap;

use bibline_core::fmt_num;

use crate::error::{RecordSkip, Substructure};
use crate::schema::Table;

/// What happened to the records of a batch.
///
/// Counts are additive, so partial reports from parallel chunks sum to the
/// report of the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecomposeReport {
    pub records_seen: usize,
    pub records_accepted: usize,
    pub record_skips: BTreeMap<RecordSkip, usize>,
    pub substructure_skips: BTreeMap<Substructure, usize>,
    /// List items dropped inside otherwise usable lists
    pub skipped_items: usize,
    /// Final rows per table, in output order
    pub row_counts: Vec<(Table, usize)>,
}

impl DecomposeReport {
    pub fn skip_record(&mut self, reason: RecordSkip) {
        *self.record_skips.entry(reason).or_default() += 1;
    }

    pub fn skip_substructure(&mut self, kind: Substructure) {
        *self.substructure_skips.entry(kind).or_default() += 1;
    }

    pub fn records_skipped(&self) -> usize {
        self.record_skips.values().sum()
    }

    pub fn substructures_skipped(&self) -> usize {
        self.substructure_skips.values().sum()
    }

    pub fn record_skips_for(&self, reason: RecordSkip) -> usize {
        self.record_skips.get(&reason).copied().unwrap_or(0)
    }

    pub fn substructure_skips_for(&self, kind: Substructure) -> usize {
        self.substructure_skips.get(&kind).copied().unwrap_or(0)
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.row_counts
            .iter()
            .find(|(t, _)| *t == table)
            .map_or(0, |(_, n)| *n)
    }

    /// Add another report's counters. Row counts are not additive and are
    /// left for the caller to recompute.
    pub fn absorb(&mut self, other: &DecomposeReport) {
        self.records_seen += other.records_seen;
        self.records_accepted += other.records_accepted;
        for (reason, n) in &other.record_skips {
            *self.record_skips.entry(*reason).or_default() += n;
        }
        for (kind, n) in &other.substructure_skips {
            *self.substructure_skips.entry(*kind).or_default() += n;
        }
        self.skipped_items += other.skipped_items;
    }

    pub fn log(&self) {
        log::info!(
            "Records: {} seen, {} accepted, {} skipped",
            fmt_num(self.records_seen),
            fmt_num(self.records_accepted),
            fmt_num(self.records_skipped())
        );
        for (reason, n) in &self.record_skips {
            log::info!("  skipped ({reason}): {}", fmt_num(*n));
        }
        if !self.substructure_skips.is_empty() || self.skipped_items > 0 {
            log::info!(
                "Sub-structures dropped: {} ({} list items)",
                fmt_num(self.substructures_skipped()),
                fmt_num(self.skipped_items)
            );
            for (kind, n) in &self.substructure_skips {
                log::info!("  {kind}: {}", fmt_num(*n));
            }
        }
        for (table, n) in &self.row_counts {
            log::info!("  {:<28} {:>12}", table.name(), fmt_num(*n));
        }
    }
}
