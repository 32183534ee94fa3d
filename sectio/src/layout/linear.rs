use sectio_section::iterators::{ContiguousRuns, ContiguousRunsIntoIterator};

use super::{Transfer, TransferSource};

/// Transfers of a section addressed against the whole variable.
///
/// Used by the regular layout with absolute offsets, and by the segmented and compressed layouts with logical
/// stream offsets.
pub(super) struct LinearTransfers {
    runs: ContiguousRunsIntoIterator,
    source: fn(u64) -> TransferSource<'static>,
    base_offset: u64,
    element_size: u64,
}

impl LinearTransfers {
    pub(super) fn new(
        runs: ContiguousRuns,
        source: fn(u64) -> TransferSource<'static>,
        base_offset: u64,
        element_size: u64,
    ) -> Self {
        Self {
            runs: runs.into_iter(),
            source,
            base_offset,
            element_size,
        }
    }
}

impl Iterator for LinearTransfers {
    type Item = Transfer<'static>;

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.runs.next()?;
        Some(Transfer {
            source: (self.source)(self.base_offset + run.source_index * self.element_size),
            destination: run.output_index,
            run_length: run.length,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.runs.size_hint()
    }
}
