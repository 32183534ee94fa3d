use std::iter::FusedIterator;
use std::ops::Range;

use itertools::izip;

use crate::{
    c_order_strides, ArrayIndicesTinyVec, IncompatibleDimensionalityError, LocalRange, SectionError,
};

/// A run of contiguous elements.
///
/// Elements `source_index..source_index + length` of the source (in C-contiguous order) map to
/// elements `output_index..output_index + length` of the destination.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContiguousRun {
    /// The linearised index of the first element in the source.
    pub source_index: u64,
    /// The linearised index of the first element in the destination.
    pub output_index: u64,
    /// The number of elements in the run.
    pub length: u64,
}

/// Iterates over maximal contiguous runs of a strided selection.
///
/// Runs are produced in C-contiguous order of the selection (last dimension fastest).
/// The innermost dimension forms a run of `count` elements if its stride is 1, otherwise each element is a run of one.
/// An outer dimension is merged into the run if its stride is 1 and every inner dimension is complete in both
/// the source and the destination.
///
/// For example, consider a 4x4 source and the selection `[1..3, 0..4]` written to a 2x4 destination.
/// The iterator will produce
/// ```rust,ignore
/// [ContiguousRun { source_index: 4, output_index: 0, length: 8 }]
/// ```
/// whereas the selection `[1..3, 1..3]` written to a 2x2 destination produces
/// ```rust,ignore
/// [
///     ContiguousRun { source_index: 5, output_index: 0, length: 2 },
///     ContiguousRun { source_index: 9, output_index: 2, length: 2 },
/// ]
/// ```
#[derive(Clone, Debug)]
pub struct ContiguousRuns {
    /// The counts of the dimensions iterated over (the merged dimensions are excluded).
    outer_counts: ArrayIndicesTinyVec,
    /// The source index step per iterated dimension.
    source_steps: ArrayIndicesTinyVec,
    /// The output index step per iterated dimension.
    output_steps: ArrayIndicesTinyVec,
    source_base: u64,
    output_base: u64,
    length: u64,
    num_runs: u64,
}

impl ContiguousRuns {
    /// Create a new contiguous runs iterator.
    ///
    /// `ranges` select elements from a source of shape `source_shape`.
    /// Their `output_offset`s position the selection in a destination of shape `output_shape`.
    ///
    /// # Errors
    /// Returns [`SectionError`] if the dimensionalities differ or a range is out of bounds.
    pub fn new(
        source_shape: &[u64],
        ranges: &[LocalRange],
        output_shape: &[u64],
    ) -> Result<Self, SectionError> {
        if source_shape.len() != ranges.len() {
            return Err(
                IncompatibleDimensionalityError::new(ranges.len(), source_shape.len()).into(),
            );
        }
        if output_shape.len() != ranges.len() {
            return Err(
                IncompatibleDimensionalityError::new(ranges.len(), output_shape.len()).into(),
            );
        }
        for (dimension, (range, &source_length, &output_length)) in
            izip!(ranges, source_shape, output_shape).enumerate()
        {
            let source_inbounds = range.count == 0
                || range
                    .stride
                    .checked_mul(range.count - 1)
                    .and_then(|steps| steps.checked_add(range.start))
                    .is_some_and(|last| last < source_length);
            let output_inbounds = range
                .output_offset
                .checked_add(range.count)
                .is_some_and(|end| end <= output_length);
            if !source_inbounds || !output_inbounds {
                return Err(SectionError::LocalOutOfBounds {
                    dimension,
                    range: *range,
                    source_length,
                    output_length,
                });
            }
        }

        // Merge trailing dimensions into the run
        let dimensionality = ranges.len();
        let mut length = 1;
        let mut outer = dimensionality;
        for (dimension, (range, &source_length, &output_length)) in
            izip!(ranges, source_shape, output_shape).enumerate().rev()
        {
            if range.stride != 1 {
                break;
            }
            length *= range.count;
            outer = dimension;
            let complete = range.start == 0
                && range.count == source_length
                && range.output_offset == 0
                && range.count == output_length;
            if !complete {
                break;
            }
        }

        let source_strides = c_order_strides(source_shape);
        let output_strides = c_order_strides(output_shape);
        let source_base = izip!(ranges, &source_strides)
            .map(|(range, stride)| range.start * stride)
            .sum();
        let output_base = izip!(ranges, &output_strides)
            .map(|(range, stride)| range.output_offset * stride)
            .sum();
        let outer_ranges = &ranges[..outer];
        let outer_counts: ArrayIndicesTinyVec = outer_ranges.iter().map(|r| r.count).collect();
        let source_steps = izip!(outer_ranges, &source_strides)
            .map(|(range, stride)| range.stride * stride)
            .collect();
        let output_steps = output_strides[..outer].iter().copied().collect();
        let num_runs = if length == 0 {
            0
        } else {
            outer_counts.iter().product()
        };

        Ok(Self {
            outer_counts,
            source_steps,
            output_steps,
            source_base,
            output_base,
            length,
            num_runs,
        })
    }

    /// Return the number of runs (i.e. the length of the iterator).
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.num_runs).unwrap_or(usize::MAX)
    }

    /// Returns true if there are no runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_runs == 0
    }

    /// Return the number of elements in each run (fixed on each iteration).
    #[must_use]
    pub fn run_length(&self) -> u64 {
        self.length
    }

    /// Return the total number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.num_runs * self.length
    }

    /// Create a new serial iterator.
    #[must_use]
    pub fn iter(&self) -> ContiguousRunsIterator<'_> {
        <&Self as IntoIterator>::into_iter(self)
    }

    fn run(&self, index: u64) -> ContiguousRun {
        let mut source_index = self.source_base;
        let mut output_index = self.output_base;
        let mut remainder = index;
        for (&count, &source_step, &output_step) in izip!(
            self.outer_counts.iter().rev(),
            self.source_steps.iter().rev(),
            self.output_steps.iter().rev()
        ) {
            let j = remainder % count;
            remainder /= count;
            source_index += j * source_step;
            output_index += j * output_step;
        }
        ContiguousRun {
            source_index,
            output_index,
            length: self.length,
        }
    }
}

impl<'a> IntoIterator for &'a ContiguousRuns {
    type Item = ContiguousRun;
    type IntoIter = ContiguousRunsIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        ContiguousRunsIterator {
            runs: self,
            range: 0..self.num_runs,
        }
    }
}

impl IntoIterator for ContiguousRuns {
    type Item = ContiguousRun;
    type IntoIter = ContiguousRunsIntoIterator;

    fn into_iter(self) -> Self::IntoIter {
        let range = 0..self.num_runs;
        ContiguousRunsIntoIterator { runs: self, range }
    }
}

/// Serial contiguous runs iterator.
///
/// See [`ContiguousRuns`].
pub struct ContiguousRunsIterator<'a> {
    runs: &'a ContiguousRuns,
    range: Range<u64>,
}

/// Serial contiguous runs iterator.
///
/// See [`ContiguousRuns`].
pub struct ContiguousRunsIntoIterator {
    runs: ContiguousRuns,
    range: Range<u64>,
}

macro_rules! impl_contiguous_runs_iterator {
    ($iterator_type:ty) => {
        impl Iterator for $iterator_type {
            type Item = ContiguousRun;

            fn next(&mut self) -> Option<Self::Item> {
                self.range.next().map(|index| self.runs.run(index))
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                let remaining = usize::try_from(self.range.end - self.range.start).ok();
                (remaining.unwrap_or(usize::MAX), remaining)
            }
        }

        impl DoubleEndedIterator for $iterator_type {
            fn next_back(&mut self) -> Option<Self::Item> {
                self.range.next_back().map(|index| self.runs.run(index))
            }
        }

        impl FusedIterator for $iterator_type {}
    };
}

impl_contiguous_runs_iterator!(ContiguousRunsIterator<'_>);
impl_contiguous_runs_iterator!(ContiguousRunsIntoIterator);

#[cfg(test)]
mod tests {
    use super::*;

    fn local(start: u64, stride: u64, count: u64, output_offset: u64) -> LocalRange {
        LocalRange {
            start,
            stride,
            count,
            output_offset,
        }
    }

    fn run(source_index: u64, output_index: u64, length: u64) -> ContiguousRun {
        ContiguousRun {
            source_index,
            output_index,
            length,
        }
    }

    #[test]
    fn contiguous_runs_full() {
        let runs =
            ContiguousRuns::new(&[4, 4], &[local(0, 1, 4, 0), local(0, 1, 4, 0)], &[4, 4]).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs.iter().collect::<Vec<_>>(), vec![run(0, 0, 16)]);
    }

    #[test]
    fn contiguous_runs_rows() {
        let runs =
            ContiguousRuns::new(&[4, 4], &[local(1, 1, 2, 0), local(0, 1, 4, 0)], &[2, 4]).unwrap();
        assert_eq!(runs.iter().collect::<Vec<_>>(), vec![run(4, 0, 8)]);
    }

    #[test]
    fn contiguous_runs_block() {
        let runs =
            ContiguousRuns::new(&[4, 4], &[local(1, 1, 2, 0), local(1, 1, 2, 0)], &[2, 2]).unwrap();
        assert_eq!(runs.run_length(), 2);
        assert_eq!(
            runs.iter().collect::<Vec<_>>(),
            vec![run(5, 0, 2), run(9, 2, 2)]
        );
        assert_eq!(
            runs.iter().rev().collect::<Vec<_>>(),
            vec![run(9, 2, 2), run(5, 0, 2)]
        );
    }

    #[test]
    fn contiguous_runs_strided_inner() {
        // columns 0 and 2 of rows 0..2
        let runs =
            ContiguousRuns::new(&[3, 4], &[local(0, 1, 2, 0), local(0, 2, 2, 0)], &[2, 2]).unwrap();
        assert_eq!(
            runs.into_iter().collect::<Vec<_>>(),
            vec![run(0, 0, 1), run(2, 1, 1), run(4, 2, 1), run(6, 3, 1)]
        );
    }

    #[test]
    fn contiguous_runs_strided_outer() {
        // rows 0 and 2, all columns: rows are complete but not adjacent
        let runs =
            ContiguousRuns::new(&[4, 3], &[local(0, 2, 2, 0), local(0, 1, 3, 0)], &[2, 3]).unwrap();
        assert_eq!(
            runs.iter().collect::<Vec<_>>(),
            vec![run(0, 0, 3), run(6, 3, 3)]
        );
    }

    #[test]
    fn contiguous_runs_partial_output() {
        // a complete 2x4 chunk written into the second half of a 4x4 destination
        let runs =
            ContiguousRuns::new(&[2, 4], &[local(0, 1, 2, 2), local(0, 1, 4, 0)], &[4, 4]).unwrap();
        assert_eq!(runs.iter().collect::<Vec<_>>(), vec![run(0, 8, 8)]);

        // a complete 2x2 chunk written into the right half of a 2x4 destination cannot merge rows
        let runs =
            ContiguousRuns::new(&[2, 2], &[local(0, 1, 2, 0), local(0, 1, 2, 2)], &[2, 4]).unwrap();
        assert_eq!(
            runs.iter().collect::<Vec<_>>(),
            vec![run(0, 2, 2), run(2, 6, 2)]
        );
    }

    #[test]
    fn contiguous_runs_3d() {
        let runs = ContiguousRuns::new(
            &[2, 3, 4],
            &[local(0, 1, 2, 0), local(1, 1, 2, 0), local(0, 1, 4, 0)],
            &[2, 2, 4],
        )
        .unwrap();
        assert_eq!(
            runs.iter().collect::<Vec<_>>(),
            vec![run(4, 0, 8), run(16, 8, 8)]
        );
        assert_eq!(runs.num_elements(), 16);
    }

    #[test]
    fn contiguous_runs_empty() {
        let runs =
            ContiguousRuns::new(&[4, 4], &[local(0, 1, 0, 0), local(0, 1, 4, 0)], &[0, 4]).unwrap();
        assert!(runs.is_empty());
        assert_eq!(runs.iter().next(), None);
    }

    #[test]
    fn contiguous_runs_rank_zero() {
        let runs = ContiguousRuns::new(&[], &[], &[]).unwrap();
        assert_eq!(runs.iter().collect::<Vec<_>>(), vec![run(0, 0, 1)]);
    }

    #[test]
    fn contiguous_runs_errors() {
        assert!(ContiguousRuns::new(&[4], &[local(0, 1, 4, 0)], &[4, 1]).is_err());
        assert!(ContiguousRuns::new(&[4], &[local(1, 1, 4, 0)], &[4]).is_err());
        assert!(ContiguousRuns::new(&[4], &[local(0, 1, 4, 1)], &[4]).is_err());
        assert!(ContiguousRuns::new(&[4], &[local(1, 2, 2, 0)], &[2]).is_ok());
        assert!(ContiguousRuns::new(&[4], &[local(1, 2, 3, 0)], &[3]).is_err());
    }
}
