//! Section iterators.
//!
//! [`ContiguousRuns`] iterates over maximal runs of selected elements that are contiguous in both
//! the addressed source (a whole variable or a chunk) and the destination.

mod contiguous_runs_iterator;

pub use contiguous_runs_iterator::{
    ContiguousRun, ContiguousRuns, ContiguousRunsIntoIterator, ContiguousRunsIterator,
};
