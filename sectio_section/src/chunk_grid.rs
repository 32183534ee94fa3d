//! Regular chunk grids.

use std::num::NonZeroU64;

use crate::{
    ArrayIndices, ArrayShape, ChunkShape, IncompatibleDimensionalityError, LocalRange, Section,
};

/// A regular chunk grid.
///
/// Chunks are disjoint and tile the variable shape on a regular grid defined by the chunk shape.
/// The last chunk along any dimension may extend past the variable shape, it is clipped to the variable shape.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RegularChunkGrid {
    array_shape: ArrayShape,
    chunk_shape: ChunkShape,
}

/// The intersection of a [`Section`] with one chunk of a [`RegularChunkGrid`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChunkIntersection {
    /// The origin of the chunk (the variable indices of its first element).
    pub origin: ArrayIndices,
    /// The selected ranges relative to the chunk origin.
    ///
    /// Every selected index lies within the clipped chunk extent.
    pub local_ranges: Vec<LocalRange>,
}

impl ChunkIntersection {
    /// Return the number of selected elements in the chunk.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.local_ranges.iter().map(|range| range.count).product()
    }
}

impl RegularChunkGrid {
    /// Create a new regular chunk grid.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `chunk_shape` and `array_shape` differ in dimensionality.
    pub fn new(
        array_shape: ArrayShape,
        chunk_shape: ChunkShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if array_shape.len() == chunk_shape.len() {
            Ok(Self {
                array_shape,
                chunk_shape,
            })
        } else {
            Err(IncompatibleDimensionalityError::new(
                chunk_shape.len(),
                array_shape.len(),
            ))
        }
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.array_shape.len()
    }

    /// Return the variable shape.
    #[must_use]
    pub fn array_shape(&self) -> &[u64] {
        &self.array_shape
    }

    /// Return the declared chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[NonZeroU64] {
        &self.chunk_shape
    }

    /// Return the declared chunk shape as a [`u64`] shape.
    #[must_use]
    pub fn chunk_shape_u64(&self) -> ArrayShape {
        self.chunk_shape.iter().map(|c| c.get()).collect()
    }

    /// Return the number of elements of a declared (unclipped) chunk.
    #[must_use]
    pub fn chunk_num_elements(&self) -> u64 {
        self.chunk_shape.iter().map(|c| c.get()).product()
    }

    /// Return the number of chunks along each dimension.
    #[must_use]
    pub fn grid_shape(&self) -> ArrayShape {
        std::iter::zip(&self.array_shape, &self.chunk_shape)
            .map(|(&a, c)| a.div_ceil(c.get()))
            .collect()
    }

    /// Return the origin of the chunk holding the element at `indices`.
    ///
    /// Returns [`None`] if `indices` are out of bounds or have an incompatible dimensionality.
    #[must_use]
    pub fn chunk_origin_of(&self, indices: &[u64]) -> Option<ArrayIndices> {
        if indices.len() != self.array_shape.len() {
            return None;
        }
        itertools::izip!(indices, &self.array_shape, &self.chunk_shape)
            .map(|(&i, &a, c)| (i < a).then(|| (i / c.get()) * c.get()))
            .collect()
    }

    /// Returns true if `origin` is the origin of a chunk in the grid.
    #[must_use]
    pub fn is_chunk_origin(&self, origin: &[u64]) -> bool {
        origin.len() == self.array_shape.len()
            && itertools::izip!(origin, &self.array_shape, &self.chunk_shape)
                .all(|(&o, &a, c)| o < a && o % c.get() == 0)
    }

    /// Return the extent of the chunk at `origin`, clipped to the variable shape.
    ///
    /// Returns [`None`] if `origin` is not a chunk origin.
    #[must_use]
    pub fn chunk_extent(&self, origin: &[u64]) -> Option<ArrayShape> {
        if !self.is_chunk_origin(origin) {
            return None;
        }
        Some(
            itertools::izip!(origin, &self.array_shape, &self.chunk_shape)
                .map(|(&o, &a, c)| std::cmp::min(c.get(), a - o))
                .collect(),
        )
    }

    /// Intersect `section` with the chunk at `origin`.
    ///
    /// Returns [`None`] if the chunk holds no selected element or `origin` is not a chunk origin.
    #[must_use]
    pub fn intersect(&self, section: &Section, origin: &[u64]) -> Option<ChunkIntersection> {
        if section.dimensionality() != self.dimensionality() {
            return None;
        }
        let extent = self.chunk_extent(origin)?;
        let local_ranges = itertools::izip!(section.ranges(), origin, extent)
            .map(|(range, &origin, extent)| range.localise(origin, extent))
            .collect::<Option<Vec<_>>>()?;
        Some(ChunkIntersection {
            origin: origin.to_vec(),
            local_ranges,
        })
    }

    /// Return the intersections of `section` with every chunk holding at least one selected element.
    ///
    /// Chunks are visited in C-contiguous order of their origins.
    /// The section is assumed to have been validated against the grid's variable shape.
    #[must_use]
    pub fn intersecting_chunks(&self, section: &Section) -> ChunkIntersections {
        // Per dimension, the chunk origins holding a selected index and the local range within each
        let per_dimension: Vec<Vec<(u64, LocalRange)>> =
            if section.dimensionality() == self.dimensionality() && !section.is_empty() {
                itertools::izip!(section.ranges(), &self.array_shape, &self.chunk_shape)
                    .map(|(range, &length, chunk)| {
                        let chunk = chunk.get();
                        let first = range.start() / chunk;
                        let last = range.last().map_or(first, |last| last / chunk);
                        (first..=last)
                            .filter_map(|i| {
                                let origin = i * chunk;
                                let extent = std::cmp::min(chunk, length.saturating_sub(origin));
                                range.localise(origin, extent).map(|local| (origin, local))
                            })
                            .collect()
                    })
                    .collect()
            } else {
                vec![Vec::new()]
            };
        ChunkIntersections::new(per_dimension)
    }
}

/// An iterator over the intersections of a [`Section`] with the chunks of a [`RegularChunkGrid`].
///
/// See [`RegularChunkGrid::intersecting_chunks`].
#[derive(Clone, Debug)]
pub struct ChunkIntersections {
    per_dimension: Vec<Vec<(u64, LocalRange)>>,
    counters: Vec<usize>,
    done: bool,
}

impl ChunkIntersections {
    fn new(per_dimension: Vec<Vec<(u64, LocalRange)>>) -> Self {
        let done = per_dimension.iter().any(Vec::is_empty);
        let counters = vec![0; per_dimension.len()];
        Self {
            per_dimension,
            counters,
            done,
        }
    }
}

impl Iterator for ChunkIntersections {
    type Item = ChunkIntersection;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (origin, local_ranges) = std::iter::zip(&self.per_dimension, &self.counters)
            .map(|(candidates, &i)| candidates[i])
            .unzip();
        let item = ChunkIntersection {
            origin,
            local_ranges,
        };

        // Advance, last dimension fastest
        self.done = true;
        for dim in (0..self.counters.len()).rev() {
            self.counters[dim] += 1;
            if self.counters[dim] < self.per_dimension[dim].len() {
                self.done = false;
                break;
            }
            self.counters[dim] = 0;
        }
        Some(item)
    }
}

impl std::iter::FusedIterator for ChunkIntersections {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SectionRange;

    fn nz(shape: &[u64]) -> ChunkShape {
        shape.iter().map(|&c| NonZeroU64::new(c).unwrap()).collect()
    }

    #[test]
    fn chunk_grid() {
        assert!(RegularChunkGrid::new(vec![8, 4], nz(&[4])).is_err());
        let grid = RegularChunkGrid::new(vec![10, 4], nz(&[4, 4])).unwrap();
        assert_eq!(grid.grid_shape(), vec![3, 1]);
        assert_eq!(grid.chunk_num_elements(), 16);
        assert_eq!(grid.chunk_origin_of(&[5, 3]), Some(vec![4, 0]));
        assert_eq!(grid.chunk_origin_of(&[10, 3]), None);
        assert!(grid.is_chunk_origin(&[8, 0]));
        assert!(!grid.is_chunk_origin(&[2, 0]));
        assert!(!grid.is_chunk_origin(&[12, 0]));
        assert_eq!(grid.chunk_extent(&[4, 0]), Some(vec![4, 4]));
        // partial edge chunk is clipped
        assert_eq!(grid.chunk_extent(&[8, 0]), Some(vec![2, 4]));
        assert_eq!(grid.chunk_extent(&[1, 0]), None);
    }

    #[test]
    fn chunk_grid_intersecting_chunks() {
        let grid = RegularChunkGrid::new(vec![10, 8], nz(&[4, 4])).unwrap();
        let section = Section::new_with_ranges(&[3..9, 2..6]);
        let chunks: Vec<_> = grid.intersecting_chunks(&section).collect();
        let origins: Vec<_> = chunks.iter().map(|c| c.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![
                vec![0, 0],
                vec![0, 4],
                vec![4, 0],
                vec![4, 4],
                vec![8, 0],
                vec![8, 4]
            ]
        );
        assert_eq!(chunks.iter().map(ChunkIntersection::num_elements).sum::<u64>(), 24);
        assert_eq!(
            chunks[3].local_ranges,
            vec![
                LocalRange {
                    start: 0,
                    stride: 1,
                    count: 4,
                    output_offset: 1
                },
                LocalRange {
                    start: 0,
                    stride: 1,
                    count: 2,
                    output_offset: 2
                }
            ]
        );
        assert_eq!(Some(chunks[3].clone()), grid.intersect(&section, &[4, 4]));
    }

    #[test]
    fn chunk_grid_strided_skips_chunks() {
        // selects columns 1 and 9 only, chunk [4..8) holds no selected column
        let grid = RegularChunkGrid::new(vec![2, 12], nz(&[2, 4])).unwrap();
        let section = Section::new(vec![
            SectionRange::contiguous(0, 2),
            SectionRange::new(1, 8, 2).unwrap(),
        ]);
        let origins: Vec<_> = grid
            .intersecting_chunks(&section)
            .map(|c| c.origin)
            .collect();
        assert_eq!(origins, vec![vec![0, 0], vec![0, 8]]);
        assert!(grid.intersect(&section, &[0, 4]).is_none());
    }

    #[test]
    fn chunk_grid_empty_section() {
        let grid = RegularChunkGrid::new(vec![8, 8], nz(&[4, 4])).unwrap();
        let section = Section::new_with_ranges(&[0..0, 0..8]);
        assert_eq!(grid.intersecting_chunks(&section).count(), 0);
    }
}
