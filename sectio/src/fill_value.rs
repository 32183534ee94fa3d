//! Fill values.
//!
//! Elements that are logically present but physically absent (missing chunks, variables without data) read as
//! the fill value. Without a declared fill value, elements read as zero bytes.

use serde::{Deserialize, Serialize};

/// A fill value.
///
/// The raw bytes of one element.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<&[u8]> for FillValue {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for FillValue {
    fn from(value: [u8; N]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl FillValue {
    /// Create a new fill value from the raw bytes of one element.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Overwrite `bytes` with a repeated sequence of the fill value.
    ///
    /// `bytes` should have a length that is a multiple of the fill value size, a trailing partial element
    /// receives the leading fill value bytes.
    pub fn fill(&self, bytes: &mut [u8]) {
        match self.0.as_slice() {
            [] => {}
            [byte] => bytes.fill(*byte),
            fill_value => {
                for element in bytes.chunks_mut(fill_value.len()) {
                    element.copy_from_slice(&fill_value[..element.len()]);
                }
            }
        }
    }
}

/// Fill `bytes` with `fill_value`, or zeros if there is no fill value.
fn fill_bytes(bytes: &mut [u8], fill_value: Option<&FillValue>) {
    match fill_value {
        Some(fill_value) => fill_value.fill(bytes),
        None => bytes.fill(0),
    }
}

/// Materialise `count` elements of `element_size` bytes holding the fill value.
///
/// Without a fill value, the elements are zero.
#[must_use]
pub fn materialize(element_size: usize, fill_value: Option<&FillValue>, count: usize) -> Vec<u8> {
    let size = element_size * count;
    match fill_value {
        Some(fill_value) if fill_value.as_ne_bytes().iter().any(|&byte| byte != 0) => {
            let mut bytes = vec![0; size];
            fill_value.fill(&mut bytes);
            bytes
        }
        _ => vec![0; size],
    }
}

/// Write the fill value into the `(destination, run_length)` element runs of `output`.
///
/// # Panics
/// Panics if a run exceeds `output`.
pub fn fill_runs(
    output: &mut [u8],
    element_size: usize,
    fill_value: Option<&FillValue>,
    runs: impl IntoIterator<Item = (u64, u64)>,
) {
    for (destination, run_length) in runs {
        let start = usize::try_from(destination).unwrap() * element_size;
        let length = usize::try_from(run_length).unwrap() * element_size;
        fill_bytes(&mut output[start..start + length], fill_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value() {
        let fill_value = FillValue::from([1u8, 2]);
        assert_eq!(fill_value.size(), 2);
        assert_eq!(fill_value.to_string(), "[1, 2]");
        let mut bytes = [0u8; 6];
        fill_value.fill(&mut bytes);
        assert_eq!(bytes, [1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn fill_value_materialize() {
        assert_eq!(materialize(2, None, 3), vec![0; 6]);
        assert_eq!(
            materialize(2, Some(&FillValue::from([0u8, 0])), 2),
            vec![0; 4]
        );
        assert_eq!(
            materialize(4, Some(&FillValue::from(7u32.to_le_bytes())), 2),
            vec![7, 0, 0, 0, 7, 0, 0, 0]
        );
        assert!(materialize(4, None, 0).is_empty());
    }

    #[test]
    fn fill_value_fill_runs() {
        let mut output = vec![9u8; 8];
        fill_runs(&mut output, 2, Some(&FillValue::from([1u8, 2])), [(0, 1), (2, 2)]);
        assert_eq!(output, vec![1, 2, 9, 9, 1, 2, 1, 2]);
        fill_runs(&mut output, 2, None, [(1, 1)]);
        assert_eq!(output, vec![1, 2, 0, 0, 1, 2, 1, 2]);
    }
}
