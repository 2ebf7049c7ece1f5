use std::cmp::Ordering;
use std::fmt;

// Extent — n-dimensional shape descriptor
//
// An Extent is the ordered list of dimension sizes of a tensor:
//   - Vector: Extent([5])       — 1 dimension, 5 elements
//   - Matrix: Extent([3, 4])    — 2 dimensions, 12 elements
//   - Cube:   Extent([2, 3, 4]) — 3 dimensions, 24 elements
//
// Two extents are equal iff they have the same dimensions in the same order.
// Ordering compares total element counts — a [2, 3] extent sorts before a
// [4, 4] one, which is what broadcasting uses to pick the larger operand.

/// Ordered sequence of non-negative dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extent(Vec<usize>);

impl Extent {
    /// Create a new extent from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Extent(dims)
    }

    /// The zero-dimensional extent (a single element, no axes).
    pub fn scalar() -> Self {
        Extent(vec![])
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn count(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    /// A zero-dimensional extent has 1 element.
    pub fn elements(&self) -> usize {
        if self.0.is_empty() {
            1
        } else {
            self.0.iter().product()
        }
    }

    /// Number of dimensions with size > 1. Used to classify tensors as
    /// vector (1), matrix (2), or cube (3) independent of padding 1s.
    pub fn span(&self) -> usize {
        self.0.iter().filter(|&&d| d > 1).count()
    }

    /// Size of dimension `d`. Dimensions beyond `count()` report size 1,
    /// which lets shape comparisons treat [4] and [1, 4] uniformly.
    pub fn dim(&self, d: usize) -> usize {
        self.0.get(d).copied().unwrap_or(1)
    }

    /// The dimensions in reverse order (used by transpose).
    pub fn reversed(&self) -> Extent {
        Extent(self.0.iter().rev().copied().collect())
    }
}

// Ordering is by element count only; equality stays dimension-wise.
impl PartialOrd for Extent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.elements().cmp(&other.elements()))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<usize> for Extent {
    fn from(d: usize) -> Self {
        Extent(vec![d])
    }
}

impl From<(usize, usize)> for Extent {
    fn from((d0, d1): (usize, usize)) -> Self {
        Extent(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Extent {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Extent(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Extent {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Extent(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Extent {
    fn from(v: Vec<usize>) -> Self {
        Extent(v)
    }
}

impl From<&[usize]> for Extent {
    fn from(s: &[usize]) -> Self {
        Extent(s.to_vec())
    }
}

/// Dense row-major strides for an extent that has already been permuted into
/// the owning backend's preferred dimension order: the last dimension has
/// stride 1, each prior dimension's stride is the product of all following
/// sizes. Backend-specific layout comes from *which permutation* is fed in,
/// not from this function.
pub fn calculate_stride(extent: &Extent) -> Vec<usize> {
    let n = extent.count();
    let mut stride = vec![1usize; n];
    if n > 0 {
        for i in (0..n - 1).rev() {
            stride[i] = stride[i + 1] * extent.dims()[i + 1].max(1);
        }
    }
    stride
}
