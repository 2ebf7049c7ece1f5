use crate::extent::Extent;
use crate::storage::DimensionOrder;

// IndexIter — lazy coordinate-tuple generator
//
// Yields every coordinate of a shape, in a chosen traversal order. The
// `dim_index` permutation decides which dimension varies fastest:
// `dim_index[0]` is incremented on every step, and overflow carries into
// `dim_index[1]`, then `dim_index[2]`, and so on.
//
// For shape [3, 2]:
//   row-major    (last dimension fastest):  [0,0] [0,1] [1,0] [1,1] [2,0] [2,1]
//   column-major (first dimension fastest): [0,0] [1,0] [2,0] [0,1] [1,1] [2,1]
//
// Iterating a tensor in its backend's preferred order visits storage
// sequentially; forcing the same explicit order on two tensors of different
// backends visits the same logical elements in the same sequence, which is
// what cross-backend equality checks rely on.
//
// The sequence is finite and not restartable: construct a fresh iterator to
// walk a shape again.

/// Iterator over all coordinate tuples of a shape in a fixed traversal order.
#[derive(Debug, Clone)]
pub struct IndexIter {
    indices: Vec<usize>,
    shape: Extent,
    dim_index: Vec<usize>,
    remaining: usize,
}

impl IndexIter {
    /// Iterate `shape` with an explicit dimension permutation.
    /// `dim_index[0]` is the fastest-varying dimension.
    pub fn with_dim_index(shape: &Extent, dim_index: Vec<usize>) -> Self {
        debug_assert_eq!(dim_index.len(), shape.count());
        IndexIter {
            indices: vec![0; shape.count()],
            remaining: if shape.dims().contains(&0) {
                0
            } else {
                shape.elements()
            },
            shape: shape.clone(),
            dim_index,
        }
    }

    /// Iterate `shape` in one of the two traversal-order presets.
    pub fn new(shape: &Extent, order: DimensionOrder) -> Self {
        let n = shape.count();
        let dim_index = match order {
            DimensionOrder::RowMajor => (0..n).rev().collect(),
            DimensionOrder::ColumnMajor => (0..n).collect(),
        };
        Self::with_dim_index(shape, dim_index)
    }

    /// Advance the fastest dimension by one, carrying into the next
    /// dimension in traversal order on overflow.
    fn advance(&mut self) {
        for &d in &self.dim_index {
            self.indices[d] += 1;
            if self.indices[d] < self.shape.dims()[d] {
                return;
            }
            self.indices[d] = 0;
        }
    }
}

impl Iterator for IndexIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let value = self.indices.clone();
        self.advance();
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IndexIter {}
