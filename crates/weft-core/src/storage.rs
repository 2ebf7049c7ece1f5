use crate::dtype::Element;

// Storage — backend capability interface
//
// A storage backend owns a flat buffer of homogeneous elements and answers two
// questions: how to reach element `i`, and in which order it prefers its
// dimensions traversed. The second is the whole difference between the native
// (row-major) and BLAS-compatible (column-major) backends — element access is
// identical, only the preferred dimension permutation changes, and strides are
// computed against that permutation. Tensors stay layout-agnostic by always
// going through this interface.

/// The order in which a backend prefers to traverse tensor dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionOrder {
    /// Last dimension varies fastest (C order).
    RowMajor,
    /// First dimension varies fastest (Fortran/BLAS order).
    ColumnMajor,
}

/// A flat buffer of elements plus a preferred dimension order.
///
/// Backends are interchangeable behind this trait: the tensor's indexing
/// math consults `dim_order`/`reorder` so the same coordinates reach the
/// right element regardless of how the backend lays out memory.
pub trait Storage: Clone + 'static {
    /// The element type held by this storage.
    type Elem: Element;

    /// The backend's preferred traversal order.
    const ORDER: DimensionOrder;

    /// Allocate `size` elements, all set to `value`.
    fn with_size(size: usize, value: Self::Elem) -> Self;

    /// Copy a flat slice into fresh storage. The slice is interpreted in the
    /// backend's own layout (row-major for native, column-major for BLAS).
    fn from_slice(data: &[Self::Elem]) -> Self;

    /// Total number of elements in the buffer.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the element at a linear offset.
    fn get(&self, index: usize) -> Self::Elem;

    /// Write the element at a linear offset.
    fn set(&mut self, index: usize, value: Self::Elem);

    /// The whole buffer as a slice (serialization reads raw bytes from here).
    fn data(&self) -> &[Self::Elem];

    /// The permutation in which this backend prefers to traverse `count`
    /// dimensions: identity for row-major, reversed for column-major.
    fn dim_order(count: usize) -> Vec<usize> {
        match Self::ORDER {
            DimensionOrder::RowMajor => (0..count).collect(),
            DimensionOrder::ColumnMajor => (0..count).rev().collect(),
        }
    }

    /// Apply the preferred-order permutation to a slice of per-dimension
    /// values (sizes, strides, offsets).
    fn reorder<T: Copy>(values: &[T]) -> Vec<T> {
        Self::dim_order(values.len())
            .into_iter()
            .map(|i| values[i])
            .collect()
    }
}

/// Row-major storage backed by a plain `Vec`.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeStorage<T: Element> {
    data: Vec<T>,
}

impl<T: Element> Storage for NativeStorage<T> {
    type Elem = T;
    const ORDER: DimensionOrder = DimensionOrder::RowMajor;

    fn with_size(size: usize, value: T) -> Self {
        NativeStorage {
            data: vec![value; size],
        }
    }

    fn from_slice(data: &[T]) -> Self {
        NativeStorage {
            data: data.to_vec(),
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> T {
        self.data[index]
    }

    fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    fn data(&self) -> &[T] {
        &self.data
    }
}

/// Column-major storage matching the layout BLAS kernels expect.
///
/// Same element-access contract as [`NativeStorage`]; only the preferred
/// dimension order differs, which flips the stride computation and default
/// traversal order of every tensor built on it.
#[derive(Debug, Clone, PartialEq)]
pub struct BlasStorage<T: Element> {
    data: Vec<T>,
}

impl<T: Element> Storage for BlasStorage<T> {
    type Elem = T;
    const ORDER: DimensionOrder = DimensionOrder::ColumnMajor;

    fn with_size(size: usize, value: T) -> Self {
        BlasStorage {
            data: vec![value; size],
        }
    }

    fn from_slice(data: &[T]) -> Self {
        BlasStorage {
            data: data.to_vec(),
        }
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> T {
        self.data[index]
    }

    fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    fn data(&self) -> &[T] {
        &self.data
    }
}
