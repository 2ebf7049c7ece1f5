use std::fmt;
use std::sync::{Arc, RwLock};

use num_traits::{One, Zero};
use rand::Rng;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::extent::{calculate_stride, Extent};
use crate::index::IndexIter;
use crate::storage::{DimensionOrder, Storage};

// Tensor — strided view over shared storage
//
// A tensor is four pieces of bookkeeping around a storage buffer:
//
//   view       visible shape + per-storage-dimension offset
//   stride     step sizes through storage, one per storage dimension,
//              listed in the backend's preferred dimension order
//   dim_index  permutation pairing stride slots with logical dimensions
//   fixed_dims per storage dimension: -1 if the dimension is visible,
//              otherwise the coordinate it is pinned to
//
// `window` pins length-1 result dimensions into `fixed_dims` and drops them
// from the visible shape, so a row of a matrix reads as a plain vector.
// `transpose` reverses all four tables and shares storage. `reshape` and
// `ravel` copy; a reshaped tensor never aliases its source.
//
// Storage is behind `Arc<RwLock<_>>`: clones and views alias the same buffer,
// and writes through any alias are visible to all of them.

/// Visible shape of a tensor plus its per-storage-dimension offsets.
#[derive(Debug, Clone)]
pub struct StorageView {
    pub shape: Extent,
    pub offset: Vec<usize>,
}

/// Convenience classification by span (number of non-1 dimensions).
/// Derived on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    RowVector,
    ColumnVector,
    Matrix,
    Cube,
    Tensor,
}

/// One dimension of a window selection.
#[derive(Debug, Clone, Copy)]
pub enum IndexSpec {
    /// Pin the dimension to a single coordinate (removes it from the result).
    At(usize),
    /// Half-open range `[start, end)`.
    Range(usize, usize),
    /// The whole dimension.
    All,
}

impl From<usize> for IndexSpec {
    fn from(i: usize) -> Self {
        IndexSpec::At(i)
    }
}

impl From<std::ops::Range<usize>> for IndexSpec {
    fn from(r: std::ops::Range<usize>) -> Self {
        IndexSpec::Range(r.start, r.end)
    }
}

impl From<std::ops::RangeFull> for IndexSpec {
    fn from(_: std::ops::RangeFull) -> Self {
        IndexSpec::All
    }
}

/// N-dimensional strided view over a storage backend.
#[derive(Debug)]
pub struct Tensor<S: Storage> {
    storage: Arc<RwLock<S>>,
    view: StorageView,
    dim_index: Vec<usize>,
    stride: Vec<usize>,
    fixed_dims: Vec<isize>,
}

// Clone shares storage. Use `copy_of` for a deep copy.
impl<S: Storage> Clone for Tensor<S> {
    fn clone(&self) -> Self {
        Tensor {
            storage: Arc::clone(&self.storage),
            view: self.view.clone(),
            dim_index: self.dim_index.clone(),
            stride: self.stride.clone(),
            fixed_dims: self.fixed_dims.clone(),
        }
    }
}

impl<S: Storage> Tensor<S> {
    /// Wrap freshly allocated storage in a full, contiguous view of `shape`.
    fn assemble(storage: S, shape: Extent) -> Self {
        let stride = calculate_stride(&Extent::new(S::reorder(shape.dims())));
        let rank = shape.count();
        Tensor {
            storage: Arc::new(RwLock::new(storage)),
            view: StorageView {
                shape,
                offset: vec![0; rank],
            },
            dim_index: S::dim_order(rank),
            stride,
            fixed_dims: vec![-1; rank],
        }
    }

    /// A tensor of `shape` with every element set to `value`.
    pub fn filled(shape: impl Into<Extent>, value: S::Elem) -> Self {
        let shape = shape.into();
        let storage = S::with_size(shape.elements(), value);
        Tensor::assemble(storage, shape)
    }

    /// A tensor of `shape` with every element set to zero.
    pub fn zeros(shape: impl Into<Extent>) -> Self {
        Tensor::filled(shape, S::Elem::zero())
    }

    /// A tensor of `shape` with every element set to one.
    pub fn ones(shape: impl Into<Extent>) -> Self {
        Tensor::filled(shape, S::Elem::one())
    }

    /// An empty tensor (shape `[0]`, no elements). Operator nodes use this
    /// as a placeholder until their real output shape is known.
    pub fn empty() -> Self {
        Tensor::assemble(S::with_size(0, S::Elem::zero()), Extent::from(0usize))
    }

    /// Build a tensor of `shape` from a flat slice. The slice is interpreted
    /// in the backend's own layout: row-major for the native backend,
    /// column-major for the BLAS backend.
    pub fn from_array(data: &[S::Elem], shape: impl Into<Extent>) -> Result<Self> {
        let shape = shape.into();
        if shape.elements() != data.len() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elements(),
                got: data.len(),
                shape,
            });
        }
        Ok(Tensor::assemble(S::from_slice(data), shape))
    }

    /// A 1-d vector.
    pub fn vector(data: &[S::Elem]) -> Self {
        Tensor::assemble(S::from_slice(data), Extent::from(data.len()))
    }

    /// A `[1, n]` row vector.
    pub fn row_vector(data: &[S::Elem]) -> Self {
        Tensor::assemble(S::from_slice(data), Extent::from((1, data.len())))
    }

    /// An `[n, 1]` column vector.
    pub fn column_vector(data: &[S::Elem]) -> Self {
        Tensor::assemble(S::from_slice(data), Extent::from((data.len(), 1)))
    }

    /// A matrix from nested rows. Every row must have the same length.
    pub fn from_rows(rows: &[Vec<S::Elem>]) -> Result<Self> {
        let r = rows.len();
        let c = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != c) {
            return Err(Error::msg("all rows must have the same length"));
        }
        let result = Tensor::zeros((r, c));
        let mut it = result.indices_in(DimensionOrder::RowMajor);
        for row in rows {
            for &v in row {
                if let Some(idx) = it.next() {
                    result.set(&idx, v);
                }
            }
        }
        Ok(result)
    }

    /// The `n`-by-`n` identity matrix.
    pub fn eye(n: usize) -> Self {
        let result = Tensor::zeros((n, n));
        for i in 0..n {
            result.set(&[i, i], S::Elem::one());
        }
        result
    }

    /// Reconstruct a tensor from previously captured layout tables.
    /// All per-storage-dimension tables must have the same length and
    /// `dim_index` must be a permutation of `0..rank`.
    pub fn from_parts(
        storage: S,
        shape: Extent,
        offset: Vec<usize>,
        dim_index: Vec<usize>,
        stride: Vec<usize>,
        fixed_dims: Vec<isize>,
    ) -> Result<Self> {
        let rank = stride.len();
        if offset.len() != rank || dim_index.len() != rank || fixed_dims.len() != rank {
            return Err(Error::msg("layout tables disagree on storage rank"));
        }
        let mut seen = vec![false; rank];
        for &d in &dim_index {
            if d >= rank || seen[d] {
                return Err(Error::msg("dim_index is not a permutation"));
            }
            seen[d] = true;
        }
        let visible = fixed_dims.iter().filter(|&&f| f < 0).count();
        if shape.count() != visible {
            return Err(Error::msg("shape rank disagrees with fixed_dims"));
        }

        // the largest reachable coordinate must land inside the buffer
        if shape.elements() > 0 && !shape.dims().contains(&0) {
            let mut by_dim = vec![0usize; rank];
            for (i, &d) in dim_index.iter().enumerate() {
                by_dim[d] = stride[i];
            }
            let mut j = 0;
            let mut max_pos = 0;
            for d in 0..rank {
                let coord = if fixed_dims[d] >= 0 {
                    fixed_dims[d] as usize
                } else {
                    let size = shape.dims()[j];
                    j += 1;
                    offset[d] + size - 1
                };
                max_pos += coord * by_dim[d];
            }
            if max_pos >= storage.len() {
                return Err(Error::msg("layout indexes past the storage buffer"));
            }
        }

        Ok(Tensor {
            storage: Arc::new(RwLock::new(storage)),
            view: StorageView { shape, offset },
            dim_index,
            stride,
            fixed_dims,
        })
    }

    /// The visible shape.
    pub fn shape(&self) -> &Extent {
        &self.view.shape
    }

    /// Number of visible dimensions.
    pub fn dims(&self) -> usize {
        self.view.shape.count()
    }

    /// Total number of visible elements.
    pub fn elements(&self) -> usize {
        self.view.shape.elements()
    }

    pub fn stride(&self) -> &[usize] {
        &self.stride
    }

    pub fn dim_index(&self) -> &[usize] {
        &self.dim_index
    }

    pub fn view_offset(&self) -> &[usize] {
        &self.view.offset
    }

    pub fn fixed_dims(&self) -> &[isize] {
        &self.fixed_dims
    }

    /// Run `f` against the underlying storage buffer.
    pub fn with_storage<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.storage.read().expect("storage lock poisoned");
        f(&guard)
    }

    /// Whether two tensors alias the same storage buffer.
    pub fn shares_storage(&self, other: &Tensor<S>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Map visible coordinates to a linear storage offset.
    ///
    /// Coordinates are expanded to storage rank by substituting pinned
    /// coordinates for fixed dimensions and adding the view offset to the
    /// rest; the expanded coordinates are then folded against the stride
    /// table through the `dim_index` pairing.
    pub fn offset_of(&self, indices: &[usize]) -> usize {
        debug_assert_eq!(indices.len(), self.view.shape.count());
        let rank = self.stride.len();
        let mut idx = indices.iter();
        let mut j = 0;
        let expanded: Vec<usize> = (0..rank)
            .map(|d| {
                if self.fixed_dims[d] < 0 {
                    let i = idx.next().copied().unwrap_or(0);
                    debug_assert!(i < self.view.shape.dim(j), "index {} out of range", i);
                    j += 1;
                    i + self.view.offset[d]
                } else {
                    self.fixed_dims[d] as usize
                }
            })
            .collect();
        let mut pos = 0;
        for i in 0..rank {
            pos += expanded[self.dim_index[i]] * self.stride[i];
        }
        pos
    }

    /// Read the element at the given visible coordinates.
    pub fn get(&self, indices: &[usize]) -> S::Elem {
        let pos = self.offset_of(indices);
        self.storage.read().expect("storage lock poisoned").get(pos)
    }

    /// Write the element at the given visible coordinates. Writes through
    /// views are visible to every tensor sharing the storage.
    pub fn set(&self, indices: &[usize], value: S::Elem) {
        let pos = self.offset_of(indices);
        self.storage
            .write()
            .expect("storage lock poisoned")
            .set(pos, value);
    }

    /// A zero-copy sub-view. One [`IndexSpec`] per visible dimension;
    /// every dimension whose selection has length 1 is pinned and removed
    /// from the result's shape, so `t.window(&[1.into(), (..).into()])`
    /// on a matrix yields a plain vector.
    ///
    /// Fails on an already rank-reduced view and on out-of-range selections.
    pub fn window(&self, spec: &[IndexSpec]) -> Result<Tensor<S>> {
        if self.fixed_dims.iter().any(|&f| f >= 0) {
            return Err(Error::IllegalOperation(
                "cannot take a window of a rank-reduced view".into(),
            ));
        }
        if spec.len() != self.view.shape.count() {
            return Err(Error::IllegalOperation(format!(
                "window specifies {} dimensions, tensor has {}",
                spec.len(),
                self.view.shape.count()
            )));
        }

        let mut starts = Vec::with_capacity(spec.len());
        let mut lens = Vec::with_capacity(spec.len());
        for (d, s) in spec.iter().enumerate() {
            let size = self.view.shape.dims()[d];
            let (start, len) = match *s {
                IndexSpec::At(i) => (i, 1),
                IndexSpec::Range(a, b) => (a, b.saturating_sub(a)),
                IndexSpec::All => (0, size),
            };
            if len == 0 || start + len > size {
                return Err(Error::IllegalOperation(format!(
                    "window selection out of range for dimension {} of size {}",
                    d, size
                )));
            }
            starts.push(start);
            lens.push(len);
        }

        let shape = Extent::new(lens.iter().copied().filter(|&l| l > 1).collect());
        let fixed_dims = lens
            .iter()
            .zip(&starts)
            .map(|(&l, &s)| if l == 1 { s as isize } else { -1 })
            .collect();

        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            view: StorageView {
                shape,
                offset: starts,
            },
            dim_index: self.dim_index.clone(),
            stride: self.stride.clone(),
            fixed_dims,
        })
    }

    /// Write `value` into the selected window, broadcasting it to the
    /// window's shape first.
    pub fn set_window(&self, spec: &[IndexSpec], value: &Tensor<S>) -> Result<()> {
        let view = self.window(spec)?;
        let bvalue = broadcast_to(value, view.shape())?;
        crate::numeric::copy_into(&bvalue, &view)
    }

    /// The transposed view: shared storage, all layout tables reversed.
    /// A no-op for vectors and scalars.
    pub fn transpose(&self) -> Tensor<S> {
        if self.view.shape.count() <= 1 {
            return self.clone();
        }
        Tensor {
            storage: Arc::clone(&self.storage),
            view: StorageView {
                shape: self.view.shape.reversed(),
                offset: self.view.offset.iter().rev().copied().collect(),
            },
            dim_index: self.dim_index.iter().rev().copied().collect(),
            stride: self.stride.clone(),
            fixed_dims: self.fixed_dims.iter().rev().copied().collect(),
        }
    }

    /// Shorthand for [`Tensor::transpose`].
    pub fn t(&self) -> Tensor<S> {
        self.transpose()
    }

    /// Copy this tensor's elements, in natural traversal order, into a
    /// fresh contiguous buffer laid out for `shape`.
    fn contiguous_copy(&self, shape: Extent) -> Tensor<S> {
        let mut storage = S::with_size(self.view.shape.elements(), S::Elem::zero());
        for (j, idx) in self.indices().enumerate() {
            storage.set(j, self.get(&idx));
        }
        Tensor::assemble(storage, shape)
    }

    /// A copy of this tensor with a new shape. The element count must be
    /// unchanged. Always copies; the result never aliases the source.
    pub fn reshape(&self, shape: impl Into<Extent>) -> Result<Tensor<S>> {
        let shape = shape.into();
        if shape.elements() != self.view.shape.elements() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elements(),
                got: self.view.shape.elements(),
                shape,
            });
        }
        Ok(self.contiguous_copy(shape))
    }

    /// Flatten to a 1-d copy. Like [`Tensor::reshape`], never aliases.
    pub fn ravel(&self) -> Tensor<S> {
        let n = self.view.shape.elements();
        self.contiguous_copy(Extent::from(n))
    }

    /// Discard the current contents and re-point this tensor at a fresh
    /// zeroed buffer of `shape`. Detaches from any shared storage.
    /// A no-op when the shape already matches.
    pub fn resize(&mut self, shape: impl Into<Extent>) {
        let shape = shape.into();
        if self.view.shape != shape {
            *self = Tensor::zeros(shape);
        }
    }

    /// Iterate all visible coordinates in the backend's preferred order.
    /// This order visits storage sequentially for contiguous tensors.
    pub fn indices(&self) -> IndexIter {
        IndexIter::new(&self.view.shape, S::ORDER)
    }

    /// Iterate all visible coordinates in an explicit order. Two tensors of
    /// different backends yield the same coordinate sequence for the same
    /// shape and order.
    pub fn indices_in(&self, order: DimensionOrder) -> IndexIter {
        IndexIter::new(&self.view.shape, order)
    }

    /// Classify by span: one non-1 dimension is a vector (row if the first
    /// size exceeds 1, column otherwise), two a matrix, three a cube.
    pub fn tensor_type(&self) -> TensorType {
        match self.view.shape.span() {
            1 => {
                if self.view.shape.dim(0) > 1 {
                    TensorType::RowVector
                } else {
                    TensorType::ColumnVector
                }
            }
            2 => TensorType::Matrix,
            3 => TensorType::Cube,
            _ => TensorType::Tensor,
        }
    }
}

impl<S: Storage> Tensor<S>
where
    S::Elem: crate::dtype::FloatElement,
{
    /// A tensor of `shape` with elements drawn uniformly from `[0, 1)`.
    pub fn rand(shape: impl Into<Extent>) -> Self {
        let shape = shape.into();
        let mut rng = rand::thread_rng();
        let result = Tensor::zeros(shape);
        for idx in result.indices() {
            result.set(&idx, S::Elem::from_f64(rng.gen::<f64>()));
        }
        result
    }

    /// A tensor of `shape` with elements drawn from the standard normal
    /// distribution (Box-Muller transform).
    pub fn randn(shape: impl Into<Extent>) -> Self {
        let shape = shape.into();
        let mut rng = rand::thread_rng();
        let result = Tensor::zeros(shape);
        for idx in result.indices() {
            let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = rng.gen();
            let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            result.set(&idx, S::Elem::from_f64(z));
        }
        result
    }
}

// Equality is shape plus element-wise comparison in a fixed logical order,
// so it holds across backends and across views of different layouts.
impl<S: Storage> PartialEq for Tensor<S> {
    fn eq(&self, other: &Self) -> bool {
        if self.view.shape != other.view.shape {
            return false;
        }
        self.indices_in(DimensionOrder::RowMajor)
            .all(|idx| self.get(&idx) == other.get(&idx))
    }
}

fn fmt_axis<S: Storage>(
    tensor: &Tensor<S>,
    prefix: &mut Vec<usize>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let d = prefix.len();
    if d == tensor.dims() {
        return write!(f, "{}", tensor.get(prefix));
    }
    write!(f, "[")?;
    for i in 0..tensor.shape().dims()[d] {
        if i > 0 {
            write!(f, ", ")?;
        }
        prefix.push(i);
        fmt_axis(tensor, prefix, f)?;
        prefix.pop();
    }
    write!(f, "]")
}

impl<S: Storage> fmt::Display for Tensor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_axis(self, &mut Vec::new(), f)
    }
}

// The stride serving storage dimension `d` lives at the slot `i` where
// `dim_index[i] == d`. Inverting that pairing gives one stride per storage
// dimension, in storage-dimension order.
fn strides_by_dim<S: Storage>(tensor: &Tensor<S>) -> Vec<usize> {
    let mut by_dim = vec![0usize; tensor.stride.len()];
    for (i, &d) in tensor.dim_index.iter().enumerate() {
        by_dim[d] = tensor.stride[i];
    }
    by_dim
}

// Collapse a view into (base offset, one stride per visible dimension):
// pinned coordinates and per-dimension view offsets fold into the base,
// leaving only the strides the visible coordinates multiply against.
fn collapse_view<S: Storage>(tensor: &Tensor<S>) -> (usize, Vec<usize>) {
    let by_dim = strides_by_dim(tensor);
    let mut base = 0;
    let mut visible = Vec::with_capacity(tensor.dims());
    for (d, &stride) in by_dim.iter().enumerate() {
        if tensor.fixed_dims[d] >= 0 {
            base += tensor.fixed_dims[d] as usize * stride;
        } else {
            base += tensor.view.offset[d] * stride;
            visible.push(stride);
        }
    }
    (base, visible)
}

/// Per-target-dimension strides that map coordinates of `shape` onto
/// `tensor`'s storage, repeating `tensor` along broadcast dimensions.
///
/// Dimensions align at the trailing end; each source dimension must either
/// match the target or have size 1, in which case its stride becomes 0 so
/// every coordinate along it reads the same element. The strides are
/// relative to the source view's base offset, so windowed and rank-reduced
/// sources broadcast correctly.
pub fn broadcast_stride<S: Storage>(tensor: &Tensor<S>, shape: &Extent) -> Result<Vec<usize>> {
    if tensor.shape().count() > shape.count() {
        return Err(Error::SizeMismatch {
            lhs: tensor.shape().clone(),
            rhs: shape.clone(),
        });
    }

    let (_, source) = collapse_view(tensor);
    let mut stride = vec![0usize; shape.count()];
    let start = shape.count() - tensor.shape().count();

    for i in 0..tensor.shape().count() {
        if shape.dim(i + start) == tensor.shape().dim(i) {
            stride[i + start] = source[i];
        } else if tensor.shape().dim(i) != 1 {
            return Err(Error::SizeMismatch {
                lhs: tensor.shape().clone(),
                rhs: shape.clone(),
            });
        }
    }

    Ok(stride)
}

/// A view of `tensor` expanded to `shape` without copying. Broadcast
/// dimensions read the same storage element repeatedly; writing through a
/// broadcast view is not meaningful.
pub fn broadcast_to<S: Storage>(tensor: &Tensor<S>, shape: &Extent) -> Result<Tensor<S>> {
    let stride = broadcast_stride(tensor, shape)?;
    let (base, _) = collapse_view(tensor);
    let rank = shape.count();

    // one pinned extra storage dimension carries the collapsed base offset
    let mut full_stride = stride;
    full_stride.push(1);
    let mut fixed_dims = vec![-1isize; rank];
    fixed_dims.push(base as isize);

    Ok(Tensor {
        storage: Arc::clone(&tensor.storage),
        view: StorageView {
            shape: shape.clone(),
            offset: vec![0; rank + 1],
        },
        dim_index: (0..=rank).collect(),
        stride: full_stride,
        fixed_dims,
    })
}

/// Broadcast the smaller of two tensors (by element count) to the shape of
/// the larger one.
pub fn broadcast_pair<S: Storage>(
    left: &Tensor<S>,
    right: &Tensor<S>,
) -> Result<(Tensor<S>, Tensor<S>)> {
    if left.shape() < right.shape() {
        Ok((broadcast_to(left, right.shape())?, right.clone()))
    } else {
        Ok((left.clone(), broadcast_to(right, left.shape())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlasStorage, NativeStorage};

    type T = Tensor<NativeStorage<f64>>;
    type BT = Tensor<BlasStorage<f64>>;

    fn iota(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    // Rearrange row-major data into the column-major layout the BLAS
    // backend expects, so both backends hold the same logical values.
    fn as_column_major(data: &[f64], rows: usize, cols: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(data.len());
        for c in 0..cols {
            for r in 0..rows {
                out.push(data[r * cols + c]);
            }
        }
        out
    }

    #[test]
    fn test_native_storage_is_row_major() {
        let t = T::from_array(&iota(20), (2, 10)).unwrap();
        for (i, idx) in t.indices().enumerate() {
            assert_eq!(t.offset_of(&idx), i);
            assert_eq!(t.get(&idx), i as f64);
        }
    }

    #[test]
    fn test_blas_storage_is_column_major() {
        let data = as_column_major(&iota(10), 2, 5);
        let t = BT::from_array(&data, (2, 5)).unwrap();
        // natural traversal walks the column-major buffer sequentially
        for (i, idx) in t.indices().enumerate() {
            assert_eq!(t.offset_of(&idx), i);
        }
        // logical values still read row-major
        assert_eq!(t.get(&[0, 1]), 1.0);
        assert_eq!(t.get(&[1, 0]), 5.0);
    }

    #[test]
    fn test_backends_agree_in_explicit_order() {
        let native = T::from_array(&iota(10), (2, 5)).unwrap();
        let blas = BT::from_array(&as_column_major(&iota(10), 2, 5), (2, 5)).unwrap();
        for idx in native.indices_in(DimensionOrder::RowMajor) {
            assert_eq!(native.get(&idx), blas.get(&idx));
        }
    }

    #[test]
    fn test_window_offsets() {
        let t = T::from_array(&iota(100), (10, 10)).unwrap();
        let w = t.window(&[(5..10).into(), (5..10).into()]).unwrap();
        assert_eq!(w.shape(), &Extent::from((5, 5)));

        let expected: Vec<usize> = (5..10).flat_map(|r| (5..10).map(move |c| r * 10 + c)).collect();
        let got: Vec<usize> = w.indices().map(|idx| w.offset_of(&idx)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_window_squeezes_unit_dimensions() {
        let t = T::zeros((3, 5));
        let row = t.window(&[0.into(), (..).into()]).unwrap();
        assert_eq!(row.shape(), &Extent::from(5usize));
        assert_eq!(row.fixed_dims(), &[0, -1]);

        let col = t.window(&[(..).into(), 1.into()]).unwrap();
        assert_eq!(col.shape(), &Extent::from(3usize));
        assert_eq!(col.offset_of(&[2]), 2 * 5 + 1);
    }

    #[test]
    fn test_window_of_window_is_rejected() {
        let t = T::zeros((3, 5));
        let row = t.window(&[0.into(), (..).into()]).unwrap();
        assert!(matches!(
            row.window(&[(1..3).into()]),
            Err(Error::IllegalOperation(_))
        ));
    }

    #[test]
    fn test_window_out_of_range_is_rejected() {
        let t = T::zeros((3, 5));
        assert!(t.window(&[(..).into(), (4..9).into()]).is_err());
        assert!(t.window(&[3.into(), (..).into()]).is_err());
    }

    #[test]
    fn test_window_writes_through() {
        let t = T::zeros((3, 5));
        let block = t.window(&[(1..3).into(), (2..5).into()]).unwrap();
        for idx in block.indices() {
            block.set(&idx, 3.0);
        }
        assert_eq!(t.get(&[0, 0]), 0.0);
        assert_eq!(t.get(&[1, 2]), 3.0);
        assert_eq!(t.get(&[2, 4]), 3.0);
    }

    #[test]
    fn test_set_window_broadcasts_value() {
        let t = T::zeros((3, 5));
        t.set_window(&[(1..2).into(), (..).into()], &T::filled(1usize, 2.0))
            .unwrap();
        for c in 0..5 {
            assert_eq!(t.get(&[1, c]), 2.0);
            assert_eq!(t.get(&[0, c]), 0.0);
        }
    }

    #[test]
    fn test_transpose_view() {
        let t = T::from_array(&iota(10), (2, 5)).unwrap();
        let tt = t.transpose();
        assert_eq!(tt.shape(), &Extent::from((5, 2)));
        for r in 0..2 {
            for c in 0..5 {
                assert_eq!(t.get(&[r, c]), tt.get(&[c, r]));
            }
        }
        // transposing twice restores the original view
        assert_eq!(tt.transpose(), t);
        // shared storage: writes through the transpose are visible
        tt.set(&[4, 1], 99.0);
        assert_eq!(t.get(&[1, 4]), 99.0);
    }

    #[test]
    fn test_transpose_vector_is_identity() {
        let t = T::vector(&[1.0, 2.0, 3.0]);
        assert_eq!(t.transpose().shape(), t.shape());
    }

    #[test]
    fn test_reshape_copies() {
        let t = T::from_array(&iota(6), (2, 3)).unwrap();
        let r = t.reshape((3, 2)).unwrap();
        assert_eq!(r.shape(), &Extent::from((3, 2)));
        assert!(!r.shares_storage(&t));
        r.set(&[0, 0], 42.0);
        assert_eq!(t.get(&[0, 0]), 0.0);
        assert_eq!(r.get(&[2, 1]), 5.0);
    }

    #[test]
    fn test_reshape_count_mismatch() {
        let t = T::zeros((2, 3));
        assert!(matches!(
            t.reshape((4, 2)),
            Err(Error::ElementCountMismatch { .. })
        ));
    }

    #[test]
    fn test_ravel_is_a_copy() {
        let t = T::from_array(&iota(6), (2, 3)).unwrap();
        let r = t.ravel();
        assert_eq!(r.shape(), &Extent::from(6usize));
        assert!(!r.shares_storage(&t));
        assert_eq!(r.get(&[4]), 4.0);
    }

    #[test]
    fn test_ravel_of_transpose_follows_view_order() {
        let t = T::from_array(&iota(6), (2, 3)).unwrap();
        let r = t.transpose().ravel();
        let got: Vec<f64> = (0..6).map(|i| r.get(&[i])).collect();
        assert_eq!(got, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_resize_detaches_storage() {
        let mut t = T::from_array(&iota(6), (2, 3)).unwrap();
        let alias = t.clone();
        t.resize((4, 4));
        assert_eq!(t.shape(), &Extent::from((4, 4)));
        assert_eq!(t.get(&[0, 0]), 0.0);
        assert!(!t.shares_storage(&alias));
        assert_eq!(alias.get(&[1, 2]), 5.0);
    }

    #[test]
    fn test_from_rows() {
        let t = T::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(t.get(&[0, 1]), 2.0);
        assert_eq!(t.get(&[1, 0]), 3.0);
        assert!(T::from_rows(&[vec![1.0], vec![2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_eye() {
        let t = T::eye(3);
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(t.get(&[r, c]), if r == c { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_tensor_type() {
        // classification keys on the first dimension's size: span-1 shapes
        // whose dimension 0 exceeds 1 read as row vectors
        assert_eq!(T::vector(&[1.0, 2.0]).tensor_type(), TensorType::RowVector);
        assert_eq!(
            T::column_vector(&[1.0, 2.0]).tensor_type(),
            TensorType::RowVector
        );
        assert_eq!(
            T::row_vector(&[1.0, 2.0]).tensor_type(),
            TensorType::ColumnVector
        );
        assert_eq!(T::zeros((2, 2)).tensor_type(), TensorType::Matrix);
        assert_eq!(T::zeros((2, 2, 2)).tensor_type(), TensorType::Cube);
        assert_eq!(T::zeros((2, 2, 2, 2)).tensor_type(), TensorType::Tensor);
    }

    #[test]
    fn test_broadcast_row_vector() {
        let v = T::row_vector(&[1.0, 2.0, 3.0, 4.0]);
        let b = broadcast_to(&v, &Extent::from((3, 4))).unwrap();
        for r in 0..3 {
            for c in 0..4 {
                assert_eq!(b.get(&[r, c]), (c + 1) as f64);
            }
        }
    }

    #[test]
    fn test_broadcast_column_vector() {
        let v = T::column_vector(&[1.0, 2.0, 3.0]);
        let b = broadcast_to(&v, &Extent::from((3, 4))).unwrap();
        for r in 0..3 {
            for c in 0..4 {
                assert_eq!(b.get(&[r, c]), (r + 1) as f64);
            }
        }
    }

    #[test]
    fn test_broadcast_vector_adds_leading_dimension() {
        let v = T::vector(&[1.0, 2.0, 3.0, 4.0]);
        let b = broadcast_to(&v, &Extent::from((3, 4))).unwrap();
        assert_eq!(b.get(&[2, 1]), 2.0);
    }

    #[test]
    fn test_broadcast_blas_backend() {
        let v = BT::row_vector(&[1.0, 2.0, 3.0, 4.0]);
        let b = broadcast_to(&v, &Extent::from((3, 4))).unwrap();
        for r in 0..3 {
            for c in 0..4 {
                assert_eq!(b.get(&[r, c]), (c + 1) as f64);
            }
        }
    }

    #[test]
    fn test_broadcast_windowed_row() {
        let t = T::from_array(&iota(15), (3, 5)).unwrap();
        let row = t.window(&[1.into(), (..).into()]).unwrap();
        let b = broadcast_to(&row, &Extent::from((2, 5))).unwrap();
        for r in 0..2 {
            for c in 0..5 {
                assert_eq!(b.get(&[r, c]), (5 + c) as f64);
            }
        }
    }

    #[test]
    fn test_broadcast_windowed_row_blas() {
        let t = BT::from_array(&as_column_major(&iota(15), 3, 5), (3, 5)).unwrap();
        let row = t.window(&[1.into(), (..).into()]).unwrap();
        let b = broadcast_to(&row, &Extent::from((2, 5))).unwrap();
        for r in 0..2 {
            for c in 0..5 {
                assert_eq!(b.get(&[r, c]), (5 + c) as f64);
            }
        }
    }

    #[test]
    fn test_broadcast_block_window() {
        let t = T::from_array(&iota(20), (4, 5)).unwrap();
        let block = t.window(&[(1..3).into(), (2..5).into()]).unwrap();
        let b = broadcast_to(&block, &Extent::from((2, 2, 3))).unwrap();
        for k in 0..2 {
            for r in 0..2 {
                for c in 0..3 {
                    assert_eq!(b.get(&[k, r, c]), ((r + 1) * 5 + c + 2) as f64);
                }
            }
        }
    }

    #[test]
    fn test_set_window_from_windowed_value() {
        let src = T::from_array(&iota(15), (3, 5)).unwrap();
        let row = src.window(&[2.into(), (..).into()]).unwrap();

        let dst = T::zeros((4, 5));
        dst.set_window(&[(1..3).into(), (..).into()], &row).unwrap();
        for c in 0..5 {
            assert_eq!(dst.get(&[0, c]), 0.0);
            assert_eq!(dst.get(&[1, c]), (10 + c) as f64);
            assert_eq!(dst.get(&[2, c]), (10 + c) as f64);
            assert_eq!(dst.get(&[3, c]), 0.0);
        }
    }

    #[test]
    fn test_broadcast_incompatible() {
        let v = T::vector(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            broadcast_to(&v, &Extent::from((3, 4))),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_broadcast_pair_picks_larger() {
        let a = T::zeros((3, 4));
        let b = T::row_vector(&[1.0, 2.0, 3.0, 4.0]);
        let (x, y) = broadcast_pair(&a, &b).unwrap();
        assert_eq!(x.shape(), &Extent::from((3, 4)));
        assert_eq!(y.shape(), &Extent::from((3, 4)));
    }

    #[test]
    fn test_from_parts_rejects_out_of_bounds_layout() {
        // stride walks past the 6-element buffer
        let r = T::from_parts(
            NativeStorage::from_slice(&iota(6)),
            Extent::from((2, 3)),
            vec![0, 0],
            vec![0, 1],
            vec![10, 1],
            vec![-1, -1],
        );
        assert!(r.is_err());

        // offset pushes an otherwise valid layout out of range
        let r = T::from_parts(
            NativeStorage::from_slice(&iota(6)),
            Extent::from((2, 3)),
            vec![1, 0],
            vec![0, 1],
            vec![3, 1],
            vec![-1, -1],
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_randn_produces_varied_finite_values() {
        let t = T::randn((8, 8));
        let mut values = Vec::new();
        for idx in t.indices() {
            let v = t.get(&idx);
            assert!(v.is_finite());
            values.push(v);
        }
        assert!(values.iter().any(|&v| v != values[0]));
    }

    #[test]
    fn test_display() {
        let t = T::vector(&[1.0, 2.0, 3.0]);
        assert_eq!(format!("{}", t), "[1, 2, 3]");
        let m = T::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(format!("{}", m), "[[1, 2], [3, 4]]");
    }
}
