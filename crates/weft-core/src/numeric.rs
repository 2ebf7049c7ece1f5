use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::extent::Extent;
use crate::storage::{DimensionOrder, Storage};
use crate::tensor::Tensor;

// Free numeric algorithms over tensors.
//
// Everything here iterates through the index generator, never through raw
// storage, so the same code serves both backends and any view (windowed,
// transposed, broadcast) of either.

/// Copy by generation sequence: the i-th element of `from`'s natural
/// traversal is written to the i-th coordinate of `to`'s natural traversal.
/// Only the element counts must match; shapes may differ.
pub fn copy_seq<S: Storage>(from: &Tensor<S>, to: &Tensor<S>) -> Result<()> {
    if from.elements() != to.elements() {
        return Err(Error::SizeMismatch {
            lhs: from.shape().clone(),
            rhs: to.shape().clone(),
        });
    }
    for (i, j) in from.indices().zip(to.indices()) {
        to.set(&j, from.get(&i));
    }
    Ok(())
}

/// Copy between tensors of equal shape.
pub fn copy_into<S: Storage>(from: &Tensor<S>, to: &Tensor<S>) -> Result<()> {
    if from.shape() != to.shape() {
        return Err(Error::SizeMismatch {
            lhs: from.shape().clone(),
            rhs: to.shape().clone(),
        });
    }
    copy_seq(from, to)
}

/// A deep copy with fresh contiguous storage and the same shape.
pub fn copy_of<S: Storage>(tensor: &Tensor<S>) -> Tensor<S> {
    let result = Tensor::zeros(tensor.shape().clone());
    for (i, j) in tensor.indices().zip(result.indices()) {
        result.set(&j, tensor.get(&i));
    }
    result
}

/// Assign `value` to every element, through whatever view `tensor` is.
pub fn fill<S: Storage>(tensor: &Tensor<S>, value: S::Elem) {
    for idx in tensor.indices() {
        tensor.set(&idx, value);
    }
}

/// Element-wise function application into a fresh tensor of the same shape.
pub fn map<S: Storage>(tensor: &Tensor<S>, f: impl Fn(S::Elem) -> S::Elem) -> Tensor<S> {
    let result = Tensor::zeros(tensor.shape().clone());
    for idx in tensor.indices() {
        result.set(&idx, f(tensor.get(&idx)));
    }
    result
}

/// Concatenate along `axis` into `dest`, or into a fresh tensor when `dest`
/// is `None`. The result's shape matches the inputs except that `axis` is
/// the sum of both sizes; `a`'s elements are written first (in `a`'s natural
/// order), then `b`'s.
pub fn concat_into<S: Storage>(
    a: &Tensor<S>,
    b: &Tensor<S>,
    axis: usize,
    dest: Option<Tensor<S>>,
) -> Result<Tensor<S>> {
    let rank = a.dims().max(b.dims());
    if axis >= rank {
        return Err(Error::IllegalAxis { axis, rank });
    }
    for d in 0..rank {
        if d != axis && a.shape().dim(d) != b.shape().dim(d) {
            return Err(Error::SizeMismatch {
                lhs: a.shape().clone(),
                rhs: b.shape().clone(),
            });
        }
    }

    let shape = Extent::new(
        (0..rank)
            .map(|d| {
                if d == axis {
                    a.shape().dim(d) + b.shape().dim(d)
                } else {
                    a.shape().dim(d)
                }
            })
            .collect(),
    );
    let result = match dest {
        Some(t) => {
            if t.shape() != &shape {
                return Err(Error::SizeMismatch {
                    lhs: t.shape().clone(),
                    rhs: shape,
                });
            }
            t
        }
        None => Tensor::zeros(shape),
    };

    let mut out = result.indices();
    for idx in a.indices() {
        if let Some(j) = out.next() {
            result.set(&j, a.get(&idx));
        }
    }
    for idx in b.indices() {
        if let Some(j) = out.next() {
            result.set(&j, b.get(&idx));
        }
    }
    Ok(result)
}

/// Concatenate two tensors along `axis` into a fresh tensor.
pub fn concat<S: Storage>(a: &Tensor<S>, b: &Tensor<S>, axis: usize) -> Result<Tensor<S>> {
    concat_into(a, b, axis, None)
}

/// N-ary concatenation as repeated pairwise concat.
pub fn concat_all<S: Storage>(tensors: &[Tensor<S>], axis: usize) -> Result<Tensor<S>> {
    let (first, rest) = match tensors.split_first() {
        Some(split) => split,
        None => return Err(Error::msg("cannot concatenate an empty list of tensors")),
    };
    let mut result = first.clone();
    for t in rest {
        result = concat(&result, t, axis)?;
    }
    Ok(result)
}

/// Stack vertically (concatenate along axis 0).
pub fn vstack<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    concat(a, b, 0)
}

/// Stack horizontally (concatenate along axis 1).
pub fn hstack<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    concat(a, b, 1)
}

/// Whether two same-shaped tensors agree element-wise within `eps`,
/// compared in a fixed logical order so backends may differ.
pub fn is_close<S: Storage>(a: &Tensor<S>, b: &Tensor<S>, eps: f64) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    a.indices_in(DimensionOrder::RowMajor)
        .all(|idx| (a.get(&idx).to_f64() - b.get(&idx).to_f64()).abs() < eps)
}
