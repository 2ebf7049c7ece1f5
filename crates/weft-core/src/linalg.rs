use num_traits::{Float, Zero};

use crate::bail;
use crate::dtype::FloatElement;
use crate::error::{Error, Result};
use crate::extent::Extent;
use crate::numeric::map;
use crate::storage::Storage;
use crate::tensor::{broadcast_pair, broadcast_to, Tensor};

// Linear-algebra free functions.
//
// All element access goes through coordinates, so every function accepts
// windows, transposes, and broadcast views as freely as contiguous tensors.
// Operands of different shapes are reconciled by broadcasting where the
// operation is element-wise.

/// Element-wise sum with broadcasting. Returns a fresh tensor.
pub fn add<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    let (x, y) = broadcast_pair(a, b)?;
    let result = Tensor::zeros(x.shape().clone());
    for idx in result.indices() {
        result.set(&idx, x.get(&idx) + y.get(&idx));
    }
    Ok(result)
}

/// Element-wise sum into an existing destination of the broadcast shape.
pub fn add_into<S: Storage>(a: &Tensor<S>, b: &Tensor<S>, to: &Tensor<S>) -> Result<()> {
    let (x, y) = broadcast_pair(a, b)?;
    if to.shape() != x.shape() {
        return Err(Error::SizeMismatch {
            lhs: to.shape().clone(),
            rhs: x.shape().clone(),
        });
    }
    for idx in to.indices() {
        to.set(&idx, x.get(&idx) + y.get(&idx));
    }
    Ok(())
}

/// In-place accumulate: `to += from`, broadcasting `from` to `to`'s shape.
pub fn iadd<S: Storage>(to: &Tensor<S>, from: &Tensor<S>) -> Result<()> {
    let b = broadcast_to(from, to.shape())?;
    for idx in to.indices() {
        to.set(&idx, to.get(&idx) + b.get(&idx));
    }
    Ok(())
}

/// Element-wise difference with broadcasting.
pub fn sub<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    let (x, y) = broadcast_pair(a, b)?;
    let result = Tensor::zeros(x.shape().clone());
    for idx in result.indices() {
        result.set(&idx, x.get(&idx) - y.get(&idx));
    }
    Ok(result)
}

/// Element-wise (Hadamard) product with broadcasting.
pub fn mul<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    let (x, y) = broadcast_pair(a, b)?;
    let result = Tensor::zeros(x.shape().clone());
    for idx in result.indices() {
        result.set(&idx, x.get(&idx) * y.get(&idx));
    }
    Ok(result)
}

/// Multiply every element by a scalar.
pub fn mul_scalar<S: Storage>(t: &Tensor<S>, s: S::Elem) -> Tensor<S> {
    map(t, |v| v * s)
}

/// Inner product of two vectors (any mix of 1-d, row, and column shapes).
pub fn vdot<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<S::Elem> {
    if a.shape().span() > 1 || b.shape().span() > 1 {
        return Err(Error::IllegalOperation(
            "vdot requires vector operands".into(),
        ));
    }
    if a.elements() != b.elements() {
        return Err(Error::SizeMismatch {
            lhs: a.shape().clone(),
            rhs: b.shape().clone(),
        });
    }
    let mut acc = S::Elem::zero();
    for (i, j) in a.indices().zip(b.indices()) {
        acc = acc + a.get(&i) * b.get(&j);
    }
    Ok(acc)
}

// Read a 1-d or 2-d operand as a matrix element. A 1-d tensor is treated
// as a column, so only its row coordinate applies.
fn mat_get<S: Storage>(t: &Tensor<S>, r: usize, c: usize) -> S::Elem {
    match t.dims() {
        0 => t.get(&[]),
        1 => t.get(&[r]),
        _ => t.get(&[r, c]),
    }
}

/// Matrix product with standard inner-product semantics.
///
/// Accepts vector·vector (yielding a 0-d scalar tensor), matrix·vector
/// (a 1-d tensor is treated as a column), and matrix·matrix. The inner
/// dimensions must agree.
pub fn dot<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    if a.dims() > 2 || b.dims() > 2 {
        bail!(
            "dot supports at most 2-d operands, got {} and {}",
            a.shape(),
            b.shape()
        );
    }
    if a.shape().span() <= 1 && b.shape().span() <= 1 {
        let result = Tensor::zeros(Extent::scalar());
        result.set(&[], vdot(a, b)?);
        return Ok(result);
    }

    let (ar, ac) = (a.shape().dim(0), a.shape().dim(1));
    let (br, bc) = (b.shape().dim(0), b.shape().dim(1));
    if ac != br {
        return Err(Error::SizeMismatch {
            lhs: a.shape().clone(),
            rhs: b.shape().clone(),
        });
    }

    let result = if b.dims() <= 1 {
        Tensor::zeros(Extent::from(ar))
    } else {
        Tensor::zeros(Extent::from((ar, bc)))
    };
    for r in 0..ar {
        for c in 0..bc {
            let mut acc = S::Elem::zero();
            for k in 0..ac {
                acc = acc + mat_get(a, r, k) * mat_get(b, k, c);
            }
            if b.dims() <= 1 {
                result.set(&[r], acc);
            } else {
                result.set(&[r, c], acc);
            }
        }
    }
    Ok(result)
}

/// Rank-1 outer product of two vectors into an `[a.len, b.len]` matrix.
pub fn outer<S: Storage>(a: &Tensor<S>, b: &Tensor<S>) -> Result<Tensor<S>> {
    if a.shape().span() > 1 || b.shape().span() > 1 {
        return Err(Error::IllegalOperation(
            "outer requires vector operands".into(),
        ));
    }
    let result = Tensor::zeros((a.elements(), b.elements()));
    for (i, ia) in a.indices().enumerate() {
        let av = a.get(&ia);
        for (j, jb) in b.indices().enumerate() {
            result.set(&[i, j], av * b.get(&jb));
        }
    }
    Ok(result)
}

/// Sum of every element.
pub fn sum_all<S: Storage>(t: &Tensor<S>) -> S::Elem {
    let mut acc = S::Elem::zero();
    for idx in t.indices() {
        acc = acc + t.get(&idx);
    }
    acc
}

/// Sum along one axis; the result's shape is `t`'s with that axis removed.
pub fn sum<S: Storage>(t: &Tensor<S>, axis: usize) -> Result<Tensor<S>> {
    if axis >= t.dims() {
        return Err(Error::IllegalAxis {
            axis,
            rank: t.dims(),
        });
    }
    let dims = t
        .shape()
        .dims()
        .iter()
        .enumerate()
        .filter(|&(d, _)| d != axis)
        .map(|(_, &s)| s)
        .collect();
    let result = Tensor::zeros(Extent::new(dims));
    for idx in t.indices() {
        let mut out = idx.clone();
        out.remove(axis);
        result.set(&out, result.get(&out) + t.get(&idx));
    }
    Ok(result)
}

/// Largest element in the tensor. Zero for an empty tensor.
pub fn max_all<S: Storage>(t: &Tensor<S>) -> S::Elem {
    let mut it = t.indices();
    let mut acc = match it.next() {
        Some(idx) => t.get(&idx),
        None => S::Elem::zero(),
    };
    for idx in it {
        let v = t.get(&idx);
        if v > acc {
            acc = v;
        }
    }
    acc
}

/// Maximum along one axis; the result's shape is `t`'s with that axis
/// removed.
pub fn max<S: Storage>(t: &Tensor<S>, axis: usize) -> Result<Tensor<S>> {
    if axis >= t.dims() {
        return Err(Error::IllegalAxis {
            axis,
            rank: t.dims(),
        });
    }
    let dims = t
        .shape()
        .dims()
        .iter()
        .enumerate()
        .filter(|&(d, _)| d != axis)
        .map(|(_, &s)| s)
        .collect();
    let result = Tensor::zeros(Extent::new(dims));
    for idx in t.indices() {
        let v = t.get(&idx);
        let mut out = idx.clone();
        out.remove(axis);
        if idx[axis] == 0 || v > result.get(&out) {
            result.set(&out, v);
        }
    }
    Ok(result)
}

/// Element-wise power.
pub fn pow<S: Storage>(t: &Tensor<S>, exponent: S::Elem) -> Tensor<S>
where
    S::Elem: FloatElement,
{
    map(t, |v| v.powf(exponent))
}

/// Element-wise natural exponential.
pub fn exp<S: Storage>(t: &Tensor<S>) -> Tensor<S>
where
    S::Elem: FloatElement,
{
    map(t, |v| v.exp())
}
