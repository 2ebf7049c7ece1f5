use num_traits::{Float, One, Zero};

use weft_core::linalg::{dot, iadd, mul, outer, sum_all};
use weft_core::numeric::{copy_into, copy_seq, fill};
use weft_core::{bail, Extent, FloatElement, Result, Storage, Tensor};

use crate::graph::OpKernel;

// Operator kernels.
//
// Forward kernels overwrite their output on every apply. Gradient kernels
// accumulate with `iadd` so repeated passes sum contributions; `reset`
// zeroes them. A gradient kernel's inputs are always wired as
// `[forward node output, forward inputs..., upstream gradient]`.

fn largest_shape<S: Storage>(inputs: &[Tensor<S>]) -> Option<Extent> {
    inputs
        .iter()
        .map(|t| t.shape())
        .max_by_key(|s| s.elements())
        .cloned()
}

fn resize_to_input<S: Storage>(inputs: &[Tensor<S>], k: usize, output: &mut Tensor<S>) {
    if let Some(t) = inputs.get(k) {
        output.resize(t.shape().clone());
    }
}

// Accumulate `grad` into `output`, summing over any dimensions the forward
// pass broadcast: trailing-aligned, leading extra dimensions and size-1
// dimensions of `output` collect every matching `grad` element.
fn accumulate_reduced<S: Storage>(output: &Tensor<S>, grad: &Tensor<S>) -> Result<()> {
    if grad.shape() == output.shape() {
        return iadd(output, grad);
    }
    let skip = grad.dims().saturating_sub(output.dims());
    for idx in grad.indices() {
        let out_idx: Vec<usize> = idx[skip..]
            .iter()
            .enumerate()
            .map(|(d, &i)| if output.shape().dim(d) == 1 { 0 } else { i })
            .collect();
        output.set(&out_idx, output.get(&out_idx) + grad.get(&idx));
    }
    Ok(())
}

/// A graph entry point holding a caller-provided tensor.
///
/// The node's output aliases the held tensor, so mutating the original
/// through its own handle and re-running `forward` recomputes downstream
/// nodes with the new values. Not differentiable.
pub struct InputOp<S: Storage> {
    value: Tensor<S>,
}

impl<S: Storage> InputOp<S> {
    pub fn new(value: Tensor<S>) -> Self {
        InputOp { value }
    }
}

impl<S: Storage> OpKernel<S> for InputOp<S> {
    fn name(&self) -> &str {
        "input"
    }

    fn initial_output(&self) -> Tensor<S> {
        self.value.clone()
    }

    fn apply(&mut self, _inputs: &[Tensor<S>], _output: &Tensor<S>) -> Result<()> {
        Ok(())
    }

    // inputs are not accumulators; reset leaves the held value alone
    fn reset(&mut self, _output: &Tensor<S>) {}
}

/// Element-wise sum of two inputs, with broadcasting.
pub struct AddOp;

impl<S: Storage> OpKernel<S> for AddOp {
    fn name(&self) -> &str {
        "add"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        if let Some(shape) = largest_shape(inputs) {
            output.resize(shape);
        }
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 2 {
            bail!("add expects 2 inputs, got {}", inputs.len());
        }
        fill(output, S::Elem::zero());
        iadd(output, &inputs[0])?;
        iadd(output, &inputs[1])
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![Box::new(AddGrad { index: 0 }), Box::new(AddGrad { index: 1 })]
    }
}

/// Gradient of [`AddOp`] with respect to input `index`: the upstream
/// gradient passes through unchanged.
pub struct AddGrad {
    index: usize,
}

impl<S: Storage> OpKernel<S> for AddGrad {
    fn name(&self) -> &str {
        "add_grad"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1 + self.index, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        match inputs.last() {
            Some(upstream) => accumulate_reduced(output, upstream),
            None => bail!("add_grad applied before wiring"),
        }
    }
}

/// Element-wise (Hadamard) product of two inputs, with broadcasting.
pub struct MulOp;

impl<S: Storage> OpKernel<S> for MulOp {
    fn name(&self) -> &str {
        "mul"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        if let Some(shape) = largest_shape(inputs) {
            output.resize(shape);
        }
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 2 {
            bail!("mul expects 2 inputs, got {}", inputs.len());
        }
        let product = mul(&inputs[0], &inputs[1])?;
        copy_into(&product, output)
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![Box::new(MulGrad { index: 0 }), Box::new(MulGrad { index: 1 })]
    }
}

/// Gradient of [`MulOp`] with respect to input `index`: the upstream
/// gradient times the other operand.
pub struct MulGrad {
    index: usize,
}

impl<S: Storage> OpKernel<S> for MulGrad {
    fn name(&self) -> &str {
        "mul_grad"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1 + self.index, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 4 {
            bail!("mul_grad expects 4 inputs, got {}", inputs.len());
        }
        let other = &inputs[1 + (1 - self.index)];
        let upstream = &inputs[3];
        let contribution = mul(upstream, other)?;
        accumulate_reduced(output, &contribution)
    }
}

/// Matrix product of a weight matrix and a vector (or of two vectors).
pub struct DotOp;

impl<S: Storage> OpKernel<S> for DotOp {
    fn name(&self) -> &str {
        "dot"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        if inputs.len() < 2 {
            return;
        }
        let (a, b) = (&inputs[0], &inputs[1]);
        let shape = if a.shape().span() <= 1 && b.shape().span() <= 1 {
            Extent::scalar()
        } else if b.dims() <= 1 {
            Extent::from(a.shape().dim(0))
        } else {
            Extent::from((a.shape().dim(0), b.shape().dim(1)))
        };
        output.resize(shape);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 2 {
            bail!("dot expects 2 inputs, got {}", inputs.len());
        }
        let product = dot(&inputs[0], &inputs[1])?;
        copy_into(&product, output)
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![Box::new(DotGradLeft), Box::new(DotGradRight)]
    }
}

// Scale `values` by a 0-d upstream gradient and accumulate into `output`,
// pairing elements by generation sequence so [n] and [1, n] operand shapes
// both work.
fn accumulate_scaled<S: Storage>(
    output: &Tensor<S>,
    values: &Tensor<S>,
    factor: S::Elem,
) -> Result<()> {
    if output.elements() != values.elements() {
        bail!(
            "gradient shape {} does not match operand shape {}",
            output.shape(),
            values.shape()
        );
    }
    for (i, j) in output.indices().zip(values.indices()) {
        output.set(&i, output.get(&i) + factor * values.get(&j));
    }
    Ok(())
}

/// Gradient of [`DotOp`] with respect to the left operand: for a
/// vector·vector product the right operand scaled by the upstream scalar,
/// for matrix·vector the outer product of upstream and vector, and for
/// matrix·matrix the upstream times the transposed right operand.
pub struct DotGradLeft;

impl<S: Storage> OpKernel<S> for DotGradLeft {
    fn name(&self) -> &str {
        "dot_grad_left"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 4 {
            bail!("dot_grad_left expects 4 inputs, got {}", inputs.len());
        }
        let (a, b, upstream) = (&inputs[1], &inputs[2], &inputs[3]);
        if a.shape().span() <= 1 && b.shape().span() <= 1 {
            return accumulate_scaled(output, b, upstream.get(&[]));
        }
        if b.dims() <= 1 {
            let contribution = outer(upstream, b)?;
            return iadd(output, &contribution);
        }
        let contribution = dot(upstream, &b.t())?;
        iadd(output, &contribution)
    }
}

/// Gradient of [`DotOp`] with respect to the right operand: the left
/// operand scaled by the upstream scalar for vector·vector, otherwise the
/// transposed left operand times the upstream gradient.
pub struct DotGradRight;

impl<S: Storage> OpKernel<S> for DotGradRight {
    fn name(&self) -> &str {
        "dot_grad_right"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 2, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 4 {
            bail!("dot_grad_right expects 4 inputs, got {}", inputs.len());
        }
        let (a, b, upstream) = (&inputs[1], &inputs[2], &inputs[3]);
        if a.shape().span() <= 1 && b.shape().span() <= 1 {
            return accumulate_scaled(output, a, upstream.get(&[]));
        }
        let contribution = dot(&a.t(), upstream)?;
        iadd(output, &contribution)
    }
}

/// Affine transform `weight · x + bias`, wired as `[weight, x, bias]`.
pub struct LinearOp;

impl<S: Storage> OpKernel<S> for LinearOp {
    fn name(&self) -> &str {
        "linear"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        if inputs.len() < 2 {
            return;
        }
        let (w, x) = (&inputs[0], &inputs[1]);
        let shape = if x.dims() <= 1 {
            Extent::from(w.shape().dim(0))
        } else {
            Extent::from((w.shape().dim(0), x.shape().dim(1)))
        };
        output.resize(shape);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 3 {
            bail!("linear expects 3 inputs, got {}", inputs.len());
        }
        let product = dot(&inputs[0], &inputs[1])?;
        copy_into(&product, output)?;
        iadd(output, &inputs[2])
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![
            Box::new(LinearGradWeight),
            Box::new(LinearGradInput),
            Box::new(LinearGradBias),
        ]
    }
}

/// Gradient of [`LinearOp`] with respect to the weight matrix: the outer
/// product of the upstream gradient and the input.
pub struct LinearGradWeight;

impl<S: Storage> OpKernel<S> for LinearGradWeight {
    fn name(&self) -> &str {
        "linear_grad_weight"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 5 {
            bail!("linear_grad_weight expects 5 inputs, got {}", inputs.len());
        }
        let (x, upstream) = (&inputs[2], &inputs[4]);
        let contribution = if x.dims() <= 1 {
            outer(upstream, x)?
        } else {
            dot(upstream, &x.t())?
        };
        iadd(output, &contribution)
    }
}

/// Gradient of [`LinearOp`] with respect to the input: the transposed
/// weight matrix times the upstream gradient.
pub struct LinearGradInput;

impl<S: Storage> OpKernel<S> for LinearGradInput {
    fn name(&self) -> &str {
        "linear_grad_input"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 2, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 5 {
            bail!("linear_grad_input expects 5 inputs, got {}", inputs.len());
        }
        let contribution = dot(&inputs[1].t(), &inputs[4])?;
        iadd(output, &contribution)
    }
}

/// Gradient of [`LinearOp`] with respect to the bias: the upstream
/// gradient, sum-reduced over any broadcast dimensions.
pub struct LinearGradBias;

impl<S: Storage> OpKernel<S> for LinearGradBias {
    fn name(&self) -> &str {
        "linear_grad_bias"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 3, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 5 {
            bail!("linear_grad_bias expects 5 inputs, got {}", inputs.len());
        }
        accumulate_reduced(output, &inputs[4])
    }
}

/// Reshape the input into a 1-d vector of the same element count.
pub struct FlattenOp;

impl<S: Storage> OpKernel<S> for FlattenOp {
    fn name(&self) -> &str {
        "flatten"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        if let Some(t) = inputs.first() {
            output.resize(Extent::from(t.elements()));
        }
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        match inputs.first() {
            Some(t) => copy_seq(t, output),
            None => bail!("flatten applied before wiring"),
        }
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![Box::new(FlattenGrad)]
    }
}

/// Gradient of [`FlattenOp`]: the upstream gradient restored to the
/// input's shape.
pub struct FlattenGrad;

impl<S: Storage> OpKernel<S> for FlattenGrad {
    fn name(&self) -> &str {
        "flatten_grad"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 3 {
            bail!("flatten_grad expects 3 inputs, got {}", inputs.len());
        }
        copy_seq(&inputs[2], output)
    }
}

/// Log-softmax over the whole input: `out_i = x_i - ln(sum_j exp(x_j))`.
pub struct LogSoftmaxOp;

impl<S: Storage> OpKernel<S> for LogSoftmaxOp
where
    S::Elem: FloatElement,
{
    fn name(&self) -> &str {
        "log_softmax"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 0, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        let x = match inputs.first() {
            Some(x) => x,
            None => bail!("log_softmax applied before wiring"),
        };
        let total = sum_all(&weft_core::linalg::exp(x));
        let log_total = total.ln();
        for idx in output.indices() {
            output.set(&idx, x.get(&idx) - log_total);
        }
        Ok(())
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![Box::new(LogSoftmaxGrad)]
    }
}

/// Gradient of [`LogSoftmaxOp`]:
/// `dx_i = g_i - exp(out_i) * sum_j g_j`.
pub struct LogSoftmaxGrad;

impl<S: Storage> OpKernel<S> for LogSoftmaxGrad
where
    S::Elem: FloatElement,
{
    fn name(&self) -> &str {
        "log_softmax_grad"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 3 {
            bail!("log_softmax_grad expects 3 inputs, got {}", inputs.len());
        }
        let (lsm, upstream) = (&inputs[0], &inputs[2]);
        let g_sum = sum_all(upstream);
        for idx in output.indices() {
            let contribution = upstream.get(&idx) - lsm.get(&idx).exp() * g_sum;
            output.set(&idx, output.get(&idx) + contribution);
        }
        Ok(())
    }
}

/// Element-wise logistic sigmoid: `out_i = 1 / (1 + exp(-x_i))`.
pub struct SigmoidOp;

impl<S: Storage> OpKernel<S> for SigmoidOp
where
    S::Elem: FloatElement,
{
    fn name(&self) -> &str {
        "sigmoid"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 0, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        let x = match inputs.first() {
            Some(x) => x,
            None => bail!("sigmoid applied before wiring"),
        };
        let one = S::Elem::one();
        for idx in output.indices() {
            let v = one / (one + (-x.get(&idx)).exp());
            output.set(&idx, v);
        }
        Ok(())
    }

    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        vec![Box::new(SigmoidGrad)]
    }
}

/// Gradient of [`SigmoidOp`]: `dx_i = g_i * y_i * (1 - y_i)` where `y` is
/// the forward output.
pub struct SigmoidGrad;

impl<S: Storage> OpKernel<S> for SigmoidGrad
where
    S::Elem: FloatElement,
{
    fn name(&self) -> &str {
        "sigmoid_grad"
    }

    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        resize_to_input(inputs, 1, output);
    }

    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()> {
        if inputs.len() != 3 {
            bail!("sigmoid_grad expects 3 inputs, got {}", inputs.len());
        }
        let (y, upstream) = (&inputs[0], &inputs[2]);
        let one = S::Elem::one();
        for idx in output.indices() {
            let v = y.get(&idx);
            let contribution = upstream.get(&idx) * v * (one - v);
            output.set(&idx, output.get(&idx) + contribution);
        }
        Ok(())
    }
}
