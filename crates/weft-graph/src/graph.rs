use std::collections::{HashMap, HashSet, VecDeque};

use num_traits::Zero;

use weft_core::bail;
use weft_core::numeric::fill;
use weft_core::{Result, Storage, Tensor};

use crate::ops::{AddOp, InputOp};

// Operator graph — arena of nodes with index-based edges.
//
// A node owns an operator kernel, the ids of its input nodes, and an output
// tensor. Kernels never hold tensor references themselves; at every step the
// graph hands them their inputs' current outputs, so rewiring or re-shaping
// upstream nodes needs no bookkeeping inside the kernels.
//
// `forward` applies nodes in dependency-count topological order (Kahn), so
// every node runs strictly after all of its inputs, including in
// diamond-shaped graphs. `backward` extends the same graph with gradient
// nodes: walking the forward order in reverse, each differentiable node
// contributes one gradient node per input, wired to the forward node's
// output, its original inputs, and the upstream gradient; multiple
// contributions to the same node are summed with [`AddOp`] nodes.

/// Index of a node in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An operator kernel: the computation a graph node performs.
///
/// Kernels receive inputs and output from the graph on every call. State a
/// kernel keeps (if any) is its own; accumulating kernels zero their output
/// in `reset`.
pub trait OpKernel<S: Storage> {
    fn name(&self) -> &str;

    /// Output tensor allocated at construction time, before any input is
    /// known. Defaults to an empty placeholder that `input_changed` resizes.
    fn initial_output(&self) -> Tensor<S> {
        Tensor::empty()
    }

    /// Called whenever an input is connected or an upstream shape changes.
    /// Kernels resize `output` here so shapes propagate through the graph
    /// at wiring time.
    fn input_changed(&mut self, inputs: &[Tensor<S>], output: &mut Tensor<S>) {
        let _ = (inputs, output);
    }

    /// Forward computation: derive `output` from `inputs`.
    fn apply(&mut self, inputs: &[Tensor<S>], output: &Tensor<S>) -> Result<()>;

    /// Zero accumulated state before a fresh pass.
    fn reset(&mut self, output: &Tensor<S>) {
        fill(output, S::Elem::zero());
    }

    /// One gradient kernel per forward input, each to be wired to
    /// `[forward node, forward inputs..., upstream gradient]`.
    /// An empty list marks the kernel as not differentiable.
    fn gradient(&self) -> Vec<Box<dyn OpKernel<S>>> {
        Vec::new()
    }
}

/// A node in the operator graph.
pub struct Node<S: Storage> {
    pub kernel: Box<dyn OpKernel<S>>,
    pub inputs: Vec<NodeId>,
    pub output: Tensor<S>,
}

/// Adjacency view of a graph: per-node consumers and producers, plus the
/// entry and exit nodes.
#[derive(Debug, Default)]
pub struct Dependencies {
    /// node -> nodes consuming its output
    pub forward: HashMap<NodeId, Vec<NodeId>>,
    /// node -> nodes it consumes
    pub backward: HashMap<NodeId, Vec<NodeId>>,
    /// nodes with no inputs
    pub roots: Vec<NodeId>,
    /// nodes with no consumers
    pub terminals: Vec<NodeId>,
}

/// Handles produced by [`Graph::backward`].
pub struct BackwardResult {
    /// The all-ones seed gradient node added for the chosen terminal.
    pub seed: NodeId,
    /// forward node -> node whose output is that node's gradient.
    pub grads: HashMap<NodeId, NodeId>,
}

/// Arena-allocated operator graph.
pub struct Graph<S: Storage> {
    nodes: Vec<Node<S>>,
}

impl<S: Storage> Default for Graph<S> {
    fn default() -> Self {
        Graph::new()
    }
}

impl<S: Storage> Graph<S> {
    pub fn new() -> Self {
        Graph { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 >= self.nodes.len() {
            bail!("unknown node id {}", id.0);
        }
        Ok(())
    }

    /// Add an unwired node.
    pub fn add(&mut self, kernel: Box<dyn OpKernel<S>>) -> NodeId {
        let output = kernel.initial_output();
        self.nodes.push(Node {
            kernel,
            inputs: Vec::new(),
            output,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Add a node and connect its inputs in order.
    pub fn add_with_inputs(
        &mut self,
        kernel: Box<dyn OpKernel<S>>,
        inputs: &[NodeId],
    ) -> Result<NodeId> {
        let id = self.add(kernel);
        for &input in inputs {
            self.connect(input, id)?;
        }
        Ok(id)
    }

    /// Wire `from`'s output as the next input of `to`, then re-resolve
    /// output shapes from `to` downstream.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            bail!("node {} cannot consume its own output", to.0);
        }
        self.nodes[to.0].inputs.push(from);

        let mut work = VecDeque::from([to]);
        let mut seen = HashSet::new();
        while let Some(id) = work.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            self.notify(id);
            for (i, node) in self.nodes.iter().enumerate() {
                if node.inputs.contains(&id) {
                    work.push_back(NodeId(i));
                }
            }
        }
        Ok(())
    }

    fn gather_inputs(&self, id: NodeId) -> Vec<Tensor<S>> {
        self.nodes[id.0]
            .inputs
            .iter()
            .map(|&i| self.nodes[i.0].output.clone())
            .collect()
    }

    fn notify(&mut self, id: NodeId) {
        let inputs = self.gather_inputs(id);
        let node = &mut self.nodes[id.0];
        node.kernel.input_changed(&inputs, &mut node.output);
    }

    /// The current output tensor of a node. The returned tensor shares
    /// storage with the node, so values update in place across passes
    /// unless the node is resized.
    pub fn output(&self, id: NodeId) -> &Tensor<S> {
        &self.nodes[id.0].output
    }

    /// Compute the adjacency view: consumers, producers, roots, terminals.
    pub fn dependencies(&self) -> Dependencies {
        let mut deps = Dependencies::default();
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i);
            if node.inputs.is_empty() {
                deps.roots.push(id);
            } else {
                deps.backward.insert(id, node.inputs.clone());
            }
            for &input in &node.inputs {
                deps.forward.entry(input).or_default().push(id);
            }
        }
        for i in 0..self.nodes.len() {
            let id = NodeId(i);
            if !deps.forward.contains_key(&id) {
                deps.terminals.push(id);
            }
        }
        deps
    }

    // Kahn's algorithm. Every node is applied only after all of its inputs,
    // so diamond-shaped graphs evaluate correctly regardless of insertion
    // order. Fails if the graph contains a cycle.
    fn topo_order(&self) -> Result<Vec<NodeId>> {
        let n = self.nodes.len();
        let mut indegree: Vec<usize> = self.nodes.iter().map(|nd| nd.inputs.len()).collect();
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            for input in &node.inputs {
                consumers[input.0].push(i);
            }
        }

        let mut queue: VecDeque<usize> =
            (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(NodeId(i));
            for &c in &consumers[i] {
                indegree[c] -= 1;
                if indegree[c] == 0 {
                    queue.push_back(c);
                }
            }
        }
        if order.len() != n {
            bail!("operator graph contains a cycle");
        }
        Ok(order)
    }

    /// Apply every node in dependency order.
    pub fn forward(&mut self) -> Result<()> {
        for id in self.topo_order()? {
            let inputs = self.gather_inputs(id);
            let node = &mut self.nodes[id.0];
            node.kernel.apply(&inputs, &node.output)?;
        }
        Ok(())
    }

    /// Reset every node's accumulated state.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.kernel.reset(&node.output);
        }
    }

    /// Extend the graph with gradient nodes for every node that `terminal`
    /// depends on, seeding with an all-ones gradient at `terminal`.
    ///
    /// After this call, [`Graph::forward`] evaluates the forward pass and
    /// all gradients in one dependency-ordered sweep; per-node gradients
    /// are read through [`BackwardResult::grads`].
    pub fn backward(&mut self, terminal: NodeId) -> Result<BackwardResult> {
        self.check(terminal)?;
        let order = self.topo_order()?;

        let seed_value = Tensor::ones(self.nodes[terminal.0].output.shape().clone());
        let seed = self.add(Box::new(InputOp::new(seed_value)));

        let mut contrib: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        contrib.insert(terminal, vec![seed]);
        let mut grads = HashMap::new();

        for &id in order.iter().rev() {
            let parts = match contrib.remove(&id) {
                Some(parts) => parts,
                None => continue, // not on a path to the terminal
            };
            let mut upstream = parts[0];
            for &part in &parts[1..] {
                upstream = self.add_with_inputs(Box::new(AddOp), &[upstream, part])?;
            }
            grads.insert(id, upstream);

            let grad_kernels = self.nodes[id.0].kernel.gradient();
            if grad_kernels.is_empty() {
                continue;
            }
            let fwd_inputs = self.nodes[id.0].inputs.clone();
            if grad_kernels.len() != fwd_inputs.len() {
                bail!(
                    "kernel {} produced {} gradients for {} inputs",
                    self.nodes[id.0].kernel.name(),
                    grad_kernels.len(),
                    fwd_inputs.len()
                );
            }
            for (k, kernel) in grad_kernels.into_iter().enumerate() {
                let mut wires = vec![id];
                wires.extend(fwd_inputs.iter().copied());
                wires.push(upstream);
                let gid = self.add_with_inputs(kernel, &wires)?;
                contrib.entry(fwd_inputs[k]).or_default().push(gid);
            }
        }

        Ok(BackwardResult { seed, grads })
    }
}
