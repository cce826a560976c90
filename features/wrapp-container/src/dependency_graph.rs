use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, VecDeque},
};

use crate::{
    address::{resolve, Address, Resolved},
    errors::{ContainerError, CycleError},
    module::Template,
    registry::{Entry, ObjectRegistry},
    types::TypeInfo,
};

/// Graph of the entire application
///
/// Nodes are addresses, an edge `from -> to` means `from` has to exist before `to` is built.
/// Used to find the build order and to detect circular dependencies.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// In the order they were first seen
    nodes: Vec<Address>,
    index: HashMap<Address, usize>,
    edges: Vec<Vec<usize>>,
    break_point: Option<Address>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the edges of every registered entry
    ///
    /// Fails with [ContainerError::UnsupportedDependency] if an input or output
    /// has no usable address, before anything is built.
    pub fn from_registry(registry: &ObjectRegistry) -> Result<Self, ContainerError> {
        let mut graph = Self::new();
        registry.each(|entry| graph.add_entry(entry))?;
        Ok(graph)
    }

    fn add_entry(&mut self, entry: &Entry) -> Result<(), ContainerError> {
        match &entry.template {
            Template::Value(_) => self.add(Address::ROOT, entry.address.clone()),
            Template::Function { .. } => {
                self.add_inputs(entry)?;
                for output in &entry.outputs {
                    match resolve(output, None) {
                        Resolved::Address(address) => self.add(entry.address.clone(), address),
                        Resolved::Error => self.add(entry.address.clone(), Address::ERROR),
                        Resolved::Unsupported(address) => {
                            return Err(ContainerError::UnsupportedDependency(address))
                        }
                    }
                }
            }
            Template::Struct(_) => self.add_inputs(entry)?,
        }
        Ok(())
    }

    fn add_inputs(&mut self, entry: &Entry) -> Result<(), ContainerError> {
        if entry.inputs.is_empty() {
            self.add(Address::ROOT, entry.address.clone());
        }
        for input in &entry.inputs {
            let address = input_address(input)?;
            self.add(address, entry.address.clone());
        }
        Ok(())
    }

    /// Adds the edge `from -> to`, registering both nodes on first sight
    pub fn add(&mut self, from: Address, to: Address) {
        let from = self.node(from);
        let to = self.node(to);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    /// Restricts [DependencyGraph::build] to the ancestors of `address` and itself
    pub fn break_point(&mut self, address: Address) {
        self.break_point = Some(address);
    }

    fn node(&mut self, address: Address) -> usize {
        if let Some(&position) = self.index.get(&address) {
            return position;
        }
        let position = self.nodes.len();
        self.nodes.push(address.clone());
        self.edges.push(Vec::new());
        self.index.insert(address, position);
        position
    }

    /// Topological order of all nodes
    ///
    /// Of all nodes ready at the same time, the one seen first comes first.
    /// With a break point set, only the nodes it transitively depends on are returned.
    pub fn build(&self) -> Result<Vec<Address>, ContainerError> {
        let mut in_degree = vec![0_usize; self.nodes.len()];
        for targets in &self.edges {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(node, _)| Reverse(node))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &to in &self.edges[node] {
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    ready.push(Reverse(to));
                }
            }
        }

        if order.len() != self.nodes.len() {
            let unresolved = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, &degree)| degree > 0)
                .map(|(node, _)| self.nodes[node].clone())
                .collect();
            return Err(CycleError { unresolved }.into());
        }

        if let Some(break_point) = &self.break_point {
            let keep = self.ancestors(break_point)?;
            order.retain(|node| keep[*node]);
        }

        let order: Vec<Address> = order
            .into_iter()
            .map(|node| self.nodes[node].clone())
            .collect();
        tracing::debug!(?order, "Dependency order");
        Ok(order)
    }

    /// Marks `address` and every node with a path to it
    fn ancestors(&self, address: &Address) -> Result<Vec<bool>, ContainerError> {
        let &target = self
            .index
            .get(address)
            .ok_or(ContainerError::InvalidBreakPoint("breakpoint is not registered"))?;

        let mut reverse = vec![Vec::new(); self.nodes.len()];
        for (from, targets) in self.edges.iter().enumerate() {
            for &to in targets {
                reverse[to].push(from);
            }
        }

        let mut keep = vec![false; self.nodes.len()];
        keep[target] = true;
        let mut queue = VecDeque::from([target]);
        while let Some(node) = queue.pop_front() {
            for &from in &reverse[node] {
                if !keep[from] {
                    keep[from] = true;
                    queue.push_back(from);
                }
            }
        }
        Ok(keep)
    }
}

fn input_address(input: &TypeInfo) -> Result<Address, ContainerError> {
    match resolve(input, None) {
        Resolved::Address(address) => Ok(address),
        Resolved::Error => Err(ContainerError::UnsupportedDependency(Address::ERROR)),
        Resolved::Unsupported(address) => Err(ContainerError::UnsupportedDependency(address)),
    }
}
