//! Composition graph management using `petgraph`.
//!
//! Walks every stack's construct tree and collects resources, ownership
//! edges, explicit-dependency edges, and reference edges. Only the last two
//! constrain ordering. Ordering edges point from producer to consumer so the
//! topological order yields producers first.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use petgraph::Direction;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use skyweave_common::error::{Result, SkyweaveError};
use skyweave_core::construct::{App, DependencyTarget, NodeId};
use skyweave_core::descriptor::ResourceId;

/// A vertex of the composition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    /// A construct node (stack roots included).
    Construct(NodeId),
    /// A resource descriptor.
    Resource(ResourceId),
}

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Parent owns child. Informational only.
    Ownership,
    /// Declared with `add_dependency`.
    Explicit,
    /// Derived from a reference in the consumer's configuration.
    Reference,
}

impl EdgeKind {
    /// Whether the edge constrains deployment order.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        !matches!(self, Self::Ownership)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ownership => write!(f, "owns"),
            Self::Explicit => write!(f, "depends"),
            Self::Reference => write!(f, "ref"),
        }
    }
}

/// One ordering constraint: `consumer` must follow `producer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingEdge {
    /// Resource realized later.
    pub consumer: ResourceId,
    /// Resource realized first.
    pub producer: ResourceId,
    /// Origin of the constraint.
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

struct Frame {
    resource: ResourceId,
    dependencies: Vec<ResourceId>,
    next: usize,
}

/// The full composition graph of one app.
#[derive(Debug)]
pub struct CompositionGraph<'a> {
    app: &'a App,
    graph: DiGraph<GraphNode, EdgeKind>,
    resource_nodes: HashMap<ResourceId, NodeIndex>,
    preorder: Vec<ResourceId>,
    rank: HashMap<ResourceId, usize>,
}

impl<'a> CompositionGraph<'a> {
    /// Builds the graph by walking every stack in creation order.
    #[must_use]
    pub fn build(app: &'a App) -> Self {
        let mut graph = DiGraph::new();
        let mut construct_nodes: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut resource_nodes = HashMap::new();
        let mut preorder = Vec::new();

        let walk = app.preorder();
        for &node_id in &walk {
            let node = app.node(node_id);
            let idx = graph.add_node(GraphNode::Construct(node_id));
            let _ = construct_nodes.insert(node_id, idx);
            if let Some(parent) = node.parent().and_then(|p| construct_nodes.get(&p)) {
                let _ = graph.add_edge(*parent, idx, EdgeKind::Ownership);
            }
            for &resource in node.resources() {
                let ridx = graph.add_node(GraphNode::Resource(resource));
                let _ = graph.add_edge(idx, ridx, EdgeKind::Ownership);
                let _ = resource_nodes.insert(resource, ridx);
                preorder.push(resource);
            }
        }

        let rank = preorder.iter().enumerate().map(|(i, &r)| (r, i)).collect();
        let mut this = Self {
            app,
            graph,
            resource_nodes,
            preorder,
            rank,
        };

        for consumer in this.preorder.clone() {
            let producers: Vec<ResourceId> = app
                .descriptor(consumer)
                .config()
                .references()
                .iter()
                .map(|r| r.source())
                .collect();
            for producer in producers {
                this.add_ordering(producer, consumer, EdgeKind::Reference);
            }
        }

        for &node_id in &walk {
            let dependencies = app.node(node_id).dependencies();
            if dependencies.is_empty() {
                continue;
            }
            let consumers = app.subtree_resources(node_id);
            for target in dependencies {
                let producers = match *target {
                    DependencyTarget::Node(other) => app.subtree_resources(other),
                    DependencyTarget::Resource(resource) => vec![resource],
                };
                for &consumer in &consumers {
                    for &producer in &producers {
                        this.add_ordering(producer, consumer, EdgeKind::Explicit);
                    }
                }
            }
        }

        tracing::info!(
            constructs = walk.len(),
            resources = this.preorder.len(),
            ordering_edges = this.ordering_edges().len(),
            "composition graph built"
        );
        this
    }

    fn add_ordering(&mut self, producer: ResourceId, consumer: ResourceId, kind: EdgeKind) {
        let (Some(&from), Some(&to)) = (
            self.resource_nodes.get(&producer),
            self.resource_nodes.get(&consumer),
        ) else {
            return;
        };
        if self.graph.find_edge(from, to).is_none() {
            tracing::debug!(
                consumer = %self.app.descriptor(consumer).path(),
                producer = %self.app.descriptor(producer).path(),
                %kind,
                "ordering edge"
            );
            let _ = self.graph.add_edge(from, to, kind);
        }
    }

    /// The app this graph was built from.
    #[must_use]
    pub const fn app(&self) -> &'a App {
        self.app
    }

    /// Resources in tree pre-order; the position is the tie-break key.
    #[must_use]
    pub fn preorder(&self) -> &[ResourceId] {
        &self.preorder
    }

    /// Number of vertices (constructs plus resources).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Every edge of `kind` as `(from, to)`; ordering edges run producer to consumer.
    #[must_use]
    pub fn edges(&self, kind: EdgeKind) -> Vec<(GraphNode, GraphNode)> {
        self.graph
            .edge_references()
            .filter(|e| *e.weight() == kind)
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
            .collect()
    }

    /// Every ordering constraint, in edge insertion order.
    #[must_use]
    pub fn ordering_edges(&self) -> Vec<OrderingEdge> {
        self.graph
            .edge_references()
            .filter(|e| e.weight().is_ordering())
            .filter_map(|e| match (self.graph[e.source()], self.graph[e.target()]) {
                (GraphNode::Resource(producer), GraphNode::Resource(consumer)) => {
                    Some(OrderingEdge {
                        consumer,
                        producer,
                        kind: *e.weight(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Direct producers `resource` must follow, in pre-order.
    #[must_use]
    pub fn dependencies_of(&self, resource: ResourceId) -> Vec<ResourceId> {
        self.neighbors(resource, Direction::Incoming)
    }

    /// Direct consumers that must follow `resource`, in pre-order.
    #[must_use]
    pub fn dependents_of(&self, resource: ResourceId) -> Vec<ResourceId> {
        self.neighbors(resource, Direction::Outgoing)
    }

    fn neighbors(&self, resource: ResourceId, direction: Direction) -> Vec<ResourceId> {
        let Some(&idx) = self.resource_nodes.get(&resource) else {
            return Vec::new();
        };
        let mut out: Vec<ResourceId> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|e| e.weight().is_ordering())
            .filter_map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                match self.graph[other] {
                    GraphNode::Resource(r) => Some(r),
                    GraphNode::Construct(_) => None,
                }
            })
            .collect();
        out.sort_by_key(|r| self.rank_of(*r));
        out.dedup();
        out
    }

    fn rank_of(&self, resource: ResourceId) -> usize {
        self.rank.get(&resource).copied().unwrap_or(usize::MAX)
    }

    /// Finds one concrete cycle with a three-color depth-first search.
    ///
    /// The returned path follows "depends on" edges and repeats its first
    /// element at the end, e.g. `[a, b, a]` for a depends on b depends on a.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<ResourceId>> {
        let mut marks = vec![Mark::Unvisited; self.preorder.len()];

        for &start in &self.preorder {
            if marks[self.rank_of(start)] != Mark::Unvisited {
                continue;
            }
            marks[self.rank_of(start)] = Mark::InProgress;
            let mut stack = vec![Frame {
                resource: start,
                dependencies: self.dependencies_of(start),
                next: 0,
            }];

            while let Some(top) = stack.last_mut() {
                let Some(&dependency) = top.dependencies.get(top.next) else {
                    marks[self.rank_of(top.resource)] = Mark::Done;
                    let _ = stack.pop();
                    continue;
                };
                top.next += 1;

                match marks[self.rank_of(dependency)] {
                    Mark::Unvisited => {
                        marks[self.rank_of(dependency)] = Mark::InProgress;
                        stack.push(Frame {
                            resource: dependency,
                            dependencies: self.dependencies_of(dependency),
                            next: 0,
                        });
                    }
                    Mark::InProgress => {
                        let start_at = stack
                            .iter()
                            .position(|f| f.resource == dependency)
                            .unwrap_or(0);
                        let mut cycle: Vec<ResourceId> =
                            stack[start_at..].iter().map(|f| f.resource).collect();
                        cycle.push(dependency);
                        return Some(cycle);
                    }
                    Mark::Done => {}
                }
            }
        }
        None
    }

    /// Fails if the ordering edges contain a cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::CyclicDependency`] naming one concrete cycle.
    pub fn check_acyclic(&self) -> Result<()> {
        match self.find_cycle() {
            None => Ok(()),
            Some(cycle) => {
                let path: Vec<String> = cycle
                    .iter()
                    .map(|&r| self.app.descriptor(r).address())
                    .collect();
                tracing::error!(cycle = %path.join(" -> "), "cyclic dependency detected");
                Err(SkyweaveError::CyclicDependency { path })
            }
        }
    }

    /// Returns a deployment order with producers before consumers.
    ///
    /// Among resources whose dependencies are all placed, the one earliest in
    /// tree pre-order goes first, so identical input always yields the same
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::CyclicDependency`] if the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<ResourceId>> {
        self.check_acyclic()?;

        let mut pending: Vec<usize> = self
            .preorder
            .iter()
            .map(|&r| self.dependencies_of(r).len())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(rank, _)| Reverse(rank))
            .collect();

        let mut order = Vec::with_capacity(self.preorder.len());
        while let Some(Reverse(rank)) = ready.pop() {
            let resource = self.preorder[rank];
            order.push(resource);
            for dependent in self.dependents_of(resource) {
                let dependent_rank = self.rank_of(dependent);
                pending[dependent_rank] -= 1;
                if pending[dependent_rank] == 0 {
                    ready.push(Reverse(dependent_rank));
                }
            }
        }
        Ok(order)
    }

    /// Longest dependency-chain length of each resource in `order`.
    ///
    /// Resources sharing a level have no ordering edges between them and may
    /// be realized in parallel.
    #[must_use]
    pub fn levels(&self, order: &[ResourceId]) -> HashMap<ResourceId, usize> {
        let mut levels: HashMap<ResourceId, usize> = HashMap::with_capacity(order.len());
        for &resource in order {
            let level = self
                .dependencies_of(resource)
                .iter()
                .filter_map(|p| levels.get(p))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            let _ = levels.insert(resource, level);
        }
        levels
    }

    /// Renders the ordering subgraph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot: DiGraph<String, EdgeKind> = DiGraph::new();
        let indices: HashMap<ResourceId, NodeIndex> = self
            .preorder
            .iter()
            .map(|&r| (r, dot.add_node(self.app.descriptor(r).address())))
            .collect();
        for edge in self.ordering_edges() {
            if let (Some(&from), Some(&to)) =
                (indices.get(&edge.producer), indices.get(&edge.consumer))
            {
                let _ = dot.add_edge(from, to, edge.kind);
            }
        }
        Dot::new(&dot).to_string()
    }
}
