//! Initialisation order for compiled-in modules.
//!
//! Modules that are built into the host register a name, a static list of
//! the modules they need, and an `init` entry point. `InitPlan` orders them
//! and runs each `init` exactly once, dependencies first. Nothing is ever
//! evaluated from text here.

use crate::error::{ConfigError, ExecuteError, LoadError};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Module '{0}' is registered twice")]
    DuplicateModule(String),
    #[error("'{module}' depends on unknown '{dependency}'")]
    UnknownDependency { module: String, dependency: String },
    #[error("Dependency cycle among: {}", .members.join(", "))]
    Cycle { members: Vec<String> },
    #[error("Initialisation of '{module}' failed: {source}")]
    InitFailed { module: String, source: ExecuteError },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type InitFn = Box<dyn FnMut() -> Result<(), ExecuteError>>;

/// One registered module.
pub struct ModuleDecl {
    pub name: &'static str,
    pub dependencies: &'static [&'static str],
    init: InitFn,
}

impl ModuleDecl {
    pub fn new<F>(name: &'static str, dependencies: &'static [&'static str], init: F) -> Self
    where
        F: FnMut() -> Result<(), ExecuteError> + 'static,
    {
        Self { name, dependencies, init: Box::new(init) }
    }
}

impl std::fmt::Debug for ModuleDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDecl")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct InitPlan {
    modules: Vec<ModuleDecl>,
    by_name: HashMap<&'static str, usize>,
    initialized: HashSet<&'static str>,
}

impl InitPlan {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, decl: ModuleDecl) -> Result<(), PlanError> {
        if self.by_name.contains_key(decl.name) {
            return Err(PlanError::DuplicateModule(decl.name.to_string()));
        }
        self.by_name.insert(decl.name, self.modules.len());
        self.modules.push(decl);
        Ok(())
    }

    pub fn is_initialized(&self, name: &str) -> bool { self.initialized.contains(name) }

    /// Returns module names in initialisation order using Kahn's Algorithm.
    /// Among modules that are ready at the same time the lexicographically
    /// smallest goes first, so the order is fully deterministic.
    pub fn order(&self) -> Result<Vec<&'static str>, PlanError> {
        let graph = self.build_graph()?;
        let count = graph.node_count();
        let mut in_degree = vec![0usize; count];
        let mut ready: BTreeSet<(&'static str, NodeIndex)> = BTreeSet::new();
        let mut order = Vec::with_capacity(count);

        // 1. Initialize In-Degrees
        for node in graph.node_indices() {
            let degree = graph.neighbors_directed(node, Direction::Incoming).count();
            in_degree[node.index()] = degree;
            if degree == 0 {
                ready.insert((graph[node], node));
            }
        }

        // 2. Process the ready set
        while let Some(entry) = ready.pop_first() {
            let (name, node) = entry;
            order.push(name);
            for child in graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[child.index()] -= 1;
                if in_degree[child.index()] == 0 {
                    ready.insert((graph[child], child));
                }
            }
        }

        if order.len() != count {
            return Err(PlanError::Cycle { members: cycle_members(&graph) });
        }
        Ok(order)
    }

    /// Runs every `init` not yet run, in plan order. Stops at the first
    /// failure; modules initialised before it stay initialised.
    pub fn run(&mut self) -> Result<Vec<&'static str>, PlanError> {
        let order = self.order()?;
        let mut ran = Vec::new();
        for name in order {
            if self.initialized.contains(name) {
                continue;
            }
            let idx = self.by_name[name];
            tracing::debug!(module = name, "initializing");
            (self.modules[idx].init)().map_err(|source| PlanError::InitFailed {
                module: name.to_string(),
                source,
            })?;
            self.initialized.insert(name);
            ran.push(name);
        }
        Ok(ran)
    }

    /// Edges run from a dependency to the module that needs it.
    fn build_graph(&self) -> Result<DiGraph<&'static str, ()>, PlanError> {
        let mut graph = DiGraph::with_capacity(self.modules.len(), 0);
        let nodes: Vec<NodeIndex> = self.modules.iter().map(|m| graph.add_node(m.name)).collect();

        for (idx, module) in self.modules.iter().enumerate() {
            for dep in module.dependencies {
                let Some(&dep_idx) = self.by_name.get(dep) else {
                    return Err(PlanError::UnknownDependency {
                        module: module.name.to_string(),
                        dependency: dep.to_string(),
                    });
                };
                graph.update_edge(nodes[dep_idx], nodes[idx], ());
            }
        }
        Ok(graph)
    }
}

/// Names of every module that sits on a cycle, sorted.
fn cycle_members(graph: &DiGraph<&'static str, ()>) -> Vec<String> {
    let mut members: Vec<String> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(|node| graph[node].to_string())
        .collect();
    members.sort();
    members
}
