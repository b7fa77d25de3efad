//! Functions, basic blocks and the control-flow graph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::instruction::{Instruction, Terminator};
use crate::value::{BlockId, Type, ValueId};

/// Attribute marking the function a backend starts executing.
pub const ENTRY_POINT_ATTR: &str = "entry_point";

/// A basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block identifier, unique within the function.
    pub id: BlockId,
    /// Human-readable label.
    pub label: String,
    /// Non-terminator instructions, in order.
    pub instructions: Vec<Instruction>,
    /// The block terminator. `None` only while a block is being built.
    pub terminator: Option<Terminator>,
}

impl Block {
    /// Create an empty, unterminated block.
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            instructions: vec![],
            terminator: None,
        }
    }

    /// Successors of this block.
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// The value bound to the parameter inside the body.
    pub value: ValueId,
    /// Parameter type.
    pub ty: Type,
}

/// A function definition or declaration.
///
/// A function without blocks is a declaration, which is how runtime and
/// instruction-set intrinsics appear in a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Parameters.
    pub params: Vec<Param>,
    /// Parameter types of a declaration, or of the definition's params.
    #[serde(default)]
    pub signature: Vec<Type>,
    /// Return type.
    pub return_type: Type,
    /// Body. Empty for declarations.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// String attributes (`entry_point`, `required_num_qubits`, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Function {
    /// Create a declaration.
    pub fn declaration(
        name: impl Into<String>,
        signature: impl IntoIterator<Item = Type>,
        return_type: Type,
    ) -> Self {
        Self {
            name: name.into(),
            params: vec![],
            signature: signature.into_iter().collect(),
            return_type,
            blocks: vec![],
            attributes: BTreeMap::new(),
        }
    }

    /// Check if this function has no body.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check if this function is marked as the entry point.
    pub fn is_entry_point(&self) -> bool {
        self.attributes.contains_key(ENTRY_POINT_ATTR)
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        if self.is_declaration() {
            self.signature.len()
        } else {
            self.params.len()
        }
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get a block by id.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Iterate over all instructions in block layout order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    /// Build the control-flow graph.
    ///
    /// Edges to unknown blocks are skipped; [`Module::verify`](crate::Module::verify)
    /// reports them.
    pub fn cfg(&self) -> (DiGraph<BlockId, ()>, FxHashMap<BlockId, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut nodes = FxHashMap::default();
        for block in &self.blocks {
            nodes.insert(block.id, graph.add_node(block.id));
        }
        for block in &self.blocks {
            let from = nodes[&block.id];
            for succ in block.successors() {
                if let Some(&to) = nodes.get(&succ) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        (graph, nodes)
    }

    /// Block indices (positions in `blocks`) in reverse post-order from the
    /// first block, followed by unreachable blocks in layout order.
    ///
    /// In acyclic regions every definition is visited before its uses.
    pub fn reverse_post_order(&self) -> Vec<usize> {
        let Some(entry) = self.blocks.first() else {
            return vec![];
        };
        let (graph, nodes) = self.cfg();
        let position: FxHashMap<BlockId, usize> = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id, i))
            .collect();

        let mut post = vec![];
        let mut dfs = DfsPostOrder::new(&graph, nodes[&entry.id]);
        while let Some(node) = dfs.next(&graph) {
            post.push(position[&graph[node]]);
        }
        post.reverse();

        let mut seen = vec![false; self.blocks.len()];
        for &i in &post {
            seen[i] = true;
        }
        post.extend((0..self.blocks.len()).filter(|&i| !seen[i]));
        post
    }
}
