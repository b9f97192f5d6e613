//! # MIR Function
//!
//! This module defines the representation of a lowered function: its control flow
//! graph, its protected regions, and the bookkeeping that ties values back to user
//! locals and synthesized temporaries.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use cinder_compiler_semantic::{LocalId, TypeId};

use crate::{
    indent_str, BasicBlock, BasicBlockId, PrettyPrint, ProtectedRegion, RegionId, Terminator,
    ValueId,
};

/// Why a temporary was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TempKind {
    /// An evaluated assignment-target receiver (object, array, index, indexer argument)
    Receiver,
    /// The evaluated right-hand side of a deconstruction
    Source,
    /// One deconstructed component
    Component,
    /// A converted component or value
    Converted,
    /// The evaluated collection of a `foreach`
    Collection,
    Enumerator,
    /// The `Current` value of an iteration
    Current,
    /// Loop counter or bound of the array/string fast path
    Index,
    Bound,
    /// The captured resource of a `using`
    Resource,
    /// Branch condition
    Condition,
    /// The pending return value of a function exited through a region
    Return,
    /// Any other intermediate value
    Scratch,
}

/// Where a value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueOrigin {
    Parameter(LocalId),
    /// A user-declared local; never aliased by temporaries
    Local(LocalId),
    Temp(TempKind),
}

impl ValueOrigin {
    pub const fn is_temp(self) -> bool {
        matches!(self, Self::Temp(_))
    }
}

/// A function in MIR form
///
/// # Design Notes
///
/// - Blocks are stored in an `IndexVec` for efficient access by `BasicBlockId`
/// - `value_origins` doubles as the value allocator: a value's id is its index
/// - User locals map to one value each; temporaries are fresh per use site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirFunction {
    /// The function's name
    pub name: String,

    /// All basic blocks in the function
    pub basic_blocks: IndexVec<BasicBlockId, BasicBlock>,

    /// Protected regions, outermost before nested
    pub regions: IndexVec<RegionId, ProtectedRegion>,

    /// The entry block
    pub entry_block: BasicBlockId,

    /// Parameter values in declaration order
    pub parameters: Vec<ValueId>,

    /// User locals and parameters
    pub locals: FxHashMap<LocalId, ValueId>,

    /// Origin of every value, indexed by `ValueId`
    pub value_origins: IndexVec<ValueId, ValueOrigin>,

    /// Static type of every value
    pub value_types: FxHashMap<ValueId, TypeId>,

    pub return_type: TypeId,
}

impl MirFunction {
    /// Creates a new function with an empty entry block
    pub fn new(name: String, return_type: TypeId) -> Self {
        let mut basic_blocks = IndexVec::new();
        let entry_block = basic_blocks.push(BasicBlock::with_name("entry", None));

        Self {
            name,
            basic_blocks,
            regions: IndexVec::new(),
            entry_block,
            parameters: Vec::new(),
            locals: FxHashMap::default(),
            value_origins: IndexVec::new(),
            value_types: FxHashMap::default(),
            return_type,
        }
    }

    /// Adds a new basic block and returns its ID
    pub fn add_basic_block(&mut self, region: Option<RegionId>) -> BasicBlockId {
        self.basic_blocks.push(BasicBlock {
            region,
            ..BasicBlock::new()
        })
    }

    /// Adds a new named basic block and returns its ID
    pub fn add_basic_block_with_name(
        &mut self,
        name: impl Into<String>,
        region: Option<RegionId>,
    ) -> BasicBlockId {
        self.basic_blocks.push(BasicBlock::with_name(name, region))
    }

    /// Gets a basic block by ID
    pub fn get_basic_block(&self, id: BasicBlockId) -> Option<&BasicBlock> {
        self.basic_blocks.get(id)
    }

    /// Gets a mutable reference to a basic block by ID
    pub fn get_basic_block_mut(&mut self, id: BasicBlockId) -> Option<&mut BasicBlock> {
        self.basic_blocks.get_mut(id)
    }

    /// Returns an iterator over all basic blocks
    pub fn basic_blocks(&self) -> impl Iterator<Item = (BasicBlockId, &BasicBlock)> {
        self.basic_blocks.iter_enumerated()
    }

    /// Allocates a value with a known origin and type
    pub fn new_typed_value_id(&mut self, origin: ValueOrigin, ty: TypeId) -> ValueId {
        let id = self.value_origins.push(origin);
        self.value_types.insert(id, ty);
        id
    }

    /// Allocates a temporary
    pub fn new_temp(&mut self, kind: TempKind, ty: TypeId) -> ValueId {
        self.new_typed_value_id(ValueOrigin::Temp(kind), ty)
    }

    /// Gets the type of a value
    pub fn get_value_type(&self, id: ValueId) -> Option<TypeId> {
        self.value_types.get(&id).copied()
    }

    pub fn value_origin(&self, id: ValueId) -> Option<ValueOrigin> {
        self.value_origins.get(id).copied()
    }

    /// Returns true if `id` is a synthesized temporary
    pub fn is_temp(&self, id: ValueId) -> bool {
        self.value_origin(id).is_some_and(ValueOrigin::is_temp)
    }

    /// Looks up the value bound to a user local
    pub fn lookup_local(&self, local: LocalId) -> Option<ValueId> {
        self.locals.get(&local).copied()
    }

    /// Number of values allocated so far
    pub fn value_count(&self) -> usize {
        self.value_origins.len()
    }

    /// Gets a region by ID
    pub fn region(&self, id: RegionId) -> Option<&ProtectedRegion> {
        self.regions.get(id)
    }

    /// Regions from `region` outwards, `region` first
    pub fn region_chain(&self, region: Option<RegionId>) -> Vec<RegionId> {
        let mut chain = Vec::new();
        let mut current = region;
        while let Some(id) = current {
            chain.push(id);
            current = self.regions.get(id).and_then(|r| r.parent);
        }
        chain
    }

    /// Returns true if `inner` is `outer` or nested in it
    pub fn region_contains(&self, outer: Option<RegionId>, inner: Option<RegionId>) -> bool {
        match outer {
            None => true,
            Some(outer) => self.region_chain(inner).contains(&outer),
        }
    }

    /// Total number of cleanup-invoke instructions in the function
    pub fn dispose_count(&self) -> usize {
        self.basic_blocks.iter().map(BasicBlock::dispose_count).sum()
    }

    /// Validates the function structure
    ///
    /// Checks:
    /// - Entry block exists and is outside every region
    /// - All referenced blocks and regions exist
    /// - Every block passes its own validation
    pub fn validate(&self) -> Result<(), String> {
        let entry = self
            .basic_blocks
            .get(self.entry_block)
            .ok_or_else(|| format!("Entry block {:?} does not exist", self.entry_block))?;
        if entry.region.is_some() {
            return Err(format!(
                "Entry block {:?} lies inside a region",
                self.entry_block
            ));
        }

        for (block_id, block) in self.basic_blocks() {
            if let Err(err) = block.validate() {
                return Err(format!("Block {block_id:?} validation failed: {err}"));
            }

            for target in block.terminator.target_blocks() {
                if self.basic_blocks.get(target).is_none() {
                    return Err(format!(
                        "Block {block_id:?} targets non-existent block {target:?}"
                    ));
                }
            }

            match &block.terminator {
                Terminator::Enter { region, .. } | Terminator::EndHandler { region }
                    if self.regions.get(*region).is_none() =>
                {
                    return Err(format!(
                        "Block {block_id:?} references non-existent region {region:?}"
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Checks if a basic block is reachable from the entry block
    ///
    /// Handlers count as reachable from every block of their region.
    pub fn is_block_reachable(&self, target: BasicBlockId) -> bool {
        self.reachable_blocks().contains(&target)
    }

    fn reachable_blocks(&self) -> Vec<BasicBlockId> {
        let mut visited = vec![false; self.basic_blocks.len()];
        let mut order = Vec::new();
        let mut stack = vec![self.entry_block];

        while let Some(current) = stack.pop() {
            let Some(block) = self.basic_blocks.get(current) else {
                continue;
            };
            if std::mem::replace(&mut visited[current.index()], true) {
                continue;
            }
            order.push(current);
            stack.extend(block.terminator.target_blocks());
            for region in self.region_chain(block.region) {
                if let Some(handler) = self.regions[region].handler() {
                    stack.push(handler);
                }
            }
        }

        order
    }

    /// Returns all unreachable basic blocks
    pub fn unreachable_blocks(&self) -> Vec<BasicBlockId> {
        let reachable = self.reachable_blocks();
        self.basic_blocks()
            .map(|(id, _)| id)
            .filter(|id| !reachable.contains(id))
            .collect()
    }
}

impl PrettyPrint for MirFunction {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();
        let base_indent = indent_str(indent);

        result.push_str(&format!("{}fn {} {{\n", base_indent, self.name));

        // Print parameters
        if !self.parameters.is_empty() {
            let params = self
                .parameters
                .iter()
                .map(|p| p.pretty_print(0))
                .collect::<Vec<_>>()
                .join(", ");
            result.push_str(&format!("{base_indent}  parameters: {params}\n"));
        }

        result.push_str(&format!(
            "{}  entry: {entry:?}\n",
            base_indent,
            entry = self.entry_block
        ));

        for (region_id, region) in self.regions.iter_enumerated() {
            result.push_str(&format!(
                "{base_indent}  {region_id:?} {}\n",
                region.pretty_print(0)
            ));
        }
        result.push('\n');

        // Print basic blocks
        for (block_id, block) in self.basic_blocks() {
            let mut block_display = format!("{block_id:?}");
            if let Some(name) = &block.name {
                block_display.push_str(&format!(" ({name})"));
            }
            if let Some(region) = block.region {
                block_display.push_str(&format!(" in {region:?}"));
            }
            result.push_str(&format!("{base_indent}  {block_display}:\n"));
            result.push_str(&block.pretty_print(indent + 2));
            result.push('\n');
        }

        result.push_str(&format!("{base_indent}}}\n"));
        result
    }
}

#[cfg(test)]
#[path = "function_tests.rs"]
mod tests;
