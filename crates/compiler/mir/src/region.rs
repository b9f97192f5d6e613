//! # Protected Regions
//!
//! A protected region is a run of blocks whose every exit (fallthrough `leave`,
//! `break`/`continue`/`return` lowered to `leave`, or an exception unwinding through
//! it) runs the region's handler exactly once. The handler performs the single
//! cleanup obligation the region was opened for.

use cinder_compiler_semantic::{MethodId, TypeId};

use crate::{indent_str, BasicBlockId, DisposeMode, PrettyPrint, RegionId, Value, ValueId};

/// Which construct opened a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// A `using` resource (statement or declaration form)
    Using,
    /// The enumerator of a `foreach`
    ForEach,
}

/// How the handler skips the disposal for an absent resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullGuard {
    /// Disposed unconditionally
    None,
    /// Reference (or possibly-reference type parameter) tested against null
    NotNull,
    /// Nullable value tested for presence, then unwrapped
    HasValue,
    /// Runtime capability test against the disposal interface
    RuntimeCheck { interface: TypeId },
}

/// The disposal a region's handler performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupObligation {
    /// Storage holding the resource; captured at region entry
    pub resource: ValueId,
    pub resource_type: TypeId,
    pub method: MethodId,
    pub mode: DisposeMode,
    pub guard: NullGuard,
    /// Defaults for omitted optional and `params` parameters of a pattern method
    pub args: Vec<Value>,
    /// `DisposeAsync`, awaited in the handler
    pub is_async: bool,
}

/// A protected region of a MIR function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRegion {
    pub kind: RegionKind,
    /// Enclosing region, if nested
    pub parent: Option<RegionId>,
    /// First block of the protected body
    pub entry: BasicBlockId,
    /// Handler blocks, entry first; they belong to the parent region
    pub handler_blocks: Vec<BasicBlockId>,
    pub obligation: CleanupObligation,
}

impl ProtectedRegion {
    pub const fn new(
        kind: RegionKind,
        parent: Option<RegionId>,
        entry: BasicBlockId,
        obligation: CleanupObligation,
    ) -> Self {
        Self {
            kind,
            parent,
            entry,
            handler_blocks: Vec::new(),
            obligation,
        }
    }

    /// Entry of the handler, once the region is closed
    pub fn handler(&self) -> Option<BasicBlockId> {
        self.handler_blocks.first().copied()
    }
}

impl PrettyPrint for ProtectedRegion {
    fn pretty_print(&self, indent: usize) -> String {
        let kind = match self.kind {
            RegionKind::Using => "using",
            RegionKind::ForEach => "foreach",
        };
        let parent = self
            .parent
            .map(|parent| format!(" in {parent:?}"))
            .unwrap_or_default();
        let handler = self
            .handler()
            .map(|handler| format!("{handler:?}"))
            .unwrap_or_else(|| "?".to_string());
        format!(
            "{}{kind}{parent}: entry {:?}, handler {handler}, disposes {}",
            indent_str(indent),
            self.entry,
            self.obligation.resource.pretty_print(0)
        )
    }
}
