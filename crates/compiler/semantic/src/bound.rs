//! # Bound Tree
//!
//! The typed expression and statement tree the binder hands to lowering. Every
//! expression already carries its static type and whether it denotes addressable
//! storage; conversions are *not* applied yet, that is the lowering engine's job.

use chumsky::span::SimpleSpan;
use index_vec::IndexVec;
use smol_str::SmolStr;

use crate::catalog::TypeCatalog;
use crate::definition::{CallSite, FieldId, MethodId, PropertyId};
use crate::TypeId;

index_vec::define_index_type! {
    /// Identifier of a local variable or parameter in a bound function
    pub struct LocalId = usize;

    MAX_INDEX = usize::MAX;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDef {
    pub name: SmolStr,
    pub ty: TypeId,
    /// `false` for using-variables, foreach variables and `readonly`-like locals
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Int(i64),
    Bool(bool),
    Char(char),
    Str(SmolStr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
    pub span: SimpleSpan<usize>,
    /// Denotes a storage location whose address may be taken
    pub addressable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Literal(Constant),
    /// The untyped `null` literal, or a `null` already typed by its context
    Null,
    /// The `default` literal
    Default,
    Local(LocalId),
    /// Tuple literal `(a, b, ...)`
    Tuple(Vec<Expr>),
    Field {
        receiver: Option<Box<Expr>>,
        field: FieldId,
    },
    ArrayElement {
        array: Box<Expr>,
        indices: Vec<Expr>,
    },
    /// Property get; non-empty `args` make it an indexer access
    Property {
        receiver: Option<Box<Expr>>,
        property: PropertyId,
        args: Vec<Expr>,
    },
    Call {
        receiver: Option<Box<Expr>>,
        method: MethodId,
        args: Vec<Expr>,
    },
    New {
        args: Vec<Expr>,
    },
}

impl Expr {
    fn new(kind: ExprKind, ty: TypeId, addressable: bool) -> Self {
        Self {
            kind,
            ty,
            span: SimpleSpan::from(0..0),
            addressable,
        }
    }

    pub const fn with_span(mut self, span: SimpleSpan<usize>) -> Self {
        self.span = span;
        self
    }

    pub fn literal(constant: Constant, ty: TypeId) -> Self {
        Self::new(ExprKind::Literal(constant), ty, false)
    }

    pub fn null(catalog: &TypeCatalog) -> Self {
        Self::new(ExprKind::Null, catalog.well_known().null, false)
    }

    pub fn default_literal(catalog: &TypeCatalog) -> Self {
        Self::new(ExprKind::Default, catalog.well_known().default, false)
    }

    pub fn local(local: LocalId, ty: TypeId) -> Self {
        Self::new(ExprKind::Local(local), ty, true)
    }

    /// Tuple literal typed by its element types
    pub fn tuple(elements: Vec<Expr>, catalog: &mut TypeCatalog) -> Self {
        let ty = catalog.tuple_of(elements.iter().map(|e| e.ty).collect());
        Self::new(ExprKind::Tuple(elements), ty, false)
    }

    /// Field access; a field is addressable when it lives in a heap object, in
    /// static storage, or in an addressable value
    pub fn field(receiver: Option<Expr>, field: FieldId, catalog: &TypeCatalog) -> Self {
        let def = catalog.field(field);
        let addressable = receiver
            .as_ref()
            .is_none_or(|r| r.addressable || catalog.is_reference_type(r.ty));
        Self::new(
            ExprKind::Field {
                receiver: receiver.map(Box::new),
                field,
            },
            def.ty,
            addressable,
        )
    }

    pub fn array_element(array: Expr, indices: Vec<Expr>, element_ty: TypeId) -> Self {
        Self::new(
            ExprKind::ArrayElement {
                array: Box::new(array),
                indices,
            },
            element_ty,
            true,
        )
    }

    pub fn property(
        receiver: Option<Expr>,
        property: PropertyId,
        args: Vec<Expr>,
        catalog: &TypeCatalog,
    ) -> Self {
        Self::new(
            ExprKind::Property {
                receiver: receiver.map(Box::new),
                property,
                args,
            },
            catalog.property(property).ty,
            false,
        )
    }

    pub fn call(
        receiver: Option<Expr>,
        method: MethodId,
        args: Vec<Expr>,
        catalog: &TypeCatalog,
    ) -> Self {
        Self::new(
            ExprKind::Call {
                receiver: receiver.map(Box::new),
                method,
                args,
            },
            catalog.method(method).return_type,
            false,
        )
    }

    pub fn new_object(ty: TypeId, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::New { args }, ty, false)
    }

    pub const fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Null)
    }

    pub const fn is_default_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Default)
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self.kind {
            ExprKind::Local(local) => Some(local),
            _ => None,
        }
    }
}

/// An assignment target or freshly declared variable in a deconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub kind: BindingKind,
    /// Declared type; `None` for `var` declarations and untyped discards
    pub ty: Option<TypeId>,
    pub span: SimpleSpan<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Pre-existing local
    Local(LocalId),
    /// Fresh declaration (`int x` or `var x`)
    Declaration(LocalId),
    Discard,
    Field {
        receiver: Option<Expr>,
        field: FieldId,
    },
    ArrayElement {
        array: Expr,
        indices: Vec<Expr>,
    },
    /// Property or indexer setter
    Property {
        receiver: Option<Expr>,
        property: PropertyId,
        args: Vec<Expr>,
    },
}

impl Binding {
    fn new(kind: BindingKind, ty: Option<TypeId>) -> Self {
        Self {
            kind,
            ty,
            span: SimpleSpan::from(0..0),
        }
    }

    pub fn local(local: LocalId, ty: TypeId) -> Self {
        Self::new(BindingKind::Local(local), Some(ty))
    }

    pub fn declaration(local: LocalId, ty: TypeId) -> Self {
        Self::new(BindingKind::Declaration(local), Some(ty))
    }

    /// `var x`
    pub fn implicit_declaration(local: LocalId) -> Self {
        Self::new(BindingKind::Declaration(local), None)
    }

    pub fn discard() -> Self {
        Self::new(BindingKind::Discard, None)
    }

    pub fn typed_discard(ty: TypeId) -> Self {
        Self::new(BindingKind::Discard, Some(ty))
    }

    pub fn field(receiver: Option<Expr>, field: FieldId, catalog: &TypeCatalog) -> Self {
        Self::new(
            BindingKind::Field { receiver, field },
            Some(catalog.field(field).ty),
        )
    }

    pub fn array_element(array: Expr, indices: Vec<Expr>, element_ty: TypeId) -> Self {
        Self::new(BindingKind::ArrayElement { array, indices }, Some(element_ty))
    }

    pub fn property(
        receiver: Option<Expr>,
        property: PropertyId,
        args: Vec<Expr>,
        catalog: &TypeCatalog,
    ) -> Self {
        Self::new(
            BindingKind::Property {
                receiver,
                property,
                args,
            },
            Some(catalog.property(property).ty),
        )
    }

    pub const fn with_span(mut self, span: SimpleSpan<usize>) -> Self {
        self.span = span;
        self
    }

    pub const fn is_declaration(&self) -> bool {
        matches!(self.kind, BindingKind::Declaration(_))
    }

    pub const fn is_discard(&self) -> bool {
        matches!(self.kind, BindingKind::Discard)
    }

    /// Assignment to storage that existed before the statement
    pub const fn is_assignment(&self) -> bool {
        !self.is_declaration() && !self.is_discard()
    }
}

/// Left-hand side of a deconstruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeconstructionTarget {
    Leaf(Binding),
    Group {
        elements: Vec<DeconstructionTarget>,
        span: SimpleSpan<usize>,
    },
}

impl DeconstructionTarget {
    pub fn group(elements: Vec<DeconstructionTarget>) -> Self {
        Self::Group {
            elements,
            span: SimpleSpan::from(0..0),
        }
    }

    pub const fn span(&self) -> SimpleSpan<usize> {
        match self {
            Self::Leaf(binding) => binding.span,
            Self::Group { span, .. } => *span,
        }
    }

    /// Visits every leaf in source order
    pub fn leaves(&self) -> Vec<&Binding> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Binding>) {
        match self {
            Self::Leaf(binding) => leaves.push(binding),
            Self::Group { elements, .. } => {
                for element in elements {
                    element.collect_leaves(leaves);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForEachVariable {
    /// `foreach (T x in ...)`; `ty` is `None` for `var`
    Single { local: LocalId, ty: Option<TypeId> },
    /// `foreach (var (a, b) in ...)`
    Deconstruct(DeconstructionTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachStatement {
    pub variable: ForEachVariable,
    pub collection: Expr,
    pub body: Statement,
    /// `await foreach`
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsingResource {
    /// `using (T x = e)`
    Declared { local: LocalId, init: Expr },
    /// `using (e)`
    Expression(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingStatement {
    /// Resources in acquisition order
    pub resources: Vec<UsingResource>,
    pub body: Statement,
    /// `await using`
    pub is_async: bool,
}

/// `using var x = e;` guarding the remainder of the enclosing block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDeclaration {
    pub resources: Vec<(LocalId, Expr)>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: SimpleSpan<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Expression(Expr),
    /// `T x = e;`
    Local {
        local: LocalId,
        init: Option<Expr>,
    },
    /// `target = e;` through a single binding
    Assign {
        target: Binding,
        value: Expr,
    },
    Deconstruction {
        target: DeconstructionTarget,
        value: Expr,
    },
    ForEach(Box<ForEachStatement>),
    Using(Box<UsingStatement>),
    UsingDeclaration(UsingDeclaration),
    Block(Vec<Statement>),
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            span: SimpleSpan::from(0..0),
        }
    }

    pub const fn with_span(mut self, span: SimpleSpan<usize>) -> Self {
        self.span = span;
        self
    }

    pub fn expression(expr: Expr) -> Self {
        Self::new(StatementKind::Expression(expr))
    }

    pub fn deconstruction(target: DeconstructionTarget, value: Expr) -> Self {
        Self::new(StatementKind::Deconstruction { target, value })
    }

    pub fn block(statements: Vec<Statement>) -> Self {
        Self::new(StatementKind::Block(statements))
    }

    pub fn foreach(foreach: ForEachStatement) -> Self {
        Self::new(StatementKind::ForEach(Box::new(foreach)))
    }

    pub fn using(using: UsingStatement) -> Self {
        Self::new(StatementKind::Using(Box::new(using)))
    }
}

/// A type-checked function body ready for lowering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundFunction {
    pub name: SmolStr,
    pub params: Vec<LocalId>,
    pub locals: IndexVec<LocalId, LocalDef>,
    pub return_type: TypeId,
    pub body: Vec<Statement>,
    /// Namespace and type the body is declared in, for extension lookup
    pub call_site: CallSite,
}

impl BoundFunction {
    pub fn new(name: &str, return_type: TypeId, call_site: CallSite) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            locals: IndexVec::new(),
            return_type,
            body: Vec::new(),
            call_site,
        }
    }

    pub fn declare_local(&mut self, name: &str, ty: TypeId) -> LocalId {
        self.locals.push(LocalDef {
            name: name.into(),
            ty,
            mutable: true,
        })
    }

    pub fn declare_readonly_local(&mut self, name: &str, ty: TypeId) -> LocalId {
        self.locals.push(LocalDef {
            name: name.into(),
            ty,
            mutable: false,
        })
    }

    pub fn declare_param(&mut self, name: &str, ty: TypeId) -> LocalId {
        let id = self.declare_local(name, ty);
        self.params.push(id);
        id
    }

    /// Expression reading local `id`
    pub fn local_expr(&self, id: LocalId) -> Expr {
        Expr::local(id, self.locals[id].ty)
    }
}
