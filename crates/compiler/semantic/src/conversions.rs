//! # Conversion Classification
//!
//! Decides which conversion, if any, a produced value needs before it can be stored
//! into a target slot. The lowering engine asks at exactly the points where a value
//! flows into a declared target (deconstruction leaves, iteration variables, resource
//! variables, assignments) and emits a `Convert` step for every classification that
//! is not a no-op.

use std::fmt;

use cinder_compiler_diagnostics::Diagnostic;
use chumsky::span::SimpleSpan;

use crate::bound::{Expr, ExprKind};
use crate::catalog::TypeCatalog;
use crate::definition::{MemberId, MethodId};
use crate::types::{TypeData, TypeKind};
use crate::TypeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conversion {
    Identity,
    /// `null` stored into a reference or nullable slot
    NullLiteral,
    /// `default` stored into any slot
    DefaultLiteral,
    /// Tuple literal converted element by element
    TupleLiteral(Vec<Conversion>),
    ImplicitNumeric,
    ImplicitReference,
    Boxing,
    /// `S -> T?` wrap or lifted `S? -> T?`, with the underlying conversion
    ImplicitNullable(Box<Conversion>),
    ImplicitTuple(Vec<Conversion>),
    UserDefined {
        operator: MethodId,
        /// Standard conversion from the source to the operator's parameter
        argument: Box<Conversion>,
    },
    ExplicitNumeric,
    Unboxing,
    ExplicitReference,
    /// `S? -> T` unwrap, with the underlying conversion
    ExplicitNullable(Box<Conversion>),
}

impl Conversion {
    /// Returns true when the conversion leaves the value untouched and no step is emitted
    pub fn is_no_op(&self) -> bool {
        match self {
            Self::Identity | Self::NullLiteral | Self::DefaultLiteral => true,
            Self::ImplicitTuple(elements) | Self::TupleLiteral(elements) => {
                elements.iter().all(Self::is_no_op)
            }
            _ => false,
        }
    }

    pub const fn is_implicit(&self) -> bool {
        !matches!(
            self,
            Self::ExplicitNumeric
                | Self::Unboxing
                | Self::ExplicitReference
                | Self::ExplicitNullable(_)
        )
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::NullLiteral => "null",
            Self::DefaultLiteral => "default",
            Self::TupleLiteral(_) => "tuple_literal",
            Self::ImplicitNumeric => "numeric",
            Self::ImplicitReference => "reference",
            Self::Boxing => "box",
            Self::ImplicitNullable(_) => "nullable",
            Self::ImplicitTuple(_) => "tuple",
            Self::UserDefined { .. } => "user",
            Self::ExplicitNumeric => "explicit_numeric",
            Self::Unboxing => "unbox",
            Self::ExplicitReference => "downcast",
            Self::ExplicitNullable(_) => "unwrap",
        }
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A value whose type cannot be converted to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionError {
    pub source: TypeId,
    pub target: TypeId,
    pub explicit: bool,
}

impl ConversionError {
    pub fn to_diagnostic(&self, catalog: &TypeCatalog, span: SimpleSpan<usize>) -> Diagnostic {
        let from = catalog.format_type(self.source);
        let to = catalog.format_type(self.target);
        if self.explicit {
            Diagnostic::no_explicit_conversion(&from, &to, span)
        } else {
            Diagnostic::no_implicit_conversion(&from, &to, span)
        }
    }
}

/// Classifies conversions against a type catalog
#[derive(Debug, Clone, Copy)]
pub struct ConversionInserter<'a> {
    catalog: &'a TypeCatalog,
}

impl<'a> ConversionInserter<'a> {
    pub const fn new(catalog: &'a TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Implicit conversion of an expression into a slot of type `target`
    pub fn convert(&self, expr: &Expr, target: TypeId) -> Result<Conversion, ConversionError> {
        self.classify_expr(expr, target).ok_or(ConversionError {
            source: expr.ty,
            target,
            explicit: false,
        })
    }

    /// Implicit conversion between two static types
    pub fn convert_type(
        &self,
        source: TypeId,
        target: TypeId,
    ) -> Result<Conversion, ConversionError> {
        self.classify_implicit(source, target).ok_or(ConversionError {
            source,
            target,
            explicit: false,
        })
    }

    /// Explicit conversion between two static types, as applied to iteration variables
    pub fn convert_explicit(
        &self,
        source: TypeId,
        target: TypeId,
    ) -> Result<Conversion, ConversionError> {
        self.classify_explicit(source, target).ok_or(ConversionError {
            source,
            target,
            explicit: true,
        })
    }

    pub fn classify_expr(&self, expr: &Expr, target: TypeId) -> Option<Conversion> {
        match &expr.kind {
            ExprKind::Null if expr.ty == self.catalog.well_known().null => {
                self.null_conversion(target)
            }
            ExprKind::Default if expr.ty == self.catalog.well_known().default => {
                Some(Conversion::DefaultLiteral)
            }
            ExprKind::Tuple(elements) => {
                if let TypeData::Tuple(targets) = self.catalog.ty(target) {
                    if targets.len() == elements.len() {
                        return elements
                            .iter()
                            .zip(targets)
                            .map(|(element, element_target)| {
                                self.classify_expr(element, *element_target)
                            })
                            .collect::<Option<Vec<_>>>()
                            .map(Conversion::TupleLiteral);
                    }
                }
                self.classify_implicit(expr.ty, target)
            }
            _ => self.classify_implicit(expr.ty, target),
        }
    }

    fn null_conversion(&self, target: TypeId) -> Option<Conversion> {
        let catalog = self.catalog;
        let accepts_null = catalog.is_reference_type(target)
            || catalog.is_nullable(target)
            || matches!(catalog.ty(target), TypeData::Null | TypeData::Error);
        accepts_null.then_some(Conversion::NullLiteral)
    }

    pub fn classify_implicit(&self, source: TypeId, target: TypeId) -> Option<Conversion> {
        let conversion = self
            .standard_implicit(source, target)
            .or_else(|| self.user_defined(source, target, "op_Implicit"));
        tracing::trace!(
            "implicit {} -> {}: {:?}",
            self.catalog.format_type(source),
            self.catalog.format_type(target),
            conversion
        );
        conversion
    }

    /// Every implicit conversion except user-defined operators
    fn standard_implicit(&self, source: TypeId, target: TypeId) -> Option<Conversion> {
        let catalog = self.catalog;
        if source == target {
            return Some(Conversion::Identity);
        }
        let well_known = catalog.well_known();
        if source == well_known.error || target == well_known.error {
            return Some(Conversion::Identity);
        }
        if source == well_known.null {
            return self.null_conversion(target);
        }
        if source == well_known.default {
            return Some(Conversion::DefaultLiteral);
        }

        if let (Some(from), Some(to)) = (catalog.as_primitive(source), catalog.as_primitive(target))
        {
            return from.widens_to(to).then_some(Conversion::ImplicitNumeric);
        }

        if let Some(conversion) = self.reference_or_boxing(source, target) {
            return Some(conversion);
        }

        match (catalog.ty(source), catalog.ty(target)) {
            (TypeData::Nullable(from), TypeData::Nullable(to)) => {
                let underlying = self.nullable_underlying(*from, *to)?;
                Some(Conversion::ImplicitNullable(Box::new(underlying)))
            }
            (_, TypeData::Nullable(to)) => {
                let underlying = self.nullable_underlying(source, *to)?;
                Some(Conversion::ImplicitNullable(Box::new(underlying)))
            }
            (TypeData::Tuple(from), TypeData::Tuple(to)) if from.len() == to.len() => from
                .iter()
                .zip(to)
                .map(|(f, t)| self.classify_implicit(*f, *t))
                .collect::<Option<Vec<_>>>()
                .map(Conversion::ImplicitTuple),
            _ => None,
        }
    }

    fn nullable_underlying(&self, from: TypeId, to: TypeId) -> Option<Conversion> {
        if from == to {
            return Some(Conversion::Identity);
        }
        let (from, to) = (
            self.catalog.as_primitive(from)?,
            self.catalog.as_primitive(to)?,
        );
        from.widens_to(to).then_some(Conversion::ImplicitNumeric)
    }

    fn reference_or_boxing(&self, source: TypeId, target: TypeId) -> Option<Conversion> {
        let catalog = self.catalog;
        let targets_object = target == catalog.well_known().object;
        let targets_interface = catalog.is_interface(target) && catalog.implements(source, target);

        if catalog.is_reference_type(source) {
            let derives = !catalog.is_interface(target) && catalog.derives_from(source, target);
            return (targets_object || targets_interface || derives)
                .then_some(Conversion::ImplicitReference);
        }

        if catalog.is_ref_like(source) || catalog.ty(source) == &TypeData::Void {
            return None;
        }
        let boxable = catalog.is_value_type(source)
            || matches!(catalog.ty(source), TypeData::TypeParameter(_));
        (boxable && (targets_object || targets_interface)).then_some(Conversion::Boxing)
    }

    fn user_defined(&self, source: TypeId, target: TypeId, name: &str) -> Option<Conversion> {
        let catalog = self.catalog;
        let mut candidates: Vec<(MethodId, Conversion)> = Vec::new();
        for owner in [source, target] {
            for member in catalog.members_named(owner, name) {
                let MemberId::Method(method) = *member else {
                    continue;
                };
                let def = catalog.method(method);
                if !def.is_static || def.params.len() != 1 || def.return_type != target {
                    continue;
                }
                if candidates.iter().any(|(existing, _)| *existing == method) {
                    continue;
                }
                if let Some(argument) = self.standard_implicit(source, def.params[0].ty) {
                    candidates.push((method, argument));
                }
            }
        }

        if candidates.is_empty() {
            return None;
        }
        // An operator taking the source type exactly beats one reached by a conversion
        let chosen = candidates
            .iter()
            .position(|(_, argument)| *argument == Conversion::Identity)
            .unwrap_or(0);
        let (operator, argument) = candidates.swap_remove(chosen);
        Some(Conversion::UserDefined {
            operator,
            argument: Box::new(argument),
        })
    }

    pub fn classify_explicit(&self, source: TypeId, target: TypeId) -> Option<Conversion> {
        if let Some(implicit) = self.classify_implicit(source, target) {
            return Some(implicit);
        }
        let catalog = self.catalog;

        if let (Some(from), Some(to)) = (catalog.as_primitive(source), catalog.as_primitive(target))
        {
            return (from.is_numeric() && to.is_numeric()).then_some(Conversion::ExplicitNumeric);
        }

        if let TypeData::Nullable(underlying) = catalog.ty(source) {
            if let Some(conversion) = self.classify_explicit(*underlying, target) {
                if !catalog.is_nullable(target) {
                    return Some(Conversion::ExplicitNullable(Box::new(conversion)));
                }
            }
        }

        let from_object_or_interface =
            source == catalog.well_known().object || catalog.is_interface(source);
        if from_object_or_interface && catalog.is_value_type(target) {
            return (!catalog.is_ref_like(target)).then_some(Conversion::Unboxing);
        }

        if catalog.is_reference_type(target) {
            let downcast = catalog.derives_from(target, source)
                || source == catalog.well_known().object
                || (catalog.is_interface(source) && !catalog.is_sealed(target))
                || (catalog.is_interface(source) && catalog.implements(target, source))
                || (catalog.is_interface(target)
                    && catalog.named(source).is_some_and(|n| n.kind == TypeKind::Class)
                    && !catalog.is_sealed(source));
            if downcast {
                return Some(Conversion::ExplicitReference);
            }
        }

        if matches!(catalog.ty(target), TypeData::TypeParameter(_)) && from_object_or_interface {
            return Some(Conversion::Unboxing);
        }
        if matches!(catalog.ty(source), TypeData::TypeParameter(_)) && catalog.is_interface(target)
        {
            return Some(Conversion::Boxing);
        }

        self.user_defined(source, target, "op_Explicit")
    }
}

#[cfg(test)]
#[path = "conversions_tests.rs"]
mod tests;
