//! Method type-argument inference by structural unification.
//!
//! Only the receiver (and by-value arguments, which protocol calls never pass) bind
//! type parameters; `out` parameters are outputs and never contribute. Substitution
//! never creates types: an instantiation the binder did not produce makes the
//! candidate inapplicable.

use crate::catalog::TypeCatalog;
use crate::types::{StructuralKey, TypeData};
use crate::TypeId;

pub(super) struct TypeBindings<'p> {
    params: &'p [TypeId],
    bound: Vec<Option<TypeId>>,
}

impl<'p> TypeBindings<'p> {
    pub fn new(params: &'p [TypeId]) -> Self {
        Self {
            params,
            bound: vec![None; params.len()],
        }
    }

    fn slot(&self, ty: TypeId) -> Option<usize> {
        self.params.iter().position(|param| *param == ty)
    }

    /// Binds type parameters occurring in `param` against the argument type `arg`
    pub fn unify(&mut self, catalog: &TypeCatalog, param: TypeId, arg: TypeId) {
        if let Some(slot) = self.slot(param) {
            if self.bound[slot].is_none() {
                self.bound[slot] = Some(arg);
            }
            return;
        }

        match (catalog.ty(param), catalog.ty(arg)) {
            (
                TypeData::Array {
                    element: p,
                    rank: param_rank,
                },
                TypeData::Array {
                    element: a,
                    rank: arg_rank,
                },
            ) if param_rank == arg_rank => self.unify(catalog, *p, *a),
            (TypeData::Tuple(ps), TypeData::Tuple(args)) if ps.len() == args.len() => {
                for (p, a) in ps.iter().zip(args) {
                    self.unify(catalog, *p, *a);
                }
            }
            (TypeData::Nullable(p), TypeData::Nullable(a))
            | (TypeData::Awaitable(p), TypeData::Awaitable(a)) => self.unify(catalog, *p, *a),
            (TypeData::Named(named), _) => {
                let Some(special) = named.special else {
                    return;
                };
                let Some(param_element) = special.element() else {
                    return;
                };
                // The argument must implement exactly one instantiation of the interface
                let mut elements: Vec<TypeId> = std::iter::once(arg)
                    .chain(catalog.all_interfaces(arg))
                    .filter_map(|ty| catalog.special(ty))
                    .filter(|candidate| {
                        std::mem::discriminant(candidate) == std::mem::discriminant(&special)
                    })
                    .filter_map(|candidate| candidate.element())
                    .collect();
                elements.dedup();
                if let [element] = elements.as_slice() {
                    self.unify(catalog, param_element, *element);
                }
            }
            _ => {}
        }
    }

    /// The inferred arguments, or `None` if any parameter stayed unbound
    pub fn type_arguments(&self) -> Option<Vec<TypeId>> {
        self.bound.iter().copied().collect()
    }

    pub fn substitute(&self, catalog: &TypeCatalog, ty: TypeId) -> Option<TypeId> {
        if let Some(slot) = self.slot(ty) {
            return self.bound[slot];
        }
        if self.params.is_empty() {
            return Some(ty);
        }

        match catalog.ty(ty) {
            TypeData::Array { element, rank } => {
                let substituted = self.substitute(catalog, *element)?;
                if substituted == *element {
                    return Some(ty);
                }
                catalog.find_interned(&StructuralKey::Array(substituted, *rank))
            }
            TypeData::Tuple(elements) => {
                let substituted = elements
                    .iter()
                    .map(|element| self.substitute(catalog, *element))
                    .collect::<Option<Vec<_>>>()?;
                if substituted == *elements {
                    return Some(ty);
                }
                catalog.find_interned(&StructuralKey::Tuple(substituted))
            }
            TypeData::Nullable(inner) => {
                let substituted = self.substitute(catalog, *inner)?;
                if substituted == *inner {
                    return Some(ty);
                }
                catalog.find_interned(&StructuralKey::Nullable(substituted))
            }
            TypeData::Awaitable(inner) => {
                let substituted = self.substitute(catalog, *inner)?;
                if substituted == *inner {
                    return Some(ty);
                }
                catalog.find_interned(&StructuralKey::Awaitable(substituted))
            }
            TypeData::Named(named) => {
                let Some(special) = named.special else {
                    return Some(ty);
                };
                let Some(element) = special.element() else {
                    return Some(ty);
                };
                let substituted = self.substitute(catalog, element)?;
                if substituted == element {
                    return Some(ty);
                }
                catalog.find_special(special.with_element(substituted))
            }
            _ => Some(ty),
        }
    }
}
