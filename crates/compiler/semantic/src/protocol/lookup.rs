//! Member lookup for protocol queries: lookup levels, accessibility, shape matching.

use rustc_hash::FxHashSet;

use super::betterness::select_best;
use super::inference::TypeBindings;
use super::{LookupOutcome, Protocol, ProtocolCandidate, ProtocolResolver, Resolution};
use crate::catalog::TypeCatalog;
use crate::conversions::{Conversion, ConversionInserter};
use crate::definition::{Accessibility, MemberId, MethodId, ParamKind};
use crate::types::{PrimitiveType, TypeData, TypeKind};
use crate::TypeId;

/// Types searched for instance members, most-derived first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupLevels(Vec<TypeId>);

impl LookupLevels {
    pub fn compute(catalog: &TypeCatalog, receiver: TypeId) -> Self {
        let levels = match catalog.ty(receiver) {
            TypeData::Named(named) if named.kind == TypeKind::Interface => {
                let mut levels = vec![receiver];
                levels.extend(catalog.all_interfaces(receiver));
                levels
            }
            TypeData::TypeParameter(_) => {
                let mut levels = catalog.all_interfaces(receiver);
                levels.push(catalog.well_known().object);
                levels
            }
            _ => catalog.base_chain(receiver),
        };
        Self(levels)
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[TypeId] {
        &self.0
    }
}

impl ProtocolResolver<'_> {
    fn is_accessible(&self, accessibility: Accessibility, owner: TypeId) -> bool {
        match accessibility {
            Accessibility::Public | Accessibility::Internal => true,
            Accessibility::Private => self.call_site.containing_type == Some(owner),
            Accessibility::Protected => self
                .call_site
                .containing_type
                .is_some_and(|containing| self.catalog.derives_from(containing, owner)),
        }
    }

    fn member_accessible(&self, member: MemberId) -> bool {
        match member {
            MemberId::Method(method) => {
                let def = self.catalog.method(method);
                self.is_accessible(def.accessibility, def.owner)
            }
            MemberId::Property(property) => {
                let def = self.catalog.property(property);
                def.getter.is_none_or(|getter| {
                    let getter = self.catalog.method(getter);
                    self.is_accessible(getter.accessibility, getter.owner)
                })
            }
            MemberId::Field(_) => true,
        }
    }

    /// Step 1: the first level declaring an accessible member of the name decides
    pub(super) fn lookup_instance(
        &self,
        receiver: TypeId,
        protocol: Protocol,
        arity: usize,
    ) -> LookupOutcome {
        let catalog = self.catalog;
        let name = protocol.member_name();
        let levels = LookupLevels::compute(catalog, receiver);

        for level in levels.iter() {
            let members: Vec<MemberId> = catalog
                .members_named(level, name)
                .iter()
                .copied()
                .filter(|member| self.member_accessible(*member))
                .collect();
            if members.is_empty() {
                continue;
            }

            let candidates: Vec<ProtocolCandidate> = members
                .iter()
                .filter_map(|member| self.instance_candidate(*member, receiver, protocol, arity))
                .collect();
            tracing::trace!(
                "{name} on {}: level {} declares {} members, {} applicable",
                catalog.format_type(receiver),
                catalog.format_type(level),
                members.len(),
                candidates.len()
            );
            return LookupOutcome {
                resolution: select_best(catalog, candidates),
                declared: true,
            };
        }

        LookupOutcome {
            resolution: Resolution::NotFound,
            declared: false,
        }
    }

    fn instance_candidate(
        &self,
        member: MemberId,
        receiver: TypeId,
        protocol: Protocol,
        arity: usize,
    ) -> Option<ProtocolCandidate> {
        match (protocol, member) {
            (Protocol::Current, MemberId::Property(property)) => {
                let def = self.catalog.property(property);
                let getter = def.getter?;
                if def.is_static {
                    return None;
                }
                Some(ProtocolCandidate {
                    method: getter,
                    origin: def.owner,
                    param_types: Vec::new(),
                    return_type: def.ty,
                    is_extension: false,
                    type_arguments: Vec::new(),
                    expanded: false,
                    defaulted: 0,
                    accessibility: self.catalog.method(getter).accessibility,
                    receiver_conversion: Conversion::Identity,
                    receiver_type: def.owner,
                })
            }
            (Protocol::Current, _) => None,
            (_, MemberId::Method(method)) => {
                let def = self.catalog.method(method);
                if def.is_static || def.is_extension {
                    return None;
                }
                self.shape_candidate(method, receiver, protocol, arity)
            }
            _ => None,
        }
    }

    /// Step 2: extension methods, innermost namespace first
    pub(super) fn lookup_extension(
        &self,
        receiver: TypeId,
        protocol: Protocol,
        arity: usize,
    ) -> LookupOutcome {
        let catalog = self.catalog;
        let name = protocol.member_name();
        let mut namespace = Some(self.call_site.namespace);

        while let Some(current) = namespace {
            let def = catalog.namespace(current);
            let mut seen = FxHashSet::default();
            let visible = def.extension_methods.iter().chain(
                def.imports
                    .iter()
                    .flat_map(|import| catalog.namespace(*import).extension_methods.iter()),
            );

            let candidates: Vec<ProtocolCandidate> = visible
                .copied()
                .filter(|method| seen.insert(*method))
                .filter(|method| {
                    let def = catalog.method(*method);
                    def.name == name && self.is_accessible(def.accessibility, def.owner)
                })
                .filter_map(|method| self.shape_candidate(method, receiver, protocol, arity))
                .collect();

            if !candidates.is_empty() {
                tracing::trace!(
                    "{name} on {}: {} extension candidates in namespace '{}'",
                    catalog.format_type(receiver),
                    candidates.len(),
                    def.name
                );
                return LookupOutcome {
                    resolution: select_best(catalog, candidates),
                    declared: true,
                };
            }
            namespace = def.parent;
        }

        LookupOutcome {
            resolution: Resolution::NotFound,
            declared: false,
        }
    }

    /// Checks a method against the protocol's shape, inferring generic arguments
    fn shape_candidate(
        &self,
        method: MethodId,
        receiver: TypeId,
        protocol: Protocol,
        arity: usize,
    ) -> Option<ProtocolCandidate> {
        let catalog = self.catalog;
        let def = catalog.method(method);
        let params = def.call_params();

        let (expanded, defaulted) = if protocol == Protocol::Deconstruct {
            if params.len() != arity || params.iter().any(|p| p.kind != ParamKind::Out) {
                return None;
            }
            (false, 0)
        } else {
            if params.iter().any(|p| !p.can_omit()) {
                return None;
            }
            (
                params.iter().any(|p| p.kind == ParamKind::Params),
                params.iter().filter(|p| p.optional).count(),
            )
        };

        let mut bindings = TypeBindings::new(&def.type_params);
        if let Some(this) = def.receiver_param() {
            bindings.unify(catalog, this.ty, receiver);
        }
        let Some(type_arguments) = bindings.type_arguments() else {
            tracing::trace!("dropping {}: type arguments cannot be inferred", def.name);
            return None;
        };

        let param_types = params
            .iter()
            .map(|p| bindings.substitute(catalog, p.ty))
            .collect::<Option<Vec<_>>>()?;
        let return_type = bindings.substitute(catalog, def.return_type)?;
        if !self.return_matches(protocol, return_type) {
            return None;
        }

        let (receiver_type, receiver_conversion) = match def.receiver_param() {
            Some(this) => {
                let this_type = bindings.substitute(catalog, this.ty)?;
                let conversion =
                    ConversionInserter::new(catalog).classify_implicit(receiver, this_type)?;
                if !matches!(
                    conversion,
                    Conversion::Identity | Conversion::ImplicitReference | Conversion::Boxing
                ) {
                    return None;
                }
                (this_type, conversion)
            }
            None => (def.owner, Conversion::Identity),
        };

        Some(ProtocolCandidate {
            method,
            origin: def.owner,
            param_types,
            return_type,
            is_extension: def.is_extension,
            type_arguments,
            expanded,
            defaulted,
            accessibility: def.accessibility,
            receiver_conversion,
            receiver_type,
        })
    }

    fn return_matches(&self, protocol: Protocol, return_type: TypeId) -> bool {
        let catalog = self.catalog;
        let void = catalog.well_known().void;
        let bool_ty = catalog.primitive(PrimitiveType::Bool);
        match protocol {
            Protocol::Deconstruct | Protocol::Dispose => return_type == void,
            Protocol::GetEnumerator | Protocol::GetAsyncEnumerator => return_type != void,
            Protocol::MoveNext => return_type == bool_ty,
            Protocol::MoveNextAsync => {
                matches!(catalog.ty(return_type), TypeData::Awaitable(inner) if *inner == bool_ty)
            }
            Protocol::DisposeAsync => matches!(catalog.ty(return_type), TypeData::Awaitable(_)),
            Protocol::Current => true,
        }
    }
}
