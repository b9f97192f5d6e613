//! # Protocol Resolution
//!
//! Pattern-based lookup of the members the lowering engine calls on behalf of the
//! user: `Deconstruct`, `GetEnumerator`/`MoveNext`/`Current` and `Dispose` (plus their
//! async counterparts).
//!
//! A query walks the receiver's [`LookupLevels`] most-derived first. The first level
//! declaring *any* accessible member of the protocol's name decides the instance
//! result, even if none of its members fit the shape. Only when no level declares
//! such a member are extension methods considered, namespace by namespace from the
//! call site outwards. Within a level, betterness picks a unique candidate or the
//! query is [`Resolution::Ambiguous`].
//!
//! Results are cached per `(type, protocol, arity, scope)` for the lifetime of the
//! resolver, which is one lowering pass over one function.

mod betterness;
mod inference;
mod lookup;

use std::rc::Rc;

use chumsky::span::SimpleSpan;
use cinder_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use rustc_hash::FxHashMap;

use crate::catalog::TypeCatalog;
use crate::conversions::Conversion;
use crate::definition::{Accessibility, CallSite, MemberId, MethodId};
use crate::types::{SpecialType, TypeData};
use crate::TypeId;

pub use lookup::LookupLevels;

/// A structural contract the lowering engine resolves members for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Deconstruct,
    GetEnumerator,
    MoveNext,
    Current,
    Dispose,
    GetAsyncEnumerator,
    MoveNextAsync,
    DisposeAsync,
}

impl Protocol {
    pub const fn member_name(self) -> &'static str {
        match self {
            Self::Deconstruct => "Deconstruct",
            Self::GetEnumerator => "GetEnumerator",
            Self::MoveNext => "MoveNext",
            Self::Current => "Current",
            Self::Dispose => "Dispose",
            Self::GetAsyncEnumerator => "GetAsyncEnumerator",
            Self::MoveNextAsync => "MoveNextAsync",
            Self::DisposeAsync => "DisposeAsync",
        }
    }

    pub const fn get_enumerator(is_async: bool) -> Self {
        if is_async {
            Self::GetAsyncEnumerator
        } else {
            Self::GetEnumerator
        }
    }

    pub const fn move_next(is_async: bool) -> Self {
        if is_async {
            Self::MoveNextAsync
        } else {
            Self::MoveNext
        }
    }

    pub const fn dispose(is_async: bool) -> Self {
        if is_async {
            Self::DisposeAsync
        } else {
            Self::Dispose
        }
    }
}

/// A member resolved for a protocol, with generic arguments substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCandidate {
    /// The method to call; the getter for `Current`
    pub method: MethodId,
    /// Declaring type (the static container for extensions)
    pub origin: TypeId,
    /// Parameters the call supplies, receiver excluded
    pub param_types: Vec<TypeId>,
    pub return_type: TypeId,
    pub is_extension: bool,
    /// Inferred method type arguments, in declaration order
    pub type_arguments: Vec<TypeId>,
    /// A trailing `params` array is passed empty
    pub expanded: bool,
    /// Optional parameters filled with their defaults
    pub defaulted: usize,
    pub accessibility: Accessibility,
    /// How the receiver reaches the `this` parameter
    pub receiver_conversion: Conversion,
    /// Type of the `this` parameter after substitution
    pub receiver_type: TypeId,
}

impl ProtocolCandidate {
    pub fn is_generic(&self) -> bool {
        !self.type_arguments.is_empty()
    }

    /// Number of arguments the call site synthesizes for omitted parameters
    pub fn synthesized_arguments(&self) -> usize {
        self.defaulted + usize::from(self.expanded)
    }
}

/// Outcome of a protocol query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Rc<ProtocolCandidate>),
    /// Several candidates tied on betterness
    Ambiguous(Vec<MethodId>),
    NotFound,
}

impl Resolution {
    pub fn found(&self) -> Option<&Rc<ProtocolCandidate>> {
        match self {
            Self::Found(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Lookup switches that vary by compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Consider extension `GetEnumerator` methods after the interface route
    pub extension_get_enumerator: bool,
    /// Let stack-only types use extension `Dispose` methods
    pub pattern_dispose_for_ref_like: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            extension_get_enumerator: true,
            pattern_dispose_for_ref_like: true,
        }
    }
}

/// A recoverable ambiguity; lowering continued on a fallback route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguityWarning {
    pub receiver: TypeId,
    pub protocol: Protocol,
    pub candidates: Vec<MethodId>,
}

impl AmbiguityWarning {
    pub fn to_diagnostic(&self, catalog: &TypeCatalog, span: SimpleSpan<usize>) -> Diagnostic {
        Diagnostic::ambiguous_pattern(
            &catalog.format_type(self.receiver),
            self.protocol.member_name(),
            span,
        )
    }
}

/// Unrecoverable resolution failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    DeconstructNotFound { receiver: TypeId, arity: usize },
    AmbiguousDeconstruct { receiver: TypeId, candidates: Vec<MethodId> },
    NotEnumerable { collection: TypeId, is_async: bool },
    EnumeratorMemberNotFound { enumerator: TypeId, member: Protocol },
    AmbiguousEnumerableInterface { collection: TypeId, interfaces: Vec<TypeId> },
    NotDisposable { resource: TypeId, is_async: bool },
}

impl ResolutionError {
    pub const fn code(&self) -> DiagnosticCode {
        match self {
            Self::DeconstructNotFound { .. } => DiagnosticCode::DeconstructNotFound,
            Self::AmbiguousDeconstruct { .. } => DiagnosticCode::AmbiguousProtocolMember,
            Self::NotEnumerable { .. } => DiagnosticCode::EnumeratorPatternNotFound,
            Self::EnumeratorMemberNotFound { .. } => DiagnosticCode::EnumeratorMemberNotFound,
            Self::AmbiguousEnumerableInterface { .. } => {
                DiagnosticCode::AmbiguousEnumerableInterface
            }
            Self::NotDisposable { .. } => DiagnosticCode::NotDisposable,
        }
    }

    pub fn message(&self, catalog: &TypeCatalog) -> String {
        match self {
            Self::DeconstructNotFound { receiver, arity } => format!(
                "No suitable 'Deconstruct' instance or extension method was found for type '{}' with {arity} out parameters",
                catalog.format_type(*receiver)
            ),
            Self::AmbiguousDeconstruct { receiver, .. } => format!(
                "The call to 'Deconstruct' on type '{}' is ambiguous",
                catalog.format_type(*receiver)
            ),
            Self::NotEnumerable {
                collection,
                is_async,
            } => {
                let member = Protocol::get_enumerator(*is_async).member_name();
                format!(
                    "foreach statement cannot operate on variables of type '{}' because it does not contain a public instance or extension definition for '{member}'",
                    catalog.format_type(*collection)
                )
            }
            Self::EnumeratorMemberNotFound { enumerator, member } => format!(
                "Enumerator type '{}' does not contain a public definition for '{}'",
                catalog.format_type(*enumerator),
                member.member_name()
            ),
            Self::AmbiguousEnumerableInterface { collection, .. } => format!(
                "foreach statement cannot operate on variables of type '{}' because it implements multiple instantiations of 'IEnumerable<T>'",
                catalog.format_type(*collection)
            ),
            Self::NotDisposable { resource, is_async } => {
                let interface = if *is_async {
                    "IAsyncDisposable"
                } else {
                    "IDisposable"
                };
                format!(
                    "'{}': type used in a using statement must implement '{interface}'",
                    catalog.format_type(*resource)
                )
            }
        }
    }

    pub fn to_diagnostic(&self, catalog: &TypeCatalog, span: SimpleSpan<usize>) -> Diagnostic {
        Diagnostic::error(self.code(), self.message(catalog)).with_location(span)
    }
}

/// How `GetEnumerator` was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerableRoute {
    Pattern,
    Interface,
    Extension,
}

/// Members called on the enumerator in the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratorMembers {
    pub move_next: Rc<ProtocolCandidate>,
    pub current: Rc<ProtocolCandidate>,
}

/// Everything the iteration lowering needs about a general collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerableInfo {
    pub route: EnumerableRoute,
    pub get_enumerator: Rc<ProtocolCandidate>,
    pub enumerator_type: TypeId,
    pub element_type: TypeId,
    pub members: EnumeratorMembers,
    pub is_async: bool,
}

/// Which construct needs the disposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeContext {
    Using,
    Enumerator,
}

/// How a resource or enumerator is released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisposeRoute {
    /// Call through the disposal interface
    Interface { method: MethodId },
    /// Call a pattern `Dispose` found on the type itself
    Pattern(Rc<ProtocolCandidate>),
    /// Call an extension `Dispose` (stack-only types)
    Extension(Rc<ProtocolCandidate>),
    /// Test at runtime whether the value implements the interface
    RuntimeCheck { interface: TypeId, method: MethodId },
    /// Nothing to release
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LookupScope {
    Instance,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LookupOutcome {
    pub resolution: Resolution,
    /// Some level declared an accessible member with the protocol's name
    pub declared: bool,
}

type CacheKey = (TypeId, Protocol, usize, LookupScope);

/// Resolves protocol members for one lowering pass
pub struct ProtocolResolver<'a> {
    catalog: &'a TypeCatalog,
    call_site: CallSite,
    options: ResolverOptions,
    cache: FxHashMap<CacheKey, LookupOutcome>,
    warnings: Vec<AmbiguityWarning>,
}

impl<'a> ProtocolResolver<'a> {
    pub fn new(catalog: &'a TypeCatalog, call_site: CallSite, options: ResolverOptions) -> Self {
        Self {
            catalog,
            call_site,
            options,
            cache: FxHashMap::default(),
            warnings: Vec::new(),
        }
    }

    pub const fn catalog(&self) -> &'a TypeCatalog {
        self.catalog
    }

    /// Ambiguities reported since the last call
    pub fn take_warnings(&mut self) -> Vec<AmbiguityWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn_ambiguous(&mut self, receiver: TypeId, protocol: Protocol, candidates: Vec<MethodId>) {
        tracing::debug!(
            "ambiguous {} on {}, falling back",
            protocol.member_name(),
            self.catalog.format_type(receiver)
        );
        self.warnings.push(AmbiguityWarning {
            receiver,
            protocol,
            candidates,
        });
    }

    /// General protocol query: instance members, then extensions when no level
    /// declares a member of that name
    pub fn resolve(&mut self, receiver: TypeId, protocol: Protocol, arity: usize) -> Resolution {
        let instance = self.lookup(receiver, protocol, arity, LookupScope::Instance);
        if instance.declared || !self.allows_extensions(receiver, protocol) {
            return instance.resolution;
        }
        self.lookup(receiver, protocol, arity, LookupScope::Extension)
            .resolution
    }

    fn allows_extensions(&self, receiver: TypeId, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Deconstruct => true,
            Protocol::GetEnumerator | Protocol::GetAsyncEnumerator => {
                self.options.extension_get_enumerator
            }
            Protocol::MoveNext | Protocol::MoveNextAsync | Protocol::Current => false,
            Protocol::Dispose | Protocol::DisposeAsync => {
                self.options.pattern_dispose_for_ref_like && self.catalog.is_ref_like(receiver)
            }
        }
    }

    pub(crate) fn lookup(
        &mut self,
        receiver: TypeId,
        protocol: Protocol,
        arity: usize,
        scope: LookupScope,
    ) -> LookupOutcome {
        let key = (receiver, protocol, arity, scope);
        if let Some(outcome) = self.cache.get(&key) {
            tracing::trace!("cache hit for {} ({:?})", protocol.member_name(), scope);
            return outcome.clone();
        }
        let outcome = match scope {
            LookupScope::Instance => self.lookup_instance(receiver, protocol, arity),
            LookupScope::Extension => self.lookup_extension(receiver, protocol, arity),
        };
        self.cache.insert(key, outcome.clone());
        outcome
    }

    /// `Deconstruct` with `arity` out parameters; ambiguity is an error here
    pub fn resolve_deconstruct(
        &mut self,
        receiver: TypeId,
        arity: usize,
    ) -> Result<Rc<ProtocolCandidate>, ResolutionError> {
        match self.resolve(receiver, Protocol::Deconstruct, arity) {
            Resolution::Found(candidate) => Ok(candidate),
            Resolution::Ambiguous(candidates) => Err(ResolutionError::AmbiguousDeconstruct {
                receiver,
                candidates,
            }),
            Resolution::NotFound => Err(ResolutionError::DeconstructNotFound { receiver, arity }),
        }
    }

    /// Resolves the iteration protocol of a general (non-array, non-string) collection
    pub fn resolve_enumerable(
        &mut self,
        collection: TypeId,
        is_async: bool,
    ) -> Result<EnumerableInfo, ResolutionError> {
        let protocol = Protocol::get_enumerator(is_async);

        let instance = self.lookup(collection, protocol, 0, LookupScope::Instance);
        match instance.resolution {
            Resolution::Found(candidate) => {
                return self.complete_enumerable(EnumerableRoute::Pattern, candidate, is_async);
            }
            Resolution::Ambiguous(candidates) => {
                self.warn_ambiguous(collection, protocol, candidates);
            }
            Resolution::NotFound => {}
        }

        if let Some(candidate) = self.interface_get_enumerator(collection, is_async)? {
            return self.complete_enumerable(EnumerableRoute::Interface, candidate, is_async);
        }

        if self.allows_extensions(collection, protocol) {
            let extension = self.lookup(collection, protocol, 0, LookupScope::Extension);
            match extension.resolution {
                Resolution::Found(candidate) => {
                    return self.complete_enumerable(
                        EnumerableRoute::Extension,
                        candidate,
                        is_async,
                    );
                }
                Resolution::Ambiguous(candidates) => {
                    self.warn_ambiguous(collection, protocol, candidates);
                }
                Resolution::NotFound => {}
            }
        }

        Err(ResolutionError::NotEnumerable {
            collection,
            is_async,
        })
    }

    /// `GetEnumerator` reached through `IEnumerable<T>` (or the non-generic interface)
    fn interface_get_enumerator(
        &self,
        collection: TypeId,
        is_async: bool,
    ) -> Result<Option<Rc<ProtocolCandidate>>, ResolutionError> {
        let catalog = self.catalog;
        let mut implemented = catalog.all_interfaces(collection);
        implemented.insert(0, collection);

        let generic: Vec<TypeId> = implemented
            .iter()
            .copied()
            .filter(|ty| match catalog.special(*ty) {
                Some(SpecialType::GenericEnumerable(_)) => !is_async,
                Some(SpecialType::AsyncEnumerable(_)) => is_async,
                _ => false,
            })
            .collect();

        let interface = match generic.as_slice() {
            [single] => *single,
            [] if !is_async && implemented.contains(&catalog.well_known().enumerable) => {
                catalog.well_known().enumerable
            }
            [] => return Ok(None),
            _ => {
                return Err(ResolutionError::AmbiguousEnumerableInterface {
                    collection,
                    interfaces: generic.clone(),
                })
            }
        };

        let name = Protocol::get_enumerator(is_async).member_name();
        let method = catalog
            .members_named(interface, name)
            .iter()
            .find_map(|member| match member {
                MemberId::Method(method) => Some(*method),
                _ => None,
            });
        let Some(method) = method else {
            return Ok(None);
        };

        tracing::debug!(
            "{} enumerates through {}",
            catalog.format_type(collection),
            catalog.format_type(interface)
        );
        let def = catalog.method(method);
        Ok(Some(Rc::new(ProtocolCandidate {
            method,
            origin: interface,
            param_types: Vec::new(),
            return_type: def.return_type,
            is_extension: false,
            type_arguments: Vec::new(),
            expanded: false,
            defaulted: 0,
            accessibility: def.accessibility,
            receiver_conversion: if catalog.is_value_type(collection) {
                Conversion::Boxing
            } else {
                Conversion::ImplicitReference
            },
            receiver_type: interface,
        })))
    }

    fn complete_enumerable(
        &mut self,
        route: EnumerableRoute,
        get_enumerator: Rc<ProtocolCandidate>,
        is_async: bool,
    ) -> Result<EnumerableInfo, ResolutionError> {
        let enumerator_type = get_enumerator.return_type;
        let members = self.resolve_enumerator_members(enumerator_type, is_async)?;
        Ok(EnumerableInfo {
            route,
            get_enumerator,
            enumerator_type,
            element_type: members.current.return_type,
            members,
            is_async,
        })
    }

    /// `MoveNext`/`Current` (or `MoveNextAsync`/`Current`) on an enumerator type
    pub fn resolve_enumerator_members(
        &mut self,
        enumerator: TypeId,
        is_async: bool,
    ) -> Result<EnumeratorMembers, ResolutionError> {
        let current = self
            .resolve(enumerator, Protocol::Current, 0)
            .found()
            .cloned()
            .ok_or(ResolutionError::EnumeratorMemberNotFound {
                enumerator,
                member: Protocol::Current,
            })?;
        let move_next_protocol = Protocol::move_next(is_async);
        let move_next = self
            .resolve(enumerator, move_next_protocol, 0)
            .found()
            .cloned()
            .ok_or(ResolutionError::EnumeratorMemberNotFound {
                enumerator,
                member: move_next_protocol,
            })?;
        Ok(EnumeratorMembers { move_next, current })
    }

    fn disposal_interface(&self, is_async: bool) -> (TypeId, Option<MethodId>) {
        let well_known = self.catalog.well_known();
        let interface = if is_async {
            well_known.async_disposable
        } else {
            well_known.disposable
        };
        let method = self
            .catalog
            .members_named(interface, Protocol::dispose(is_async).member_name())
            .iter()
            .find_map(|member| match member {
                MemberId::Method(method) => Some(*method),
                _ => None,
            });
        (interface, method)
    }

    /// Chooses how a value of type `resource` is released
    ///
    /// Types implementing the disposal interface always use it. Value types (stack-only
    /// ones included) may fall back to a pattern `Dispose`; sealed enumerator classes
    /// may too. Unsealed reference enumerators without the interface are tested at
    /// runtime. A `using` resource with no route is an error.
    pub fn resolve_dispose(
        &mut self,
        resource: TypeId,
        is_async: bool,
        context: DisposeContext,
    ) -> Result<DisposeRoute, ResolutionError> {
        let catalog = self.catalog;
        let (interface, interface_method) = self.disposal_interface(is_async);
        let not_disposable = ResolutionError::NotDisposable { resource, is_async };

        if catalog.ty(resource) == &TypeData::Error {
            return Ok(DisposeRoute::None);
        }

        if catalog.implements(resource, interface) {
            if let Some(method) = interface_method {
                return Ok(DisposeRoute::Interface { method });
            }
        }

        let value_like = catalog.is_value_type(resource);
        let pattern_allowed = value_like
            || (context == DisposeContext::Enumerator
                && catalog.is_sealed(resource)
                && catalog.is_reference_type(resource));
        if pattern_allowed {
            let protocol = Protocol::dispose(is_async);
            let instance = self.lookup(resource, protocol, 0, LookupScope::Instance);
            let resolution = if !instance.declared && self.allows_extensions(resource, protocol)
            {
                self.lookup(resource, protocol, 0, LookupScope::Extension)
                    .resolution
            } else {
                instance.resolution
            };
            match resolution {
                Resolution::Found(candidate) if candidate.is_extension => {
                    return Ok(DisposeRoute::Extension(candidate));
                }
                Resolution::Found(candidate) => return Ok(DisposeRoute::Pattern(candidate)),
                Resolution::Ambiguous(candidates) => {
                    self.warn_ambiguous(resource, protocol, candidates);
                }
                Resolution::NotFound => {}
            }
        }

        match context {
            DisposeContext::Using => Err(not_disposable),
            DisposeContext::Enumerator => {
                let runtime_check = !catalog.is_sealed(resource) && !value_like;
                match interface_method {
                    Some(method) if runtime_check => {
                        Ok(DisposeRoute::RuntimeCheck { interface, method })
                    }
                    _ => Ok(DisposeRoute::None),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
