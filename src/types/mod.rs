//! Core value types shared across the index: symbols, occurrences, role
//! sets, and translation-unit descriptors.
//!
//! Symbols and occurrences are immutable value-like handles shared via
//! `Arc`. Identity for deduplication purposes is always USR equality, never
//! pointer equality.

use std::sync::Arc;
use std::time::SystemTime;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::paths::CanonicalFilePath;

/// Shared handle to an immutable [`Symbol`].
pub type SymbolRef = Arc<Symbol>;

/// Shared handle to an immutable [`SymbolOccurrence`].
pub type SymbolOccurrenceRef = Arc<SymbolOccurrence>;

/// The kind of entity a symbol names.
///
/// Closed enumeration; query operations treat most variants as opaque
/// values. The call resolver cares specifically about `InstanceMethod`,
/// `Protocol`, and `Extension`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Unknown,
    Module,
    Namespace,
    Macro,
    Enum,
    EnumConstant,
    Struct,
    Class,
    Protocol,
    Extension,
    Union,
    TypeAlias,
    Function,
    Variable,
    Field,
    Parameter,
    InstanceMethod,
    ClassMethod,
    StaticMethod,
    InstanceProperty,
    ClassProperty,
    Constructor,
    Destructor,
}

impl SymbolKind {
    /// Whether occurrences of this kind can appear as call targets.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            SymbolKind::Function
                | SymbolKind::InstanceMethod
                | SymbolKind::ClassMethod
                | SymbolKind::StaticMethod
                | SymbolKind::Constructor
                | SymbolKind::Destructor
        )
    }
}

bitflags! {
    /// Roles a symbol plays at one occurrence, including relation roles
    /// that tie the occurrence to other symbols at the same site.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SymbolRoleSet: u32 {
        const DECLARATION      = 1 << 0;
        const DEFINITION       = 1 << 1;
        const REFERENCE        = 1 << 2;
        const READ             = 1 << 3;
        const WRITE            = 1 << 4;
        const CALL             = 1 << 5;
        const DYNAMIC          = 1 << 6;
        const IMPLICIT         = 1 << 7;
        const REL_CHILD_OF     = 1 << 16;
        const REL_BASE_OF      = 1 << 17;
        const REL_OVERRIDE_OF  = 1 << 18;
        const REL_EXTENDED_BY  = 1 << 19;
        const REL_RECEIVED_BY  = 1 << 20;
        const REL_CALLED_BY    = 1 << 21;
        const REL_CONTAINED_BY = 1 << 22;
    }
}

bitflags! {
    /// Intrinsic symbol properties carried alongside the kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SymbolPropertySet: u32 {
        const GENERIC   = 1 << 0;
        const LOCAL     = 1 << 1;
        const UNIT_TEST = 1 << 2;
    }
}

/// An immutable code symbol handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Unified Symbol Reference: globally unique across translation units.
    pub usr: Arc<str>,
    /// Display name.
    pub name: Arc<str>,
    pub kind: SymbolKind,
    pub properties: SymbolPropertySet,
}

impl Symbol {
    pub fn new(usr: impl Into<Arc<str>>, name: impl Into<Arc<str>>, kind: SymbolKind) -> Self {
        Self {
            usr: usr.into(),
            name: name.into(),
            kind,
            properties: SymbolPropertySet::empty(),
        }
    }

    pub fn with_properties(mut self, properties: SymbolPropertySet) -> Self {
        self.properties = properties;
        self
    }

    pub fn is_callable(&self) -> bool {
        self.kind.is_callable()
    }
}

/// Source position of an occurrence within a canonical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLocation {
    pub path: CanonicalFilePath,
    pub line: u32,
    pub column: u32,
}

/// A relation from an occurrence to another symbol at the same site,
/// e.g. the receiver class of a call or the method being overridden.
#[derive(Debug, Clone)]
pub struct SymbolRelation {
    pub roles: SymbolRoleSet,
    pub symbol: SymbolRef,
}

/// One appearance of a symbol at a source location within a unit.
///
/// The role set of an occurrence always includes the roles of its
/// relations, so `roles().intersects(REL_RECEIVED_BY)` and "has a
/// `REL_RECEIVED_BY` relation" are the same test.
#[derive(Debug, Clone)]
pub struct SymbolOccurrence {
    symbol: SymbolRef,
    roles: SymbolRoleSet,
    location: SymbolLocation,
    unit_name: Arc<str>,
    relations: Vec<SymbolRelation>,
}

impl SymbolOccurrence {
    pub fn new(
        symbol: SymbolRef,
        roles: SymbolRoleSet,
        location: SymbolLocation,
        unit_name: impl Into<Arc<str>>,
        relations: Vec<SymbolRelation>,
    ) -> Self {
        let mut roles = roles;
        for relation in &relations {
            roles |= relation.roles;
        }
        Self {
            symbol,
            roles,
            location,
            unit_name: unit_name.into(),
            relations,
        }
    }

    pub fn symbol(&self) -> &SymbolRef {
        &self.symbol
    }

    pub fn roles(&self) -> SymbolRoleSet {
        self.roles
    }

    pub fn location(&self) -> &SymbolLocation {
        &self.location
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn relations(&self) -> &[SymbolRelation] {
        &self.relations
    }

    /// Enumerate related symbols whose relation roles intersect `roles`.
    pub fn foreach_related_symbol(&self, roles: SymbolRoleSet, mut f: impl FnMut(&SymbolRef)) {
        for relation in &self.relations {
            if relation.roles.intersects(roles) {
                f(&relation.symbol);
            }
        }
    }
}

/// Descriptor of one translation-unit artifact in the store.
#[derive(Debug, Clone)]
pub struct StoreUnitInfo {
    pub unit_name: String,
    pub main_file: CanonicalFilePath,
    pub out_file_path: std::path::PathBuf,
    pub mod_time: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CanonicalPathCache;

    fn loc(cache: &CanonicalPathCache) -> SymbolLocation {
        SymbolLocation {
            path: cache.canonicalize(std::path::Path::new("/tmp/a.code")),
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn test_callable_kinds() {
        assert!(SymbolKind::Function.is_callable());
        assert!(SymbolKind::InstanceMethod.is_callable());
        assert!(SymbolKind::Constructor.is_callable());
        assert!(!SymbolKind::Class.is_callable());
        assert!(!SymbolKind::Protocol.is_callable());
        assert!(!SymbolKind::Field.is_callable());
    }

    #[test]
    fn test_occurrence_folds_relation_roles() {
        let cache = CanonicalPathCache::new();
        let receiver = Arc::new(Symbol::new("c:D", "D", SymbolKind::Class));
        let occ = SymbolOccurrence::new(
            Arc::new(Symbol::new("c:m", "m", SymbolKind::InstanceMethod)),
            SymbolRoleSet::CALL,
            loc(&cache),
            "unit1",
            vec![SymbolRelation {
                roles: SymbolRoleSet::REL_RECEIVED_BY,
                symbol: receiver,
            }],
        );

        assert!(occ.roles().contains(SymbolRoleSet::CALL));
        assert!(occ.roles().contains(SymbolRoleSet::REL_RECEIVED_BY));
    }

    #[test]
    fn test_foreach_related_symbol_filters_by_role() {
        let cache = CanonicalPathCache::new();
        let base = Arc::new(Symbol::new("c:B", "B", SymbolKind::Class));
        let child = Arc::new(Symbol::new("c:C", "C", SymbolKind::Class));
        let occ = SymbolOccurrence::new(
            Arc::new(Symbol::new("c:m", "m", SymbolKind::InstanceMethod)),
            SymbolRoleSet::DEFINITION,
            loc(&cache),
            "unit1",
            vec![
                SymbolRelation {
                    roles: SymbolRoleSet::REL_OVERRIDE_OF,
                    symbol: base,
                },
                SymbolRelation {
                    roles: SymbolRoleSet::REL_CHILD_OF,
                    symbol: child,
                },
            ],
        );

        let mut seen = Vec::new();
        occ.foreach_related_symbol(SymbolRoleSet::REL_OVERRIDE_OF, |s| {
            seen.push(s.usr.to_string())
        });
        assert_eq!(seen, vec!["c:B"]);
    }
}
