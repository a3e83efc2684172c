//! Call-occurrence resolution: given an occurrence of a callable symbol,
//! enumerate every occurrence that may call it.
//!
//! Direct call sites are always included. When the callee occurrence is
//! marked dynamic, the resolver also fans out across the receiver's class
//! hierarchy: extensions are rewritten to the types they extend, protocol
//! receivers route through the conforming-method closure, and class
//! receivers admit dynamic call sites whose receiver lies in the base
//! hierarchy (or is untyped, which is treated as a potential hit).

use crate::index::SymbolIndex;
use crate::types::{SymbolKind, SymbolOccurrenceRef, SymbolRef, SymbolRoleSet};

pub(crate) struct CallResolver<'a> {
    symbols: &'a SymbolIndex,
}

impl<'a> CallResolver<'a> {
    pub fn new(symbols: &'a SymbolIndex) -> Self {
        Self { symbols }
    }

    /// Enumerate occurrences that may call `callee`. Returns `false` when
    /// the receiver stopped the enumeration early, or when `callee` is not
    /// callable at all.
    pub fn foreach_call_occurrence(
        &self,
        callee: &SymbolOccurrenceRef,
        receiver: &mut dyn FnMut(&SymbolOccurrenceRef) -> bool,
    ) -> bool {
        let symbol = callee.symbol();
        if !symbol.is_callable() {
            return false;
        }

        // Direct call references.
        if !self
            .symbols
            .foreach_symbol_occurrence_by_usr(&symbol.usr, SymbolRoleSet::CALL, &mut *receiver)
        {
            return false;
        }

        if !callee.roles().intersects(SymbolRoleSet::DYNAMIC) {
            // No dynamic callers to search for.
            return true;
        }

        // Collect the receiver classes. If any of these (or a class in
        // their base hierarchy) receives a dynamic dispatch call of the
        // method, that call site is a potential caller.
        let relation_to_use = if callee.roles().intersects(SymbolRoleSet::CALL) {
            SymbolRoleSet::REL_RECEIVED_BY
        } else {
            SymbolRoleSet::REL_CHILD_OF
        };
        let mut receiver_classes: Vec<SymbolRef> = Vec::new();
        callee.foreach_related_symbol(relation_to_use, |related| {
            receiver_classes.push(related.clone());
        });

        // Replace extensions with the types they extend.
        for class_symbol in &mut receiver_classes {
            if class_symbol.kind == SymbolKind::Extension {
                let extension_usr = class_symbol.usr.clone();
                self.symbols.foreach_related_symbol_occurrence_by_usr(
                    &extension_usr,
                    SymbolRoleSet::REL_EXTENDED_BY,
                    |occurrence| {
                        *class_symbol = occurrence.symbol().clone();
                        false
                    },
                );
            }
        }

        if receiver_classes.is_empty() {
            return true;
        }

        if receiver_classes[0].kind == SymbolKind::Protocol {
            // Find direct call references of all the conforming methods.
            let mut override_occurrences = Vec::new();
            self.collect_related_occurrences(
                symbol,
                SymbolRoleSet::REL_OVERRIDE_OF,
                &mut override_occurrences,
            );
            for occurrence in &override_occurrences {
                if !self.symbols.foreach_symbol_occurrence_by_usr(
                    &occurrence.symbol().usr,
                    SymbolRoleSet::CALL,
                    &mut *receiver,
                ) {
                    return false;
                }
            }
            return true;
        }

        let mut class_symbols: Vec<SymbolRef> = Vec::new();
        for class_symbol in &receiver_classes {
            self.collect_base_methods_or_classes(class_symbol, &mut class_symbols);
            class_symbols.push(class_symbol.clone());
        }

        // All override methods walking the base hierarchy.
        let base_method_symbols = self.base_methods_or_classes(symbol);

        for method_symbol in &base_method_symbols {
            let completed = self.symbols.foreach_symbol_occurrence_by_usr(
                &method_symbol.usr,
                SymbolRoleSet::CALL,
                |occurrence| {
                    if !occurrence.roles().intersects(SymbolRoleSet::DYNAMIC) {
                        return true;
                    }

                    let mut possibly_called_via_dispatch = false;
                    if !occurrence.roles().intersects(SymbolRoleSet::REL_RECEIVED_BY) {
                        // Untyped receiver: the class owning the method
                        // stays a candidate.
                        possibly_called_via_dispatch = true;
                    } else {
                        occurrence.foreach_related_symbol(
                            SymbolRoleSet::REL_RECEIVED_BY,
                            |related| {
                                if contains_symbol_with_usr(&class_symbols, &related.usr) {
                                    possibly_called_via_dispatch = true;
                                }
                            },
                        );
                    }

                    if possibly_called_via_dispatch {
                        receiver(occurrence)
                    } else {
                        true
                    }
                },
            );
            if !completed {
                return false;
            }
        }

        true
    }

    /// Symbols related to `symbol` by override (for instance methods) or
    /// base-class subtyping (for everything else), walked transitively,
    /// deduplicated by USR, without `symbol` itself.
    pub fn base_methods_or_classes(&self, symbol: &SymbolRef) -> Vec<SymbolRef> {
        let mut collected = Vec::new();
        self.collect_base_methods_or_classes(symbol, &mut collected);
        collected
    }

    fn collect_base_methods_or_classes(&self, symbol: &SymbolRef, collected: &mut Vec<SymbolRef>) {
        let mut candidates: Vec<SymbolRef> = Vec::new();
        if symbol.kind == SymbolKind::InstanceMethod {
            self.symbols.foreach_symbol_occurrence_by_usr(
                &symbol.usr,
                SymbolRoleSet::REL_OVERRIDE_OF,
                |occurrence| {
                    occurrence
                        .foreach_related_symbol(SymbolRoleSet::REL_OVERRIDE_OF, |related| {
                            candidates.push(related.clone());
                        });
                    true
                },
            );
        } else {
            self.symbols.foreach_related_symbol_occurrence_by_usr(
                &symbol.usr,
                SymbolRoleSet::REL_BASE_OF,
                |occurrence| {
                    candidates.push(occurrence.symbol().clone());
                    true
                },
            );
        }

        for candidate in candidates {
            if !contains_symbol_with_usr(collected, &candidate.usr) {
                collected.push(candidate.clone());
                self.collect_base_methods_or_classes(&candidate, collected);
            }
        }
    }

    /// Transitive expansion like `collect_base_methods_or_classes`, but
    /// accumulating the related occurrences themselves (deduplicated by
    /// the USR of their symbol).
    fn collect_related_occurrences(
        &self,
        symbol: &SymbolRef,
        roles: SymbolRoleSet,
        collected: &mut Vec<SymbolOccurrenceRef>,
    ) {
        let mut found: Vec<SymbolOccurrenceRef> = Vec::new();
        self.symbols
            .foreach_related_symbol_occurrence_by_usr(&symbol.usr, roles, |occurrence| {
                found.push(occurrence.clone());
                true
            });

        for occurrence in found {
            let usr = &occurrence.symbol().usr;
            if !collected
                .iter()
                .any(|known| known.symbol().usr == *usr)
            {
                collected.push(occurrence.clone());
                let next = occurrence.symbol().clone();
                self.collect_related_occurrences(&next, roles, collected);
            }
        }
    }
}

fn contains_symbol_with_usr(symbols: &[SymbolRef], usr: &str) -> bool {
    symbols.iter().any(|symbol| symbol.usr.as_ref() == usr)
}
