//! The data-element resolver: a fixed-point loader that turns a flat bag of
//! inter-referencing records into the typed object graph.
//!
//! Two fixed points run in sequence. The *include* loop iterates the element
//! list, calling each element's registered include function until every
//! element is complete or no progress is made. The *assemble* loop then
//! fills back-references on the top-level objects with the same discipline.
//! Any stall aborts with a report; no partial state leaks.

use crate::element::{DataElement, ElementValue};
use crate::error::{CoreError, CoreResult};
use crate::id::{ElementKey, Id, TypeKey};
use crate::include;
use crate::objects::{AssembleCtx, AssembleOutcome};
use crate::store::ModelStore;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Result of one include attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeOutcome {
    Included,
    /// Referenced objects that must be included first.
    Deferred(Vec<Id>),
}

impl IncludeOutcome {
    pub fn missing(id: Id) -> Self {
        IncludeOutcome::Deferred(vec![id])
    }
}

/// An include function builds one element into the store, or defers.
pub type IncludeFn = fn(&mut ModelStore, &ElementKey, &ElementValue) -> CoreResult<IncludeOutcome>;

/// Per-resolver registry of include functions, keyed by `(concept, type)`.
///
/// The standard set covers the built-in vocabulary; test harnesses can
/// register fixtures without touching process-wide state.
pub struct IncludeRegistry {
    map: HashMap<TypeKey, IncludeFn>,
}

impl IncludeRegistry {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// The registry with every built-in element type.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        include::register_standard(&mut registry);
        registry
    }

    pub fn register(&mut self, key: TypeKey, f: IncludeFn) {
        self.map.insert(key, f);
    }

    pub fn get(&self, key: &TypeKey) -> Option<IncludeFn> {
        self.map.get(key).copied()
    }
}

impl Default for IncludeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolver configuration.
pub struct ResolverConfig {
    pub registry: IncludeRegistry,
    /// Cap on report lines in stall errors.
    pub max_report_lines: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            registry: IncludeRegistry::standard(),
            max_report_lines: 10_000,
        }
    }
}

fn truncate_report(lines: Vec<String>, cap: usize) -> String {
    let total = lines.len();
    let mut out: Vec<String> = lines.into_iter().take(cap).collect();
    if total > cap {
        out.push(format!("... {} more lines truncated", total - cap));
    }
    out.join("\n")
}

/// Resolve a flat element list into an assembled [`ModelStore`].
pub fn resolve_elements(
    config: &ResolverConfig,
    elements: &[DataElement],
) -> CoreResult<ModelStore> {
    // Duplicate detection over the full key
    let mut seen: HashSet<ElementKey> = HashSet::with_capacity(elements.len());
    for element in elements {
        if !seen.insert(element.key()) {
            return Err(CoreError::DuplicateElement(element.key()));
        }
    }
    // Every element must have a registered include function
    for element in elements {
        if config.registry.get(&element.type_key()).is_none() {
            return Err(CoreError::UnknownType(element.type_key()));
        }
    }
    let known_ids: HashSet<Id> = elements.iter().map(DataElement::id).collect();

    let mut store = ModelStore::new();
    let mut done = vec![false; elements.len()];
    let mut missing: Vec<Vec<Id>> = vec![Vec::new(); elements.len()];

    loop {
        let mut progress = false;
        let mut remaining = 0;
        for (ix, element) in elements.iter().enumerate() {
            if done[ix] {
                continue;
            }
            let f = config.registry.get(&element.type_key()).expect("checked");
            match f(&mut store, &element.key(), &element.value)? {
                IncludeOutcome::Included => {
                    done[ix] = true;
                    progress = true;
                }
                IncludeOutcome::Deferred(ids) => {
                    missing[ix] = ids;
                    remaining += 1;
                }
            }
        }
        if remaining == 0 {
            break;
        }
        if !progress {
            // A reference no element can ever satisfy is a dangling
            // reference; mutual waits are reported in bulk.
            for (ix, element) in elements.iter().enumerate() {
                if done[ix] {
                    continue;
                }
                if let Some(dangling) = missing[ix].iter().find(|id| !known_ids.contains(id)) {
                    return Err(CoreError::DanglingReference {
                        key: element.key(),
                        missing: dangling.clone(),
                    });
                }
            }
            let lines: Vec<String> = elements
                .iter()
                .enumerate()
                .filter(|(ix, _)| !done[*ix])
                .map(|(ix, e)| {
                    let refs: Vec<String> =
                        missing[ix].iter().map(|id| id.to_string()).collect();
                    format!("{} waiting for [{}]", e.key(), refs.join(", "))
                })
                .collect();
            return Err(CoreError::UnresolvedReferences {
                report: truncate_report(lines, config.max_report_lines),
            });
        }
    }
    tracing::debug!(
        elements = elements.len(),
        objects = store.objects.len(),
        "elements included"
    );

    assemble_objects(&mut store, config.max_report_lines)?;
    Ok(store)
}

/// Fixed-point assemble over the top-level objects.
fn assemble_objects(store: &mut ModelStore, max_report_lines: usize) -> CoreResult<()> {
    let mut pending: Vec<Id> = store.objects.keys().cloned().collect();
    let mut missing: BTreeMap<Id, Vec<Id>> = BTreeMap::new();

    while !pending.is_empty() {
        let mut progress = false;
        let mut still_pending = Vec::with_capacity(pending.len());
        for id in pending {
            let mut object = store.objects.remove(&id).expect("pending object exists");
            let outcome = {
                let ctx = AssembleCtx {
                    objects: &store.objects,
                    lowlevel: &store.lowlevel,
                };
                object.assemble(&ctx)
            };
            store.objects.insert(id.clone(), object);
            match outcome? {
                AssembleOutcome::Done => {
                    progress = true;
                    missing.remove(&id);
                }
                AssembleOutcome::Missing(ids) => {
                    missing.insert(id.clone(), ids);
                    still_pending.push(id);
                }
            }
        }
        pending = still_pending;
        if !pending.is_empty() && !progress {
            let lines: Vec<String> = pending
                .iter()
                .map(|id| {
                    let refs: Vec<String> = missing
                        .get(id)
                        .map(|ids| ids.iter().map(|m| m.to_string()).collect())
                        .unwrap_or_default();
                    format!("{id} waiting for [{}]", refs.join(", "))
                })
                .collect();
            return Err(CoreError::AssembleStalled {
                report: truncate_report(lines, max_report_lines),
            });
        }
    }
    tracing::debug!(objects = store.objects.len(), "objects assembled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::FieldValue;
    use crate::id::concepts;

    #[test]
    fn test_duplicate_element_detected() {
        let element = DataElement::with_fields(
            concepts::FLOW,
            "BaseFlow",
            "Gas",
            Vec::<(String, FieldValue)>::new(),
        );
        let err = resolve_elements(
            &ResolverConfig::default(),
            &[element.clone(), element],
        );
        assert!(matches!(err, Err(CoreError::DuplicateElement(_))));
    }

    #[test]
    fn test_unknown_type_detected() {
        let element = DataElement::with_fields(
            "Gadget",
            "BaseGadget",
            "G1",
            Vec::<(String, FieldValue)>::new(),
        );
        let err = resolve_elements(&ResolverConfig::default(), &[element]);
        assert!(matches!(err, Err(CoreError::UnknownType(_))));
    }

    #[test]
    fn test_report_truncation() {
        let lines: Vec<String> = (0..5).map(|i| format!("line {i}")).collect();
        let report = truncate_report(lines, 3);
        assert!(report.contains("line 2"));
        assert!(!report.contains("line 3"));
        assert!(report.contains("2 more lines truncated"));
    }
}
