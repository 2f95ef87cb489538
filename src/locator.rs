//! Component content locator.
//!
//! `locate` builds a component's tree of lazy type roots from whatever the
//! discovery layer lists. No unit is read or decoded here; `scan` is the
//! only operation that forces every unit, and it isolates failures per unit.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::classfile::DecodeOptions;
use crate::discovery::ComponentDiscovery;
use crate::element::Component;
use crate::error::{Result, UnitFault};
use crate::model::Type;
use crate::type_root::TypeRoot;

/// Result of forcing every unit of a component.
#[derive(Debug, Clone)]
pub struct ComponentScan {
    pub component: Arc<Component>,
    /// Successfully decoded types, ordered by qualified name.
    pub types: Vec<Arc<Type>>,
    /// Listing and decode faults, ordered by qualified name.
    pub faults: Vec<UnitFault>,
}

impl ComponentScan {
    pub fn is_complete(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Session-scoped locator. Components are cached by id until `forget`.
pub struct ComponentLocator<D> {
    discovery: D,
    options: DecodeOptions,
    located: RwLock<HashMap<String, Arc<Component>>>,
}

impl<D: ComponentDiscovery> ComponentLocator<D> {
    pub fn new(discovery: D) -> Self {
        Self::with_options(discovery, DecodeOptions::default())
    }

    pub fn with_options(discovery: D, options: DecodeOptions) -> Self {
        Self {
            discovery,
            options,
            located: RwLock::new(HashMap::new()),
        }
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// Returns the component for `id`, building its tree on first use.
    /// Fails with `ComponentNotFound` when `id` has no content source.
    pub fn locate(&self, id: &str) -> Result<Arc<Component>> {
        if let Some(component) = self.cached(id) {
            return Ok(component);
        }

        let discovery = self.discovery.discover(id)?;
        let component = Component::new(id, discovery.version);
        for unit in discovery.units {
            let root = TypeRoot::with_options(unit.qualified_name, unit.source, self.options);
            component.insert(Arc::new(root));
        }
        for fault in discovery.faults {
            component.record_fault(fault);
        }
        info!(
            component = id,
            version = component.version().unwrap_or("-"),
            types = component.len(),
            faults = component.faults().len(),
            "component located"
        );

        // Another thread may have located the same id meanwhile; keep theirs.
        let mut located = self
            .located
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            located.entry(id.to_string()).or_insert(component),
        ))
    }

    fn cached(&self, id: &str) -> Option<Arc<Component>> {
        self.located
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Drops the cached component; the next `locate` lists it again.
    pub fn forget(&self, id: &str) -> Option<Arc<Component>> {
        let removed = self
            .located
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            debug!(component = id, "component forgotten");
        }
        removed
    }

    /// Looks up one type, decoding only that unit. `Ok(None)` when the
    /// component exists but has no such type.
    pub fn find_type(&self, id: &str, qualified_name: &str) -> Result<Option<Arc<Type>>> {
        self.locate(id)?.resolve_type(qualified_name)
    }

    /// Decodes every unit in parallel. A failing unit is excluded from
    /// `types` and reported in `faults`; the scan itself only fails when the
    /// component cannot be located.
    pub fn scan(&self, id: &str) -> Result<ComponentScan> {
        let component = self.locate(id)?;
        let roots = component.type_roots();

        let outcomes: Vec<(Arc<TypeRoot>, Result<Arc<Type>>)> = roots
            .into_par_iter()
            .map(|root| {
                let outcome = root.structure();
                (root, outcome)
            })
            .collect();

        let mut types = Vec::with_capacity(outcomes.len());
        for (root, outcome) in outcomes {
            match outcome {
                Ok(ty) => {
                    component.clear_fault(root.qualified_name());
                    types.push(ty);
                }
                Err(err) => {
                    component.record_fault(UnitFault::new(
                        root.qualified_name(),
                        root.location(),
                        &err,
                    ));
                }
            }
        }
        types.sort_by(|a, b| a.name.cmp(&b.name));

        let mut faults = component.faults();
        faults.sort_by(|a, b| {
            (&a.qualified_name, &a.location).cmp(&(&b.qualified_name, &b.location))
        });
        if !faults.is_empty() {
            warn!(
                component = id,
                decoded = types.len(),
                faults = faults.len(),
                "component scan incomplete"
            );
        }

        Ok(ComponentScan {
            component,
            types,
            faults,
        })
    }
}
