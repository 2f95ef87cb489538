//! Component → package → type root hierarchy.
//!
//! Children are owned through `Arc`; parents are reached through `Weak`
//! links set when a node is inserted. A node created before it is wired into
//! the tree simply has no parent yet.
//!
//! Insertion is get-or-insert under a write lock, so two threads adding the
//! same qualified name end up sharing one live handle.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tracing::debug;

use crate::error::{Result, UnitFault};
use crate::model::{Type, split_qualified_name};
use crate::type_root::TypeRoot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Component,
    Package,
    TypeRoot,
}

/// A handle on any node in the tree.
#[derive(Debug, Clone)]
pub enum Element {
    Component(Arc<Component>),
    Package(Arc<Package>),
    TypeRoot(Arc<TypeRoot>),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Component(_) => ElementKind::Component,
            Element::Package(_) => ElementKind::Package,
            Element::TypeRoot(_) => ElementKind::TypeRoot,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Element::Component(c) => c.id(),
            Element::Package(p) => p.qualified_name(),
            Element::TypeRoot(t) => t.qualified_name(),
        }
    }

    /// `None` only at a component, or at a node not yet wired into a tree.
    pub fn parent(&self) -> Option<Element> {
        match self {
            Element::Component(_) => None,
            Element::Package(p) => p.parent_element(),
            Element::TypeRoot(t) => t.parent().map(Element::Package),
        }
    }

    /// Nearest node of `kind`, starting with this one.
    pub fn ancestor(&self, kind: ElementKind) -> Option<Element> {
        let mut current = Some(self.clone());
        while let Some(element) = current {
            if element.kind() == kind {
                return Some(element);
            }
            current = element.parent();
        }
        None
    }

    pub fn children(&self) -> Vec<Element> {
        match self {
            Element::Component(c) => c.packages().into_iter().map(Element::Package).collect(),
            Element::Package(p) => p
                .subpackages()
                .into_iter()
                .map(Element::Package)
                .chain(p.type_roots().into_iter().map(Element::TypeRoot))
                .collect(),
            Element::TypeRoot(_) => Vec::new(),
        }
    }
}

#[derive(Debug)]
enum ParentLink {
    Component(Weak<Component>),
    Package(Weak<Package>),
}

#[derive(Debug)]
pub struct Package {
    segment: String,
    qualified_name: String,
    parent: ParentLink,
    subpackages: RwLock<BTreeMap<String, Arc<Package>>>,
    type_roots: RwLock<BTreeMap<String, Arc<TypeRoot>>>,
}

impl Package {
    fn new(segment: &str, qualified_name: String, parent: ParentLink) -> Self {
        Self {
            segment: segment.to_string(),
            qualified_name,
            parent,
            subpackages: RwLock::new(BTreeMap::new()),
            type_roots: RwLock::new(BTreeMap::new()),
        }
    }

    /// Last name segment; empty for the default package.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    fn parent_element(&self) -> Option<Element> {
        match &self.parent {
            ParentLink::Component(c) => c.upgrade().map(Element::Component),
            ParentLink::Package(p) => p.upgrade().map(Element::Package),
        }
    }

    pub fn component(self: &Arc<Self>) -> Option<Arc<Component>> {
        match Element::Package(Arc::clone(self)).ancestor(ElementKind::Component)? {
            Element::Component(c) => Some(c),
            _ => None,
        }
    }

    pub fn subpackages(&self) -> Vec<Arc<Package>> {
        read(&self.subpackages).values().cloned().collect()
    }

    pub fn subpackage(&self, segment: &str) -> Option<Arc<Package>> {
        read(&self.subpackages).get(segment).cloned()
    }

    fn subpackage_or_insert(self: &Arc<Self>, segment: &str) -> Arc<Package> {
        if let Some(existing) = self.subpackage(segment) {
            return existing;
        }
        let mut subpackages = write(&self.subpackages);
        Arc::clone(subpackages.entry(segment.to_string()).or_insert_with(|| {
            Arc::new(Package::new(
                segment,
                join_package(&self.qualified_name, segment),
                ParentLink::Package(Arc::downgrade(self)),
            ))
        }))
    }

    pub fn type_roots(&self) -> Vec<Arc<TypeRoot>> {
        read(&self.type_roots).values().cloned().collect()
    }

    pub fn type_root(&self, qualified_name: &str) -> Option<Arc<TypeRoot>> {
        read(&self.type_roots).get(qualified_name).cloned()
    }

    /// Adds `root` unless a root with the same qualified name is already
    /// present, and returns the handle that lives in the tree. Callers route
    /// through [`Component::insert`], which picks the package by name.
    pub(crate) fn insert(self: &Arc<Self>, root: Arc<TypeRoot>) -> Arc<TypeRoot> {
        debug_assert_eq!(root.package_name(), self.qualified_name);
        let mut roots = write(&self.type_roots);
        if let Some(existing) = roots.get(root.qualified_name()) {
            debug!(
                type_name = %root.qualified_name(),
                kept = %existing.location(),
                ignored = %root.location(),
                "duplicate unit, keeping first"
            );
            return Arc::clone(existing);
        }
        root.attach(Arc::downgrade(self));
        roots.insert(root.qualified_name().to_string(), Arc::clone(&root));
        root
    }

    fn collect_type_roots(&self, out: &mut Vec<Arc<TypeRoot>>) {
        out.extend(self.type_roots());
        for sub in self.subpackages() {
            sub.collect_type_roots(out);
        }
    }
}

/// Root of one component's tree. Two versions of the same module are two
/// separate components and never share nodes.
#[derive(Debug)]
pub struct Component {
    id: String,
    version: Option<String>,
    packages: RwLock<BTreeMap<String, Arc<Package>>>,
    faults: Mutex<Vec<UnitFault>>,
}

impl Component {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            version,
            packages: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Top-level packages; the default package has an empty segment.
    pub fn packages(&self) -> Vec<Arc<Package>> {
        read(&self.packages).values().cloned().collect()
    }

    pub fn package(&self, qualified_name: &str) -> Option<Arc<Package>> {
        let mut segments = package_segments(qualified_name);
        let first = segments.next()?;
        let mut current = read(&self.packages).get(first).cloned()?;
        for segment in segments {
            current = current.subpackage(segment)?;
        }
        Some(current)
    }

    pub fn ensure_package(self: &Arc<Self>, qualified_name: &str) -> Arc<Package> {
        let mut segments = package_segments(qualified_name);
        // package_segments always yields at least one segment.
        let first = segments.next().unwrap_or_default();
        let mut current = self.top_level_or_insert(first);
        for segment in segments {
            current = current.subpackage_or_insert(segment);
        }
        current
    }

    fn top_level_or_insert(self: &Arc<Self>, segment: &str) -> Arc<Package> {
        if let Some(existing) = read(&self.packages).get(segment) {
            return Arc::clone(existing);
        }
        let mut packages = write(&self.packages);
        Arc::clone(packages.entry(segment.to_string()).or_insert_with(|| {
            Arc::new(Package::new(
                segment,
                segment.to_string(),
                ParentLink::Component(Arc::downgrade(self)),
            ))
        }))
    }

    /// Routes `root` to its package (creating packages on the way) and
    /// returns the live handle for its qualified name.
    pub fn insert(self: &Arc<Self>, root: Arc<TypeRoot>) -> Arc<TypeRoot> {
        let package = self.ensure_package(root.package_name());
        package.insert(root)
    }

    pub fn find_type_root(&self, qualified_name: &str) -> Option<Arc<TypeRoot>> {
        let (package, _) = split_qualified_name(qualified_name);
        self.package(package)?.type_root(qualified_name)
    }

    /// Every type root, packages in name order, depth first.
    pub fn type_roots(&self) -> Vec<Arc<TypeRoot>> {
        let mut out = Vec::new();
        for package in self.packages() {
            package.collect_type_roots(&mut out);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.type_roots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes `qualified_name` on demand. `Ok(None)` means the name is not
    /// part of this component.
    pub fn resolve_type(&self, qualified_name: &str) -> Result<Option<Arc<Type>>> {
        match self.find_type_root(qualified_name) {
            Some(root) => root.structure().map(Some),
            None => Ok(None),
        }
    }

    /// `qualified_name` followed by its superclasses, resolved through this
    /// component one at a time. Stops at the first superclass that is not in
    /// the component (it is still listed) or when a name repeats.
    pub fn superclass_chain(&self, qualified_name: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(qualified_name.to_string());
        while let Some(name) = next.take() {
            if !seen.insert(name.clone()) {
                break;
            }
            next = match self.resolve_type(&name)? {
                Some(ty) => ty.superclass.clone(),
                None => None,
            };
            chain.push(name);
        }
        Ok(chain)
    }

    /// Records a fault, replacing an earlier one for the same unit.
    pub fn record_fault(&self, fault: UnitFault) {
        let mut faults = lock(&self.faults);
        faults.retain(|f| f.qualified_name != fault.qualified_name || f.location != fault.location);
        faults.push(fault);
    }

    /// Drops the fault for a unit that has since decoded.
    pub fn clear_fault(&self, qualified_name: &str) {
        lock(&self.faults).retain(|f| f.qualified_name != qualified_name);
    }

    pub fn faults(&self) -> Vec<UnitFault> {
        lock(&self.faults).clone()
    }
}

fn package_segments(qualified_name: &str) -> impl Iterator<Item = &str> {
    qualified_name.split('.')
}

fn join_package(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}.{segment}")
    }
}

// Every guarded value here is valid after any partial update, so a poisoned
// lock is still safe to use.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(lock: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
