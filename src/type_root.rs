//! Lazy handle on one binary unit.
//!
//! A `TypeRoot` knows its qualified name and where its bytes live. It does
//! no I/O until [`TypeRoot::bytes`] or [`TypeRoot::structure`] is called.
//!
//! The decoded structure is cached with three observable states:
//!
//! - unset: `structure` is empty and nobody holds `decode_lock`
//! - decoding: one caller holds `decode_lock`, others wait on it
//! - set: `structure` is filled and never changes again
//!
//! Failed decodes leave the handle unset, so the next call retries.

use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::{debug, warn};

use crate::classfile::{DecodeOptions, decode_with};
use crate::element::{Component, Element, ElementKind, Package};
use crate::error::{ApiModelError, Result};
use crate::model::{Type, split_qualified_name};
use crate::source::ByteSource;

pub struct TypeRoot {
    qualified_name: String,
    source: Arc<dyn ByteSource>,
    options: DecodeOptions,
    structure: OnceLock<Arc<Type>>,
    decode_lock: Mutex<()>,
    parent: OnceLock<Weak<Package>>,
}

impl TypeRoot {
    pub fn new(qualified_name: impl Into<String>, source: Arc<dyn ByteSource>) -> Self {
        Self::with_options(qualified_name, source, DecodeOptions::default())
    }

    pub fn with_options(
        qualified_name: impl Into<String>,
        source: Arc<dyn ByteSource>,
        options: DecodeOptions,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            source,
            options,
            structure: OnceLock::new(),
            decode_lock: Mutex::new(()),
            parent: OnceLock::new(),
        }
    }

    /// Declared identity; never touches the byte source.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn package_name(&self) -> &str {
        split_qualified_name(&self.qualified_name).0
    }

    pub fn simple_name(&self) -> &str {
        split_qualified_name(&self.qualified_name).1
    }

    pub fn location(&self) -> String {
        self.source.location()
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.source.read_all()
    }

    /// SHA-256 of the unit's bytes, hex encoded.
    pub fn digest(&self) -> Result<String> {
        let bytes = self.bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    pub fn structure(&self) -> Result<Arc<Type>> {
        if let Some(ty) = self.structure.get() {
            return Ok(Arc::clone(ty));
        }

        let _guard = self
            .decode_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled the slot while we waited.
        if let Some(ty) = self.structure.get() {
            return Ok(Arc::clone(ty));
        }

        match self.load() {
            Ok(ty) => {
                let ty = Arc::new(ty);
                debug!(
                    type_name = %self.qualified_name,
                    fields = ty.fields.len(),
                    methods = ty.methods.len(),
                    "decoded type structure"
                );
                Ok(Arc::clone(self.structure.get_or_init(|| ty)))
            }
            Err(err) => {
                warn!(
                    type_name = %self.qualified_name,
                    location = %self.location(),
                    error = %err,
                    "failed to decode type structure"
                );
                Err(err)
            }
        }
    }

    fn load(&self) -> Result<Type> {
        let bytes = self.bytes()?;
        let ty = decode_with(&bytes, self.options)?;
        if ty.name != self.qualified_name {
            return Err(ApiModelError::malformed(format!(
                "unit located as {} declares type {}",
                self.qualified_name, ty.name
            )));
        }
        Ok(ty)
    }

    /// The cached structure, if a previous call decoded it.
    pub fn cached_structure(&self) -> Option<Arc<Type>> {
        self.structure.get().cloned()
    }

    pub fn is_decoded(&self) -> bool {
        self.structure.get().is_some()
    }

    pub fn parent(&self) -> Option<Arc<Package>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    /// Wires this root under `package`. The first wiring wins.
    pub(crate) fn attach(&self, package: Weak<Package>) {
        let _ = self.parent.set(package);
    }

    /// Owning component, found by walking up the tree rather than stored.
    pub fn component(self: &Arc<Self>) -> Option<Arc<Component>> {
        match Element::TypeRoot(Arc::clone(self)).ancestor(ElementKind::Component)? {
            Element::Component(component) => Some(component),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TypeRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRoot")
            .field("qualified_name", &self.qualified_name)
            .field("source", &self.source)
            .field("decoded", &self.is_decoded())
            .finish()
    }
}
