//! Decoded structure of one compiled type.
//!
//! A [`Type`] is immutable once built. Cross-type references (superclass,
//! interfaces, nested types) are kept as qualified names; resolving them to
//! other `Type`s goes through [`crate::element::Component`].
//!
//! Field and method order is the declaration order found in the class file.
//! Comparators diff these sequences positionally, so the order must never be
//! normalized here.

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_VOLATILE: u16 = 0x0040;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_TRANSIENT: u16 = 0x0080;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STRICT: u16 = 0x0800;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;
pub const ACC_MODULE: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

impl TypeKind {
    pub fn from_access_flags(flags: u16) -> Self {
        if flags & ACC_ANNOTATION != 0 {
            TypeKind::Annotation
        } else if flags & ACC_INTERFACE != 0 {
            TypeKind::Interface
        } else if flags & ACC_ENUM != 0 {
            TypeKind::Enum
        } else {
            TypeKind::Class
        }
    }
}

/// What a set of access flags belongs to. The same bit means different
/// things on a type, a field and a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierTarget {
    Type,
    Field,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    flags: u16,
    deprecated: bool,
    target: ModifierTarget,
}

impl Modifiers {
    pub fn new(flags: u16, target: ModifierTarget) -> Self {
        Self {
            flags,
            deprecated: false,
            target,
        }
    }

    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn has(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn is_public(&self) -> bool {
        self.has(ACC_PUBLIC)
    }

    pub fn is_protected(&self) -> bool {
        self.has(ACC_PROTECTED)
    }

    pub fn is_private(&self) -> bool {
        self.has(ACC_PRIVATE)
    }

    pub fn is_static(&self) -> bool {
        self.has(ACC_STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.has(ACC_FINAL)
    }

    pub fn is_abstract(&self) -> bool {
        self.has(ACC_ABSTRACT)
    }

    pub fn is_synthetic(&self) -> bool {
        self.has(ACC_SYNTHETIC)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Source-level keywords in canonical order, followed by `synthetic` and
    /// `deprecated` when present.
    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut push = |flag: u16, name: &'static str| {
            if self.has(flag) {
                out.push(name);
            }
        };
        push(ACC_PUBLIC, "public");
        push(ACC_PROTECTED, "protected");
        push(ACC_PRIVATE, "private");
        push(ACC_ABSTRACT, "abstract");
        push(ACC_STATIC, "static");
        push(ACC_FINAL, "final");
        match self.target {
            ModifierTarget::Type => {}
            ModifierTarget::Field => {
                push(ACC_TRANSIENT, "transient");
                push(ACC_VOLATILE, "volatile");
            }
            ModifierTarget::Method => {
                push(ACC_SYNCHRONIZED, "synchronized");
                push(ACC_NATIVE, "native");
                push(ACC_STRICT, "strictfp");
                push(ACC_BRIDGE, "bridge");
                push(ACC_VARARGS, "varargs");
            }
        }
        push(ACC_SYNTHETIC, "synthetic");
        if self.deprecated {
            out.push("deprecated");
        }
        out
    }
}

impl Serialize for Modifiers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRef {
    pub type_name: String,
    /// `true` for runtime-visible, `false` for class-retention annotations.
    pub visible: bool,
    pub elements: Vec<String>,
}

/// An annotation on a type use. `target` names where the annotated type
/// appears, e.g. `supertype` or `method_formal_parameter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeAnnotationRef {
    pub target: &'static str,
    #[serde(flatten)]
    pub annotation: AnnotationRef,
}

/// One entry of a method's `MethodParameters` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodParameter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: String,
    pub type_name: String,
    pub modifiers: Modifiers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant_value: Option<ConstantValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_annotations: Vec<TypeAnnotationRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub descriptor: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub modifiers: Modifiers,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub thrown: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_signature: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationRef>,
    /// Per declared parameter; empty when the method has none retained.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_annotations: Vec<Vec<AnnotationRef>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_annotations: Vec<TypeAnnotationRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<MethodParameter>,
    /// Default of an annotation interface element, rendered as source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_default: Option<String>,
}

impl MethodDescriptor {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }
}

/// One row of the `InnerClasses` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedTypeRef {
    pub inner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simple_name: Option<String>,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnclosingRef {
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_descriptor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassVersion {
    pub major: u16,
    pub minor: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type {
    pub kind: TypeKind,
    pub name: String,
    pub version: ClassVersion,
    pub modifiers: Modifiers,
    /// `None` only for `java.lang.Object` and module descriptors.
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<EnclosingRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<NestedTypeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nest_host: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nest_members: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permitted_subclasses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_annotations: Vec<TypeAnnotationRef>,
    /// Sections the decoder recognized but does not model, when the caller
    /// asked for them to be recorded instead of failing the decode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unsupported_sections: Vec<String>,
}

impl Type {
    pub fn package(&self) -> &str {
        split_qualified_name(&self.name).0
    }

    pub fn simple_name(&self) -> &str {
        split_qualified_name(&self.name).1
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All overloads named `name`, in declaration order.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDescriptor> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn is_nested(&self) -> bool {
        self.enclosing.is_some()
            || self
                .nested
                .iter()
                .any(|n| n.inner == self.name && n.outer.is_some())
    }

    /// Names of every type this one directly depends on structurally.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

/// Splits `a.b.C` into (`a.b`, `C`). The default package is `""`.
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((package, simple)) => (package, simple),
        None => ("", name),
    }
}

/// Converts an internal name (`java/lang/Object`) into a qualified name.
pub fn internal_to_qualified(internal: &str) -> String {
    internal.replace('/', ".")
}
