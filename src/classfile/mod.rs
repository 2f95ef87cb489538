//! Pure class-file decoder: bytes in, [`Type`] out.
//!
//! Decoding never performs I/O and never looks at other types. References to
//! superclasses, interfaces and nested types come back as qualified names.

mod descriptor;
mod pool;
mod reader;

use serde::{Deserialize, Serialize};

use crate::error::{ApiModelError, Result};
use crate::model::{
    ACC_MODULE, AnnotationRef, ClassVersion, ConstantValue, EnclosingRef, FieldDescriptor,
    MethodDescriptor, MethodParameter, ModifierTarget, Modifiers, NestedTypeRef, Type,
    TypeAnnotationRef, TypeKind,
};
use descriptor::{parse_field_descriptor, parse_method_descriptor};
use pool::ConstantPool;
use reader::ClassReader;

pub const MAGIC: u32 = 0xCAFE_BABE;
/// JDK 1.1.
pub const MIN_MAJOR_VERSION: u16 = 45;
/// JDK 25.
pub const MAX_MAJOR_VERSION: u16 = 69;

const DEPRECATED_ANNOTATION: &str = "java.lang.Deprecated";

/// Annotation element values nest through arrays and annotations; real
/// class files stay far below this.
const MAX_ELEMENT_DEPTH: usize = 256;

/// API-relevant attributes this decoder recognizes but does not model.
const UNMODELLED_ATTRIBUTES: &[&str] = &["Record", "Module", "ModulePackages", "ModuleMainClass"];

/// What to do with a recognized section the model cannot represent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedPolicy {
    /// Fail the decode with `UnsupportedFeature`.
    #[default]
    Fail,
    /// Decode the rest and list the section in `Type::unsupported_sections`.
    Record,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub unsupported: UnsupportedPolicy,
}

pub fn decode(bytes: &[u8]) -> Result<Type> {
    decode_with(bytes, DecodeOptions::default())
}

pub fn decode_with(bytes: &[u8], options: DecodeOptions) -> Result<Type> {
    let mut reader = ClassReader::new(bytes);
    let version = read_header(&mut reader)?;
    let pool = ConstantPool::parse(&mut reader)?;
    let mut unsupported = Vec::new();

    let access_flags = reader.read_u2("class header")?;
    if access_flags & ACC_MODULE != 0 {
        return Err(ApiModelError::unsupported("module descriptor"));
    }
    let name = pool.class_name(reader.read_u2("class header")?)?;
    let superclass = pool.optional_class_name(reader.read_u2("class header")?)?;
    if superclass.is_none() && name != "java.lang.Object" {
        return Err(ApiModelError::malformed(format!(
            "{name} has no superclass"
        )));
    }

    let interfaces_count = reader.read_u2("interfaces")?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        interfaces.push(pool.class_name(reader.read_u2("interfaces")?)?);
    }

    let fields_count = reader.read_u2("fields")?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(read_field(&mut reader, &pool, options, &mut unsupported)?);
    }

    let methods_count = reader.read_u2("methods")?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(read_method(&mut reader, &pool, options, &mut unsupported)?);
    }

    let attrs = read_attributes(&mut reader, &pool, options, &mut unsupported)?;
    if reader.remaining() != 0 {
        return Err(ApiModelError::malformed(format!(
            "{} trailing bytes after class attributes",
            reader.remaining()
        )));
    }

    let deprecated = attrs.is_deprecated();
    let modifiers = Modifiers::new(
        access_flags | attrs.synthetic_flag(),
        ModifierTarget::Type,
    )
    .with_deprecated(deprecated);

    Ok(Type {
        kind: TypeKind::from_access_flags(access_flags),
        name,
        version,
        modifiers,
        superclass,
        interfaces,
        fields,
        methods,
        generic_signature: attrs.signature,
        source_file: attrs.source_file,
        enclosing: attrs.enclosing,
        nested: attrs.inner_classes,
        nest_host: attrs.nest_host,
        nest_members: attrs.nest_members,
        permitted_subclasses: attrs.permitted_subclasses,
        annotations: attrs.annotations,
        type_annotations: attrs.type_annotations,
        unsupported_sections: unsupported,
    })
}

fn read_header(reader: &mut ClassReader<'_>) -> Result<ClassVersion> {
    if reader.remaining() < 8 {
        return Err(ApiModelError::malformed("missing class file header"));
    }
    let magic = reader.read_u4("header")?;
    if magic != MAGIC {
        return Err(ApiModelError::malformed(format!(
            "bad magic 0x{magic:08X}"
        )));
    }
    let minor = reader.read_u2("header")?;
    let major = reader.read_u2("header")?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major) {
        return Err(ApiModelError::malformed(format!(
            "unsupported class file version {major}.{minor}"
        )));
    }
    Ok(ClassVersion { major, minor })
}

fn read_field(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    options: DecodeOptions,
    unsupported: &mut Vec<String>,
) -> Result<FieldDescriptor> {
    let access_flags = reader.read_u2("field")?;
    let name = pool.utf8(reader.read_u2("field")?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2("field")?)?.to_string();
    let type_name = parse_field_descriptor(&descriptor)?;
    let attrs = read_attributes(reader, pool, options, unsupported)?;

    Ok(FieldDescriptor {
        modifiers: Modifiers::new(access_flags | attrs.synthetic_flag(), ModifierTarget::Field)
            .with_deprecated(attrs.is_deprecated()),
        name,
        descriptor,
        type_name,
        generic_signature: attrs.signature,
        constant_value: attrs.constant_value,
        annotations: attrs.annotations,
        type_annotations: attrs.type_annotations,
    })
}

fn read_method(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    options: DecodeOptions,
    unsupported: &mut Vec<String>,
) -> Result<MethodDescriptor> {
    let access_flags = reader.read_u2("method")?;
    let name = pool.utf8(reader.read_u2("method")?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2("method")?)?.to_string();
    let (parameter_types, return_type) = parse_method_descriptor(&descriptor)?;
    let attrs = read_attributes(reader, pool, options, unsupported)?;

    Ok(MethodDescriptor {
        modifiers: Modifiers::new(access_flags | attrs.synthetic_flag(), ModifierTarget::Method)
            .with_deprecated(attrs.is_deprecated()),
        name,
        descriptor,
        parameter_types,
        return_type,
        thrown: attrs.exceptions,
        generic_signature: attrs.signature,
        annotations: attrs.annotations,
        parameter_annotations: attrs.parameter_annotations,
        type_annotations: attrs.type_annotations,
        parameters: attrs.parameters,
        annotation_default: attrs.annotation_default,
    })
}

#[derive(Default)]
struct Attributes {
    signature: Option<String>,
    deprecated: bool,
    synthetic: bool,
    constant_value: Option<ConstantValue>,
    exceptions: Vec<String>,
    source_file: Option<String>,
    inner_classes: Vec<NestedTypeRef>,
    enclosing: Option<EnclosingRef>,
    nest_host: Option<String>,
    nest_members: Vec<String>,
    permitted_subclasses: Vec<String>,
    annotations: Vec<AnnotationRef>,
    parameter_annotations: Vec<Vec<AnnotationRef>>,
    type_annotations: Vec<TypeAnnotationRef>,
    parameters: Vec<MethodParameter>,
    annotation_default: Option<String>,
}

impl Attributes {
    fn is_deprecated(&self) -> bool {
        self.deprecated
            || self
                .annotations
                .iter()
                .any(|a| a.type_name == DEPRECATED_ANNOTATION)
    }

    fn synthetic_flag(&self) -> u16 {
        if self.synthetic {
            crate::model::ACC_SYNTHETIC
        } else {
            0
        }
    }
}

fn read_attributes(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    options: DecodeOptions,
    unsupported: &mut Vec<String>,
) -> Result<Attributes> {
    let mut attrs = Attributes::default();
    let count = reader.read_u2("attributes")?;
    for _ in 0..count {
        let name = pool.utf8(reader.read_u2("attribute header")?)?;
        let length = reader.read_u4("attribute header")? as usize;
        let body = reader.read_slice("attribute body", length)?;
        let mut sub = ClassReader::new(body);

        match name {
            "Signature" => {
                attrs.signature = Some(pool.utf8(sub.read_u2("Signature")?)?.to_string());
            }
            "Deprecated" => attrs.deprecated = true,
            "Synthetic" => attrs.synthetic = true,
            "SourceFile" => {
                attrs.source_file = Some(pool.utf8(sub.read_u2("SourceFile")?)?.to_string());
            }
            "ConstantValue" => {
                attrs.constant_value = Some(pool.constant_value(sub.read_u2("ConstantValue")?)?);
            }
            "Exceptions" => {
                let n = sub.read_u2("Exceptions")?;
                for _ in 0..n {
                    attrs
                        .exceptions
                        .push(pool.class_name(sub.read_u2("Exceptions")?)?);
                }
            }
            "InnerClasses" => {
                let n = sub.read_u2("InnerClasses")?;
                for _ in 0..n {
                    let inner = pool.class_name(sub.read_u2("InnerClasses")?)?;
                    let outer = pool.optional_class_name(sub.read_u2("InnerClasses")?)?;
                    let simple_name = pool
                        .optional_utf8(sub.read_u2("InnerClasses")?)?
                        .map(str::to_string);
                    let flags = sub.read_u2("InnerClasses")?;
                    attrs.inner_classes.push(NestedTypeRef {
                        inner,
                        outer,
                        simple_name,
                        modifiers: Modifiers::new(flags, ModifierTarget::Type),
                    });
                }
            }
            "EnclosingMethod" => {
                let class = pool.class_name(sub.read_u2("EnclosingMethod")?)?;
                let method_index = sub.read_u2("EnclosingMethod")?;
                let (method, method_descriptor) = if method_index == 0 {
                    (None, None)
                } else {
                    let (n, d) = pool.name_and_type(method_index)?;
                    (Some(n.to_string()), Some(d.to_string()))
                };
                attrs.enclosing = Some(EnclosingRef {
                    class,
                    method,
                    method_descriptor,
                });
            }
            "NestHost" => {
                attrs.nest_host = Some(pool.class_name(sub.read_u2("NestHost")?)?);
            }
            "NestMembers" | "PermittedSubclasses" => {
                let section = if name == "NestMembers" {
                    "NestMembers"
                } else {
                    "PermittedSubclasses"
                };
                let n = sub.read_u2(section)?;
                let mut names = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    names.push(pool.class_name(sub.read_u2(section)?)?);
                }
                if name == "NestMembers" {
                    attrs.nest_members = names;
                } else {
                    attrs.permitted_subclasses = names;
                }
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let visible = name == "RuntimeVisibleAnnotations";
                let n = sub.read_u2("annotations")?;
                for _ in 0..n {
                    attrs
                        .annotations
                        .push(read_annotation(&mut sub, pool, visible, 0)?);
                }
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                let visible = name == "RuntimeVisibleParameterAnnotations";
                let params = sub.read_u1("parameter annotations")? as usize;
                if attrs.parameter_annotations.len() < params {
                    attrs.parameter_annotations.resize_with(params, Vec::new);
                }
                for slot in attrs.parameter_annotations.iter_mut().take(params) {
                    let n = sub.read_u2("parameter annotations")?;
                    for _ in 0..n {
                        slot.push(read_annotation(&mut sub, pool, visible, 0)?);
                    }
                }
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                let visible = name == "RuntimeVisibleTypeAnnotations";
                let n = sub.read_u2("type annotations")?;
                for _ in 0..n {
                    attrs
                        .type_annotations
                        .push(read_type_annotation(&mut sub, pool, visible)?);
                }
            }
            "MethodParameters" => {
                let n = sub.read_u1("MethodParameters")?;
                for _ in 0..n {
                    let name = pool
                        .optional_utf8(sub.read_u2("MethodParameters")?)?
                        .map(str::to_string);
                    let access_flags = sub.read_u2("MethodParameters")?;
                    attrs.parameters.push(MethodParameter { name, access_flags });
                }
            }
            "AnnotationDefault" => {
                attrs.annotation_default = Some(read_element_value(&mut sub, pool, 0)?);
            }
            other if UNMODELLED_ATTRIBUTES.contains(&other) => {
                match options.unsupported {
                    UnsupportedPolicy::Fail => {
                        return Err(ApiModelError::unsupported(format!("{other} attribute")));
                    }
                    UnsupportedPolicy::Record => {
                        if !unsupported.iter().any(|s| s == other) {
                            unsupported.push(other.to_string());
                        }
                    }
                }
                continue;
            }
            // Code, debug tables and vendor attributes carry no API.
            _ => continue,
        }

        if sub.remaining() != 0 {
            return Err(ApiModelError::malformed(format!(
                "{name} attribute declares {length} bytes but uses {}",
                length - sub.remaining()
            )));
        }
    }
    Ok(attrs)
}

fn read_annotation(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    visible: bool,
    depth: usize,
) -> Result<AnnotationRef> {
    let type_name = parse_field_descriptor(pool.utf8(reader.read_u2("annotation")?)?)?;
    let pairs = reader.read_u2("annotation")?;
    let mut elements = Vec::with_capacity(pairs as usize);
    for _ in 0..pairs {
        elements.push(pool.utf8(reader.read_u2("annotation")?)?.to_string());
        read_element_value(reader, pool, depth)?;
    }
    Ok(AnnotationRef {
        type_name,
        visible,
        elements,
    })
}

fn read_type_annotation(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<TypeAnnotationRef> {
    let target_type = reader.read_u1("type annotation")?;
    // Targets 0x40 and up only occur inside Code, which is never decoded.
    let (target, info_len) = match target_type {
        0x00 => ("class_type_parameter", 1),
        0x01 => ("method_type_parameter", 1),
        0x10 => ("supertype", 2),
        0x11 => ("class_type_parameter_bound", 2),
        0x12 => ("method_type_parameter_bound", 2),
        0x13 => ("field", 0),
        0x14 => ("method_return", 0),
        0x15 => ("method_receiver", 0),
        0x16 => ("method_formal_parameter", 1),
        0x17 => ("throws", 2),
        other => {
            return Err(ApiModelError::malformed(format!(
                "type annotation target 0x{other:02X} outside code"
            )));
        }
    };
    reader.skip("type annotation", info_len)?;
    let path_length = reader.read_u1("type annotation")? as usize;
    reader.skip("type annotation", path_length * 2)?;
    let annotation = read_annotation(reader, pool, visible, 0)?;
    Ok(TypeAnnotationRef { target, annotation })
}

/// Reads one element value and renders it the way it would be written in
/// source (`3`, `"x"`, `E.A`, `{1, 2}`).
fn read_element_value(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<String> {
    if depth > MAX_ELEMENT_DEPTH {
        return Err(ApiModelError::malformed(format!(
            "annotation values nested deeper than {MAX_ELEMENT_DEPTH}"
        )));
    }
    let tag = reader.read_u1("annotation value")?;
    let rendered = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
            let value = pool.constant_value(reader.read_u2("annotation value")?)?;
            render_constant(tag, value)
        }
        b's' => format!("{:?}", pool.utf8(reader.read_u2("annotation value")?)?),
        b'e' => {
            let enum_type = parse_field_descriptor(pool.utf8(reader.read_u2("annotation value")?)?)?;
            let constant = pool.utf8(reader.read_u2("annotation value")?)?;
            format!("{enum_type}.{constant}")
        }
        b'c' => {
            let descriptor = pool.utf8(reader.read_u2("annotation value")?)?;
            let class = if descriptor == "V" {
                "void".to_string()
            } else {
                parse_field_descriptor(descriptor)?
            };
            format!("{class}.class")
        }
        b'@' => {
            let nested = read_annotation(reader, pool, true, depth + 1)?;
            format!("@{}", nested.type_name)
        }
        b'[' => {
            let n = reader.read_u2("annotation value")?;
            let mut items = Vec::with_capacity(n as usize);
            for _ in 0..n {
                items.push(read_element_value(reader, pool, depth + 1)?);
            }
            format!("{{{}}}", items.join(", "))
        }
        other => {
            return Err(ApiModelError::malformed(format!(
                "unknown annotation element tag '{}'",
                other as char
            )));
        }
    };
    Ok(rendered)
}

fn render_constant(tag: u8, value: ConstantValue) -> String {
    match (tag, value) {
        (b'Z', ConstantValue::Int(v)) => (v != 0).to_string(),
        (b'C', ConstantValue::Int(v)) => char::from_u32(v as u32)
            .map(|c| format!("{c:?}"))
            .unwrap_or_else(|| v.to_string()),
        (_, ConstantValue::Int(v)) => v.to_string(),
        (_, ConstantValue::Long(v)) => format!("{v}L"),
        (_, ConstantValue::Float(v)) => format!("{v}f"),
        (_, ConstantValue::Double(v)) => v.to_string(),
        (_, ConstantValue::String(v)) => format!("{v:?}"),
    }
}
