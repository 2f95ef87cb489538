//! Minimal class-file encoder for test fixtures.
//!
//! Produces structurally valid class files (no method bodies) so the decoder,
//! type roots and locator can be exercised without a Java toolchain.
#![allow(dead_code)]

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;

#[derive(Default)]
struct Pool {
    bytes: Vec<u8>,
    count: u16,
    utf8: Vec<(String, u16)>,
    classes: Vec<(String, u16)>,
}

impl Pool {
    fn push(&mut self, entry: &[u8]) -> u16 {
        self.count += 1;
        self.bytes.extend_from_slice(entry);
        self.count
    }

    fn utf8(&mut self, value: &str) -> u16 {
        if let Some((_, idx)) = self.utf8.iter().find(|(v, _)| v == value) {
            return *idx;
        }
        let mut entry = vec![1];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        let idx = self.push(&entry);
        self.utf8.push((value.to_string(), idx));
        idx
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some((_, idx)) = self.classes.iter().find(|(v, _)| v == internal_name) {
            return *idx;
        }
        let name = self.utf8(internal_name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name.to_be_bytes());
        let idx = self.push(&entry);
        self.classes.push((internal_name.to_string(), idx));
        idx
    }

    fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        let mut entry = vec![8];
        entry.extend_from_slice(&utf8.to_be_bytes());
        self.push(&entry)
    }

    fn int(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push(&entry)
    }
}

#[derive(Clone)]
enum Attr {
    Signature(String),
    Deprecated,
    IntConstant(i32),
    StringConstant(String),
    Throws(Vec<String>),
    Annotation { descriptor: String, visible: bool },
    InnerClass {
        inner: String,
        outer: Option<String>,
        name: Option<String>,
        flags: u16,
    },
    NestHost(String),
    ParameterAnnotation {
        index: u8,
        descriptor: String,
        visible: bool,
    },
    TypeAnnotation {
        target_type: u8,
        target_info: Vec<u8>,
        descriptor: String,
        visible: bool,
    },
    Parameter { name: Option<String>, flags: u16 },
    AnnotationDefaultInt(i32),
    Raw { name: String, body: Vec<u8> },
}

#[derive(Clone)]
pub struct MemberSpec {
    name: String,
    descriptor: String,
    access: u16,
    attrs: Vec<Attr>,
}

impl MemberSpec {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: ACC_PUBLIC,
            attrs: Vec::new(),
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.attrs.push(Attr::Signature(signature.to_string()));
        self
    }

    pub fn throws(mut self, internal_name: &str) -> Self {
        self.attrs.push(Attr::Throws(vec![internal_name.to_string()]));
        self
    }

    pub fn int_constant(mut self, value: i32) -> Self {
        self.attrs.push(Attr::IntConstant(value));
        self
    }

    pub fn string_constant(mut self, value: &str) -> Self {
        self.attrs.push(Attr::StringConstant(value.to_string()));
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attrs.push(Attr::Deprecated);
        self
    }

    pub fn annotation(mut self, descriptor: &str, visible: bool) -> Self {
        self.attrs.push(Attr::Annotation {
            descriptor: descriptor.to_string(),
            visible,
        });
        self
    }

    pub fn parameter_annotation(mut self, index: u8, descriptor: &str, visible: bool) -> Self {
        self.attrs.push(Attr::ParameterAnnotation {
            index,
            descriptor: descriptor.to_string(),
            visible,
        });
        self
    }

    pub fn type_annotation(
        mut self,
        target_type: u8,
        target_info: &[u8],
        descriptor: &str,
        visible: bool,
    ) -> Self {
        self.attrs.push(Attr::TypeAnnotation {
            target_type,
            target_info: target_info.to_vec(),
            descriptor: descriptor.to_string(),
            visible,
        });
        self
    }

    /// One `MethodParameters` entry; `None` leaves the name index at zero.
    pub fn parameter(mut self, name: Option<&str>, flags: u16) -> Self {
        self.attrs.push(Attr::Parameter {
            name: name.map(str::to_string),
            flags,
        });
        self
    }

    pub fn annotation_default_int(mut self, value: i32) -> Self {
        self.attrs.push(Attr::AnnotationDefaultInt(value));
        self
    }
}

pub struct ClassFileBuilder {
    name: String,
    access: u16,
    major: u16,
    minor: u16,
    superclass: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
    attrs: Vec<Attr>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`, targeting Java 8.
    pub fn class(internal_name: &str) -> Self {
        Self {
            name: internal_name.to_string(),
            access: ACC_PUBLIC | ACC_SUPER,
            major: 52,
            minor: 0,
            superclass: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attrs: Vec::new(),
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn superclass(mut self, internal_name: &str) -> Self {
        self.superclass = Some(internal_name.to_string());
        self
    }

    pub fn no_superclass(mut self) -> Self {
        self.superclass = None;
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        self.interfaces.push(internal_name.to_string());
        self
    }

    pub fn field(mut self, field: MemberSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MemberSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.attrs.push(Attr::Signature(signature.to_string()));
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attrs.push(Attr::Deprecated);
        self
    }

    pub fn annotation(mut self, descriptor: &str, visible: bool) -> Self {
        self.attrs.push(Attr::Annotation {
            descriptor: descriptor.to_string(),
            visible,
        });
        self
    }

    pub fn inner_class(
        mut self,
        inner: &str,
        outer: Option<&str>,
        name: Option<&str>,
        flags: u16,
    ) -> Self {
        self.attrs.push(Attr::InnerClass {
            inner: inner.to_string(),
            outer: outer.map(str::to_string),
            name: name.map(str::to_string),
            flags,
        });
        self
    }

    pub fn type_annotation(
        mut self,
        target_type: u8,
        target_info: &[u8],
        descriptor: &str,
        visible: bool,
    ) -> Self {
        self.attrs.push(Attr::TypeAnnotation {
            target_type,
            target_info: target_info.to_vec(),
            descriptor: descriptor.to_string(),
            visible,
        });
        self
    }

    pub fn nest_host(mut self, internal_name: &str) -> Self {
        self.attrs.push(Attr::NestHost(internal_name.to_string()));
        self
    }

    pub fn raw_attribute(mut self, name: &str, body: &[u8]) -> Self {
        self.attrs.push(Attr::Raw {
            name: name.to_string(),
            body: body.to_vec(),
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = Pool::default();
        let mut body = Vec::new();

        let this_class = pool.class(&self.name);
        let super_class = self
            .superclass
            .as_deref()
            .map(|s| pool.class(s))
            .unwrap_or(0);
        body.extend_from_slice(&self.access.to_be_bytes());
        body.extend_from_slice(&this_class.to_be_bytes());
        body.extend_from_slice(&super_class.to_be_bytes());

        body.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            let idx = pool.class(interface);
            body.extend_from_slice(&idx.to_be_bytes());
        }

        for members in [&self.fields, &self.methods] {
            body.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                body.extend_from_slice(&member.access.to_be_bytes());
                body.extend_from_slice(&pool.utf8(&member.name).to_be_bytes());
                body.extend_from_slice(&pool.utf8(&member.descriptor).to_be_bytes());
                write_attributes(&mut pool, &mut body, &member.attrs);
            }
        }

        write_attributes(&mut pool, &mut body, &self.attrs);

        let mut out = Vec::with_capacity(body.len() + pool.bytes.len() + 10);
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&self.minor.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&(pool.count + 1).to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

fn write_attributes(pool: &mut Pool, out: &mut Vec<u8>, attrs: &[Attr]) {
    // Annotations of one visibility share a single attribute.
    let mut encoded: Vec<(u16, Vec<u8>)> = Vec::new();
    let mut visible = Vec::new();
    let mut invisible = Vec::new();
    let mut params_visible: Vec<(u8, u16)> = Vec::new();
    let mut params_invisible: Vec<(u8, u16)> = Vec::new();
    let mut types_visible: Vec<Vec<u8>> = Vec::new();
    let mut types_invisible: Vec<Vec<u8>> = Vec::new();
    let mut parameters: Vec<(u16, u16)> = Vec::new();

    for attr in attrs {
        match attr {
            Attr::Signature(sig) => {
                let name = pool.utf8("Signature");
                encoded.push((name, pool.utf8(sig).to_be_bytes().to_vec()));
            }
            Attr::Deprecated => encoded.push((pool.utf8("Deprecated"), Vec::new())),
            Attr::IntConstant(v) => {
                let name = pool.utf8("ConstantValue");
                encoded.push((name, pool.int(*v).to_be_bytes().to_vec()));
            }
            Attr::StringConstant(v) => {
                let name = pool.utf8("ConstantValue");
                encoded.push((name, pool.string(v).to_be_bytes().to_vec()));
            }
            Attr::Throws(names) => {
                let name = pool.utf8("Exceptions");
                let mut b = (names.len() as u16).to_be_bytes().to_vec();
                for n in names {
                    b.extend_from_slice(&pool.class(n).to_be_bytes());
                }
                encoded.push((name, b));
            }
            Attr::Annotation {
                descriptor,
                visible: true,
            } => visible.push(pool.utf8(descriptor)),
            Attr::Annotation { descriptor, .. } => invisible.push(pool.utf8(descriptor)),
            Attr::InnerClass {
                inner,
                outer,
                name,
                flags,
            } => {
                let attr_name = pool.utf8("InnerClasses");
                let mut b = 1u16.to_be_bytes().to_vec();
                b.extend_from_slice(&pool.class(inner).to_be_bytes());
                let outer_idx = outer.as_deref().map(|o| pool.class(o)).unwrap_or(0);
                b.extend_from_slice(&outer_idx.to_be_bytes());
                let name_idx = name.as_deref().map(|n| pool.utf8(n)).unwrap_or(0);
                b.extend_from_slice(&name_idx.to_be_bytes());
                b.extend_from_slice(&flags.to_be_bytes());
                encoded.push((attr_name, b));
            }
            Attr::NestHost(host) => {
                let name = pool.utf8("NestHost");
                encoded.push((name, pool.class(host).to_be_bytes().to_vec()));
            }
            Attr::ParameterAnnotation {
                index,
                descriptor,
                visible: is_visible,
            } => {
                let entry = (*index, pool.utf8(descriptor));
                if *is_visible {
                    params_visible.push(entry);
                } else {
                    params_invisible.push(entry);
                }
            }
            Attr::TypeAnnotation {
                target_type,
                target_info,
                descriptor,
                visible: is_visible,
            } => {
                let mut b = vec![*target_type];
                b.extend_from_slice(target_info);
                b.push(0);
                b.extend_from_slice(&pool.utf8(descriptor).to_be_bytes());
                b.extend_from_slice(&0u16.to_be_bytes());
                if *is_visible {
                    types_visible.push(b);
                } else {
                    types_invisible.push(b);
                }
            }
            Attr::Parameter { name, flags } => {
                let name_idx = name.as_deref().map(|n| pool.utf8(n)).unwrap_or(0);
                parameters.push((name_idx, *flags));
            }
            Attr::AnnotationDefaultInt(v) => {
                let name = pool.utf8("AnnotationDefault");
                let mut b = vec![b'I'];
                b.extend_from_slice(&pool.int(*v).to_be_bytes());
                encoded.push((name, b));
            }
            Attr::Raw { name, body } => encoded.push((pool.utf8(name), body.clone())),
        }
    }

    for (attr_name, entries) in [
        ("RuntimeVisibleParameterAnnotations", params_visible),
        ("RuntimeInvisibleParameterAnnotations", params_invisible),
    ] {
        let Some(last) = entries.iter().map(|(i, _)| *i).max() else {
            continue;
        };
        let name = pool.utf8(attr_name);
        let mut b = vec![last + 1];
        for param in 0..=last {
            let here: Vec<u16> = entries
                .iter()
                .filter(|(i, _)| *i == param)
                .map(|(_, ty)| *ty)
                .collect();
            b.extend_from_slice(&(here.len() as u16).to_be_bytes());
            for ty in here {
                b.extend_from_slice(&ty.to_be_bytes());
                b.extend_from_slice(&0u16.to_be_bytes());
            }
        }
        encoded.push((name, b));
    }

    for (attr_name, annotations) in [
        ("RuntimeVisibleTypeAnnotations", types_visible),
        ("RuntimeInvisibleTypeAnnotations", types_invisible),
    ] {
        if annotations.is_empty() {
            continue;
        }
        let name = pool.utf8(attr_name);
        let mut b = (annotations.len() as u16).to_be_bytes().to_vec();
        for annotation in annotations {
            b.extend_from_slice(&annotation);
        }
        encoded.push((name, b));
    }

    if !parameters.is_empty() {
        let name = pool.utf8("MethodParameters");
        let mut b = vec![parameters.len() as u8];
        for (name_idx, flags) in parameters {
            b.extend_from_slice(&name_idx.to_be_bytes());
            b.extend_from_slice(&flags.to_be_bytes());
        }
        encoded.push((name, b));
    }

    for (attr_name, types) in [
        ("RuntimeVisibleAnnotations", visible),
        ("RuntimeInvisibleAnnotations", invisible),
    ] {
        if types.is_empty() {
            continue;
        }
        let name = pool.utf8(attr_name);
        let mut b = (types.len() as u16).to_be_bytes().to_vec();
        for ty in types {
            b.extend_from_slice(&ty.to_be_bytes());
            b.extend_from_slice(&0u16.to_be_bytes());
        }
        encoded.push((name, b));
    }

    out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
    for (name, body) in encoded {
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
}
