use super::reader::ClassReader;
use crate::error::{ApiModelError, Result};
use crate::model::{ConstantValue, internal_to_qualified};

const SECTION: &str = "constant pool";

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    Other,
    Unusable,
}

impl Constant {
    fn describe(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::Other => "reference",
            Constant::Unusable => "unusable slot",
        }
    }
}

pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self> {
        let count = reader.read_u2(SECTION)? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1(SECTION)?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2(SECTION)? as usize;
                    let bytes = reader.read_slice(SECTION, length)?;
                    Constant::Utf8(decode_modified_utf8(bytes).ok_or_else(|| {
                        ApiModelError::malformed(format!(
                            "invalid modified UTF-8 in constant pool entry {index}"
                        ))
                    })?)
                }
                3 => Constant::Integer(reader.read_u4(SECTION)? as i32),
                4 => Constant::Float(f32::from_bits(reader.read_u4(SECTION)?)),
                5 | 6 => {
                    let bits = reader.read_u8(SECTION)?;
                    let value = if tag == 5 {
                        Constant::Long(bits as i64)
                    } else {
                        Constant::Double(f64::from_bits(bits))
                    };
                    // 8-byte constants occupy two slots.
                    entries.push(value);
                    index += 1;
                    Constant::Unusable
                }
                7 => Constant::Class {
                    name_index: reader.read_u2(SECTION)?,
                },
                8 => Constant::String {
                    string_index: reader.read_u2(SECTION)?,
                },
                9..=11 => {
                    reader.skip(SECTION, 4)?;
                    Constant::Other
                }
                12 => Constant::NameAndType {
                    name_index: reader.read_u2(SECTION)?,
                    descriptor_index: reader.read_u2(SECTION)?,
                },
                15 => {
                    reader.skip(SECTION, 3)?;
                    Constant::Other
                }
                16 | 19 | 20 => {
                    reader.skip(SECTION, 2)?;
                    Constant::Other
                }
                17 | 18 => {
                    reader.skip(SECTION, 4)?;
                    Constant::Other
                }
                other => {
                    return Err(ApiModelError::malformed(format!(
                        "unknown constant pool tag {other} at entry {index}"
                    )));
                }
            };

            entries.push(entry);
            index += 1;
        }

        // A trailing long/double can push one slot past the declared count.
        entries.truncate(count.max(1));
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant> {
        self.entries.get(index as usize).ok_or_else(|| {
            ApiModelError::malformed(format!("constant pool index {index} out of range"))
        })
    }

    fn mismatch(&self, index: u16, expected: &str) -> ApiModelError {
        let found = self
            .entries
            .get(index as usize)
            .map(Constant::describe)
            .unwrap_or("nothing");
        ApiModelError::malformed(format!(
            "constant pool entry {index} is {found}, expected {expected}"
        ))
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(self.mismatch(index, "Utf8")),
        }
    }

    /// Index 0 means "absent" wherever the format allows an optional name.
    pub(crate) fn optional_utf8(&self, index: u16) -> Result<Option<&str>> {
        if index == 0 {
            return Ok(None);
        }
        self.utf8(index).map(Some)
    }

    pub(crate) fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class { name_index } => Ok(internal_to_qualified(self.utf8(*name_index)?)),
            _ => Err(self.mismatch(index, "Class")),
        }
    }

    pub(crate) fn optional_class_name(&self, index: u16) -> Result<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    pub(crate) fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(self.mismatch(index, "NameAndType")),
        }
    }

    pub(crate) fn constant_value(&self, index: u16) -> Result<ConstantValue> {
        match self.get(index)? {
            Constant::Integer(v) => Ok(ConstantValue::Int(*v)),
            Constant::Float(v) => Ok(ConstantValue::Float(*v)),
            Constant::Long(v) => Ok(ConstantValue::Long(*v)),
            Constant::Double(v) => Ok(ConstantValue::Double(*v)),
            Constant::String { string_index } => {
                Ok(ConstantValue::String(self.utf8(*string_index)?.to_string()))
            }
            _ => Err(self.mismatch(index, "a constant value")),
        }
    }
}

/// Class files store strings in "modified" UTF-8: NUL is two bytes and
/// supplementary characters are encoded as surrogate pairs.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.is_ascii() && !bytes.contains(&0) {
        return String::from_utf8(bytes.to_vec()).ok();
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            if b == 0 {
                return None;
            }
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push(
                (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F),
            );
            i += 3;
        } else {
            return None;
        }
    }

    char::decode_utf16(units.iter().copied())
        .collect::<std::result::Result<String, _>>()
        .ok()
}
