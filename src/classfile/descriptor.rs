//! Field and method descriptors rendered as source-level type names.
//!
//! `Ljava/lang/String;` becomes `java.lang.String`, `[[I` becomes `int[][]`
//! and `(IJ)V` becomes parameters `[int, long]` returning `void`.

use crate::error::{ApiModelError, Result};

pub(crate) fn parse_field_descriptor(descriptor: &str) -> Result<String> {
    let mut parser = DescriptorParser::new(descriptor);
    let ty = parser.parse_type()?;
    if parser.remaining() != 0 {
        return Err(invalid(descriptor, "trailing characters"));
    }
    Ok(ty)
}

pub(crate) fn parse_method_descriptor(descriptor: &str) -> Result<(Vec<String>, String)> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while parser.peek()? != b')' {
        parameters.push(parser.parse_type()?);
    }
    parser.expect(b')')?;
    let return_type = if parser.peek()? == b'V' {
        parser.pos += 1;
        "void".to_string()
    } else {
        parser.parse_type()?
    };
    if parser.remaining() != 0 {
        return Err(invalid(descriptor, "trailing characters"));
    }
    Ok((parameters, return_type))
}

fn invalid(descriptor: &str, reason: &str) -> ApiModelError {
    ApiModelError::malformed(format!("invalid descriptor {descriptor:?}: {reason}"))
}

struct DescriptorParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.text.len().saturating_sub(self.pos)
    }

    fn peek(&self) -> Result<u8> {
        self.text
            .as_bytes()
            .get(self.pos)
            .copied()
            .ok_or_else(|| invalid(self.text, "unexpected end"))
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        if self.peek()? != ch {
            return Err(invalid(self.text, &format!("expected '{}'", ch as char)));
        }
        self.pos += 1;
        Ok(())
    }

    fn parse_type(&mut self) -> Result<String> {
        let tag = self.peek()?;
        let primitive = match tag {
            b'B' => "byte",
            b'C' => "char",
            b'D' => "double",
            b'F' => "float",
            b'I' => "int",
            b'J' => "long",
            b'S' => "short",
            b'Z' => "boolean",
            b'L' => return self.parse_reference_type(),
            b'[' => return self.parse_array_type(),
            other => {
                return Err(invalid(
                    self.text,
                    &format!("unexpected tag '{}'", other as char),
                ));
            }
        };
        self.pos += 1;
        Ok(primitive.to_string())
    }

    fn parse_reference_type(&mut self) -> Result<String> {
        self.expect(b'L')?;
        let rest = &self.text[self.pos..];
        let end = rest
            .find(';')
            .ok_or_else(|| invalid(self.text, "unterminated reference type"))?;
        if end == 0 {
            return Err(invalid(self.text, "empty class name"));
        }
        let name = rest[..end].replace('/', ".");
        self.pos += end + 1;
        Ok(name)
    }

    fn parse_array_type(&mut self) -> Result<String> {
        let mut dimensions = 0;
        while self.remaining() > 0 && self.peek()? == b'[' {
            dimensions += 1;
            self.pos += 1;
        }
        let mut element = self.parse_type()?;
        for _ in 0..dimensions {
            element.push_str("[]");
        }
        Ok(element)
    }
}
