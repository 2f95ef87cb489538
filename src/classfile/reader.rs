use crate::error::{ApiModelError, Result};

/// Big-endian cursor over a class file. Every read names the section it
/// belongs to so an overrun reports where the file was cut short.
pub(crate) struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn ensure(&self, section: &'static str, needed: usize) -> Result<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ApiModelError::TruncatedBinaryUnit {
                section,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub(crate) fn read_u1(&mut self, section: &'static str) -> Result<u8> {
        self.ensure(section, 1)?;
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub(crate) fn read_u2(&mut self, section: &'static str) -> Result<u16> {
        self.ensure(section, 2)?;
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub(crate) fn read_u4(&mut self, section: &'static str) -> Result<u32> {
        self.ensure(section, 4)?;
        let value = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(value)
    }

    pub(crate) fn read_u8(&mut self, section: &'static str) -> Result<u64> {
        let high = u64::from(self.read_u4(section)?);
        let low = u64::from(self.read_u4(section)?);
        Ok((high << 32) | low)
    }

    pub(crate) fn read_slice(&mut self, section: &'static str, len: usize) -> Result<&'a [u8]> {
        self.ensure(section, len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, section: &'static str, len: usize) -> Result<()> {
        self.ensure(section, len)?;
        self.pos += len;
        Ok(())
    }
}
