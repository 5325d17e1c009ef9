use nom::{
    IResult,
    number::complete::{be_u16, be_u32, be_u64, u8 as parse_u8},
};

use crate::error::{ClassFormatError, Result};

type NomError<'a> = nom::error::Error<&'a [u8]>;

/// Forward-only, bounds-checked big-endian cursor over a class file.
///
/// The `*_unchecked` reads are only for use right after an [`ClassReader::ensure`]
/// that covers the whole record. They panic instead of reading past the end.
/// After any error the reader must be abandoned.
pub struct ClassReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_eos(&self) -> bool {
        self.remaining() == 0
    }

    pub fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(ClassFormatError::Truncated {
                offset: self.position,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Unread bytes, starting at the cursor.
    pub fn buffer(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn skip(&mut self, size: usize) -> Result<()> {
        self.ensure(size)?;
        self.skip_unchecked(size);
        Ok(())
    }

    pub fn skip_unchecked(&mut self, size: usize) {
        assert!(
            size <= self.remaining(),
            "unchecked skip of {size} bytes at offset {}",
            self.position
        );
        self.position += size;
    }

    pub fn read_bytes(&mut self, size: usize) -> Result<&'a [u8]> {
        self.ensure(size)?;
        let bytes = &self.buffer()[..size];
        self.position += size;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.read_u8_unchecked())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.read_u16_unchecked())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.read_u32_unchecked())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.read_u64_unchecked())
    }

    pub fn read_u8_unchecked(&mut self) -> u8 {
        self.decode(parse_u8::<&'a [u8], NomError<'a>>)
    }

    pub fn read_u16_unchecked(&mut self) -> u16 {
        self.decode(be_u16::<&'a [u8], NomError<'a>>)
    }

    pub fn read_u32_unchecked(&mut self) -> u32 {
        self.decode(be_u32::<&'a [u8], NomError<'a>>)
    }

    pub fn read_u64_unchecked(&mut self) -> u64 {
        self.decode(be_u64::<&'a [u8], NomError<'a>>)
    }

    fn decode<T>(&mut self, parser: fn(&'a [u8]) -> IResult<&'a [u8], T, NomError<'a>>) -> T {
        match parser(self.buffer()) {
            Ok((rest, value)) => {
                self.position = self.data.len() - rest.len();
                value
            }
            Err(_) => panic!("unchecked read past end of class file at offset {}", self.position),
        }
    }
}
