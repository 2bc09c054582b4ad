use crate::error::ClassFileError;
use byteorder::{BigEndian, ByteOrder};

/// Forward-only big-endian cursor over a class file byte slice.
pub struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        if self.remaining() < n {
            return Err(ClassFileError::UnexpectedEof {
                offset: self.pos,
                wanted: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ClassFileError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ClassFileError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ClassFileError> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    pub fn read_i8(&mut self) -> Result<i8, ClassFileError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16, ClassFileError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32, ClassFileError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, ClassFileError> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32, ClassFileError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ClassFileError> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
        let mut r = ClassReader::new(&data);
        assert_eq!(r.read_u32().unwrap(), 0xCAFE_BABE);
        assert_eq!(r.read_u16().unwrap(), 0x34);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn eof_is_an_error() {
        let mut r = ClassReader::new(&[0x01]);
        assert_eq!(r.read_u8().unwrap(), 1);
        assert!(matches!(
            r.read_u16(),
            Err(ClassFileError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn bulk_read_advances_cursor() {
        let data = [1u8, 2, 3, 4, 5];
        let mut r = ClassReader::new(&data);
        assert_eq!(r.read_bytes(3).unwrap(), &[1, 2, 3]);
        assert_eq!(r.position(), 3);
        assert_eq!(r.read_u16().unwrap(), 0x0405);
    }
}
