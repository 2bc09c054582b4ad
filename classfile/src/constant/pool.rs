use crate::constant::ConstantInfo;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

/// The raw constant pool as stored in the class file. Indexing is 1-based;
/// slot 0 is reserved and holds `Unused`.
#[derive(Debug)]
pub struct ConstantPool {
    pub inner: Vec<ConstantInfo>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader) -> Result<Self, ClassFileError> {
        let count = reader.read_u16()?;
        let mut inner = Vec::with_capacity(count as usize);
        inner.push(ConstantInfo::Unused);

        let mut index = 1u16;
        while index < count {
            let entry = ConstantInfo::parse(reader, index)?;
            let wide = entry.is_wide();
            inner.push(entry);
            index += 1;
            if wide {
                inner.push(ConstantInfo::Unused);
                index += 1;
            }
        }
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&ConstantInfo, ClassFileError> {
        self.inner
            .get(index as usize)
            .ok_or(ClassFileError::BadPoolIndex(index))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            ConstantInfo::Utf8(value) => Ok(value),
            other => Err(ClassFileError::PoolTagMismatch {
                index,
                expected: "Utf8",
                actual: other.tag_name(),
            }),
        }
    }

    /// Resolves a `Class` entry to its slash-form name.
    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            ConstantInfo::Class(name_index) => self.utf8(*name_index),
            other => Err(ClassFileError::PoolTagMismatch {
                index,
                expected: "Class",
                actual: other.tag_name(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pool_bytes(entries: &[&[u8]]) -> Vec<u8> {
        // count is entries + 1 and wide entries consume an extra slot
        let mut slots = 1u16;
        for e in entries {
            slots += 1;
            if e[0] == ConstantInfo::TAG_LONG || e[0] == ConstantInfo::TAG_DOUBLE {
                slots += 1;
            }
        }
        let mut out = slots.to_be_bytes().to_vec();
        for e in entries {
            out.extend_from_slice(e);
        }
        out
    }

    #[test]
    fn slot_zero_is_reserved() {
        let data = pool_bytes(&[&[ConstantInfo::TAG_INTEGER, 0, 0, 0, 7]]);
        let mut r = ClassReader::new(&data);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert_eq!(pool.get(0).unwrap(), &ConstantInfo::Unused);
        assert_eq!(pool.get(1).unwrap(), &ConstantInfo::Integer(7));
    }

    #[test]
    fn long_occupies_two_slots() {
        let long_entry = {
            let mut e = vec![ConstantInfo::TAG_LONG];
            e.extend_from_slice(&42i64.to_be_bytes());
            e
        };
        let data = pool_bytes(&[&long_entry, &[ConstantInfo::TAG_INTEGER, 0, 0, 0, 1]]);
        let mut r = ClassReader::new(&data);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert_eq!(pool.get(1).unwrap(), &ConstantInfo::Long(42));
        assert_eq!(pool.get(2).unwrap(), &ConstantInfo::Unused);
        assert_eq!(pool.get(3).unwrap(), &ConstantInfo::Integer(1));
    }

    #[test]
    fn utf8_round_trips_through_class_entry() {
        let name = b"java/lang/Object";
        let mut utf8 = vec![ConstantInfo::TAG_UTF8];
        utf8.extend_from_slice(&(name.len() as u16).to_be_bytes());
        utf8.extend_from_slice(name);
        let data = pool_bytes(&[&utf8, &[ConstantInfo::TAG_CLASS, 0, 1]]);
        let mut r = ClassReader::new(&data);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert_eq!(pool.class_name(2).unwrap(), "java/lang/Object");
    }

    #[test]
    fn tag_mismatch_is_reported() {
        let data = pool_bytes(&[&[ConstantInfo::TAG_INTEGER, 0, 0, 0, 7]]);
        let mut r = ClassReader::new(&data);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert!(matches!(
            pool.utf8(1),
            Err(ClassFileError::PoolTagMismatch { .. })
        ));
    }
}
