//! Constant pool parsing.
//!
//! Works on the raw big-endian constant pool image returned by the host
//! (which is exactly the `constant_pool[]` slice of the class file format,
//! without the surrounding class file) and, for dynamically defined
//! classes, on whole class file images.

use thiserror::Error;

/// A `(name, descriptor)` pair resolved from a method reference entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub name: String,
    pub descriptor: String,
}

/// Any structural problem in a constant pool slice. Callers treat all
/// variants the same way: the probed callsite is never classified as
/// explicit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstantPoolError {
    #[error("truncated constant pool")]
    Truncated,

    #[error("unknown constant pool tag {0}")]
    UnknownTag(u8),

    #[error("constant pool index {0} out of range")]
    BadIndex(u16),

    #[error("constant pool entry {0} has unexpected kind")]
    WrongKind(u16),

    #[error("malformed UTF-8 in constant pool")]
    BadUtf8,

    #[error("not a class file")]
    NotAClassFile,
}

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u1(&mut self) -> Result<u8, ConstantPoolError> {
        let v = *self
            .data
            .get(self.pos)
            .ok_or(ConstantPoolError::Truncated)?;
        self.pos += 1;
        Ok(v)
    }

    fn read_u2(&mut self) -> Result<u16, ConstantPoolError> {
        if self.data.len() < self.pos + 2 {
            return Err(ConstantPoolError::Truncated);
        }
        let v = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn read_u4(&mut self) -> Result<u32, ConstantPoolError> {
        if self.data.len() < self.pos + 4 {
            return Err(ConstantPoolError::Truncated);
        }
        let v = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    fn skip(&mut self, n: usize) -> Result<(), ConstantPoolError> {
        if self.data.len() < self.pos + n {
            return Err(ConstantPoolError::Truncated);
        }
        self.pos += n;
        Ok(())
    }
}

/// Reader over a raw constant pool image.
#[derive(Debug)]
pub struct ConstantPool<'a> {
    data: &'a [u8],
    /// Byte offset of each entry (index 0 unused; Long/Double leave a hole).
    offsets: Vec<Option<usize>>,
}

impl<'a> ConstantPool<'a> {
    /// Scans `data` containing `count` constant pool entries (the count as
    /// reported by the host, i.e. highest valid index + 1).
    pub fn parse(data: &'a [u8], count: u16) -> Result<Self, ConstantPoolError> {
        let mut offsets = vec![None; count as usize];
        let mut reader = Reader::new(data);
        let mut index = 1u16;
        while index < count {
            offsets[index as usize] = Some(reader.pos);
            let tag = reader.read_u1()?;
            let wide = skip_entry(&mut reader, tag)?;
            index += if wide { 2 } else { 1 };
        }
        Ok(Self { data, offsets })
    }

    fn reader_at(&self, index: u16) -> Result<Reader<'a>, ConstantPoolError> {
        let offset = self
            .offsets
            .get(index as usize)
            .copied()
            .flatten()
            .ok_or(ConstantPoolError::BadIndex(index))?;
        Ok(Reader {
            data: self.data,
            pos: offset,
        })
    }

    /// Resolves a `Methodref` or `InterfaceMethodref` entry to its name and
    /// descriptor.
    pub fn read_method_ref(&self, index: u16) -> Result<MethodRef, ConstantPoolError> {
        let mut reader = self.reader_at(index)?;
        let tag = reader.read_u1()?;
        if tag != TAG_METHODREF && tag != TAG_INTERFACE_METHODREF {
            return Err(ConstantPoolError::WrongKind(index));
        }
        let _class_index = reader.read_u2()?;
        let name_and_type_index = reader.read_u2()?;

        let mut nat = self.reader_at(name_and_type_index)?;
        if nat.read_u1()? != TAG_NAME_AND_TYPE {
            return Err(ConstantPoolError::WrongKind(name_and_type_index));
        }
        let name_index = nat.read_u2()?;
        let descriptor_index = nat.read_u2()?;

        Ok(MethodRef {
            name: self.read_utf8(name_index)?,
            descriptor: self.read_utf8(descriptor_index)?,
        })
    }

    /// Resolves a `Class` entry to its internal name.
    pub fn read_class_name(&self, index: u16) -> Result<String, ConstantPoolError> {
        let mut reader = self.reader_at(index)?;
        if reader.read_u1()? != TAG_CLASS {
            return Err(ConstantPoolError::WrongKind(index));
        }
        let name_index = reader.read_u2()?;
        self.read_utf8(name_index)
    }

    fn read_utf8(&self, index: u16) -> Result<String, ConstantPoolError> {
        let mut reader = self.reader_at(index)?;
        if reader.read_u1()? != TAG_UTF8 {
            return Err(ConstantPoolError::WrongKind(index));
        }
        let len = reader.read_u2()? as usize;
        if self.data.len() < reader.pos + len {
            return Err(ConstantPoolError::Truncated);
        }
        let bytes = &self.data[reader.pos..reader.pos + len];
        // Modified UTF-8 differs from UTF-8 only for supplementary
        // characters and embedded NUL; member names never contain either.
        String::from_utf8(bytes.to_vec()).map_err(|_| ConstantPoolError::BadUtf8)
    }
}

/// Advances past one entry; returns true for the two-slot kinds.
fn skip_entry(reader: &mut Reader<'_>, tag: u8) -> Result<bool, ConstantPoolError> {
    match tag {
        TAG_UTF8 => {
            let len = reader.read_u2()? as usize;
            reader.skip(len)?;
            Ok(false)
        }
        TAG_INTEGER | TAG_FLOAT => {
            reader.skip(4)?;
            Ok(false)
        }
        TAG_LONG | TAG_DOUBLE => {
            reader.skip(8)?;
            Ok(true)
        }
        TAG_CLASS | TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
            reader.skip(2)?;
            Ok(false)
        }
        TAG_FIELDREF | TAG_METHODREF | TAG_INTERFACE_METHODREF | TAG_NAME_AND_TYPE
        | TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
            reader.skip(4)?;
            Ok(false)
        }
        TAG_METHOD_HANDLE => {
            reader.skip(3)?;
            Ok(false)
        }
        other => Err(ConstantPoolError::UnknownTag(other)),
    }
}

/// Extracts the internal class name from a whole class file image.
///
/// Used when a class is defined without a name and the only source of the
/// name is the `this_class` entry of the bytes being defined.
pub fn class_name_from_bytes(class_file: &[u8]) -> Result<String, ConstantPoolError> {
    let mut reader = Reader::new(class_file);
    if reader.read_u4().map_err(|_| ConstantPoolError::NotAClassFile)? != 0xCAFE_BABE {
        return Err(ConstantPoolError::NotAClassFile);
    }
    reader.skip(4)?; // minor, major
    let count = reader.read_u2()?;
    let pool_start = reader.pos;

    let pool = ConstantPool::parse(&class_file[pool_start..], count)?;
    // Re-walk to find where the pool ends so we can read what follows it.
    let mut index = 1u16;
    let mut tail = Reader::new(&class_file[pool_start..]);
    while index < count {
        let tag = tail.read_u1()?;
        let wide = skip_entry(&mut tail, tag)?;
        index += if wide { 2 } else { 1 };
    }
    let mut rest = Reader::new(class_file);
    rest.skip(pool_start + tail.pos)?;
    rest.skip(2)?; // access_flags
    let this_class = rest.read_u2()?;
    pool.read_class_name(this_class)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Entries are built by hand; index bookkeeping matches the builder in
    // the integration tests.
    fn utf8(pool: &mut Vec<u8>, s: &str) {
        pool.push(TAG_UTF8);
        pool.extend_from_slice(&(s.len() as u16).to_be_bytes());
        pool.extend_from_slice(s.as_bytes());
    }

    fn name_and_type(pool: &mut Vec<u8>, name: u16, descriptor: u16) {
        pool.push(TAG_NAME_AND_TYPE);
        pool.extend_from_slice(&name.to_be_bytes());
        pool.extend_from_slice(&descriptor.to_be_bytes());
    }

    fn method_ref(pool: &mut Vec<u8>, class: u16, name_and_type: u16) {
        pool.push(TAG_METHODREF);
        pool.extend_from_slice(&class.to_be_bytes());
        pool.extend_from_slice(&name_and_type.to_be_bytes());
    }

    fn class(pool: &mut Vec<u8>, name: u16) {
        pool.push(TAG_CLASS);
        pool.extend_from_slice(&name.to_be_bytes());
    }

    #[test]
    fn test_resolves_method_ref() {
        let mut pool = Vec::new();
        utf8(&mut pool, "loadClass"); // 1
        utf8(&mut pool, "(Ljava/lang/String;)Ljava/lang/Class;"); // 2
        utf8(&mut pool, "java/lang/ClassLoader"); // 3
        class(&mut pool, 3); // 4
        name_and_type(&mut pool, 1, 2); // 5
        method_ref(&mut pool, 4, 5); // 6

        let cp = ConstantPool::parse(&pool, 7).unwrap();
        let method = cp.read_method_ref(6).unwrap();
        assert_eq!(method.name, "loadClass");
        assert_eq!(method.descriptor, "(Ljava/lang/String;)Ljava/lang/Class;");
    }

    #[test]
    fn test_long_entries_occupy_two_slots() {
        let mut pool = Vec::new();
        pool.push(TAG_LONG); // 1 (and phantom 2)
        pool.extend_from_slice(&42u64.to_be_bytes());
        utf8(&mut pool, "x"); // 3
        utf8(&mut pool, "()V"); // 4
        name_and_type(&mut pool, 3, 4); // 5
        class(&mut pool, 3); // 6
        method_ref(&mut pool, 6, 5); // 7

        let cp = ConstantPool::parse(&pool, 8).unwrap();
        let method = cp.read_method_ref(7).unwrap();
        assert_eq!(method.name, "x");
        // The phantom second slot of the Long must not resolve.
        assert_eq!(
            cp.read_method_ref(2),
            Err(ConstantPoolError::BadIndex(2))
        );
    }

    #[test]
    fn test_non_method_ref_target_is_rejected() {
        let mut pool = Vec::new();
        utf8(&mut pool, "java/lang/Object"); // 1
        class(&mut pool, 1); // 2

        let cp = ConstantPool::parse(&pool, 3).unwrap();
        assert_eq!(cp.read_method_ref(2), Err(ConstantPoolError::WrongKind(2)));
        assert_eq!(cp.read_method_ref(9), Err(ConstantPoolError::BadIndex(9)));
    }

    #[test]
    fn test_truncated_pool_fails_parse() {
        let mut pool = Vec::new();
        pool.push(TAG_UTF8);
        pool.extend_from_slice(&100u16.to_be_bytes()); // length beyond the slice
        assert_eq!(
            ConstantPool::parse(&pool, 2).unwrap_err(),
            ConstantPoolError::Truncated
        );
    }

    #[test]
    fn test_unknown_tag_fails_parse() {
        let pool = vec![99u8, 0, 0];
        assert_eq!(
            ConstantPool::parse(&pool, 2).unwrap_err(),
            ConstantPoolError::UnknownTag(99)
        );
    }

    #[test]
    fn test_class_name_from_bytes() {
        let mut pool = Vec::new();
        utf8(&mut pool, "com/example/Generated$Proxy7"); // 1
        class(&mut pool, 1); // 2

        let mut file = Vec::new();
        file.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        file.extend_from_slice(&0u16.to_be_bytes()); // minor
        file.extend_from_slice(&52u16.to_be_bytes()); // major
        file.extend_from_slice(&3u16.to_be_bytes()); // cp count
        file.extend_from_slice(&pool);
        file.extend_from_slice(&0x0021u16.to_be_bytes()); // access flags
        file.extend_from_slice(&2u16.to_be_bytes()); // this_class
        file.extend_from_slice(&0u16.to_be_bytes()); // super_class

        assert_eq!(
            class_name_from_bytes(&file).unwrap(),
            "com/example/Generated$Proxy7"
        );
    }

    #[test]
    fn test_not_a_class_file() {
        assert_eq!(
            class_name_from_bytes(&[0, 1, 2, 3, 4, 5, 6, 7]),
            Err(ConstantPoolError::NotAClassFile)
        );
    }
}
