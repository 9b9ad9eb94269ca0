use aotrace_agent::constant_pool::{class_name_from_bytes, ConstantPool, ConstantPoolError};

/// Builds raw constant pool images entry by entry, returning the index
/// assigned to each pushed entry.
struct PoolBuilder {
    bytes: Vec<u8>,
    next_index: u16,
}

impl PoolBuilder {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next_index: 1,
        }
    }

    fn utf8(&mut self, s: &str) -> u16 {
        self.bytes.push(1);
        self.bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        self.bump(1)
    }

    fn class(&mut self, name_index: u16) -> u16 {
        self.bytes.push(7);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        self.bump(1)
    }

    fn string(&mut self, utf8_index: u16) -> u16 {
        self.bytes.push(8);
        self.bytes.extend_from_slice(&utf8_index.to_be_bytes());
        self.bump(1)
    }

    fn long(&mut self, value: i64) -> u16 {
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self.bump(2)
    }

    fn name_and_type(&mut self, name_index: u16, descriptor_index: u16) -> u16 {
        self.bytes.push(12);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        self.bytes.extend_from_slice(&descriptor_index.to_be_bytes());
        self.bump(1)
    }

    fn method_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        self.bytes.push(10);
        self.bytes.extend_from_slice(&class_index.to_be_bytes());
        self.bytes
            .extend_from_slice(&name_and_type_index.to_be_bytes());
        self.bump(1)
    }

    fn interface_method_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        self.bytes.push(11);
        self.bytes.extend_from_slice(&class_index.to_be_bytes());
        self.bytes
            .extend_from_slice(&name_and_type_index.to_be_bytes());
        self.bump(1)
    }

    fn field_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        self.bytes.push(9);
        self.bytes.extend_from_slice(&class_index.to_be_bytes());
        self.bytes
            .extend_from_slice(&name_and_type_index.to_be_bytes());
        self.bump(1)
    }

    fn bump(&mut self, slots: u16) -> u16 {
        let index = self.next_index;
        self.next_index += slots;
        index
    }

    fn count(&self) -> u16 {
        self.next_index
    }
}

#[test]
fn resolves_load_class_site_reference() {
    let mut b = PoolBuilder::new();
    let name = b.utf8("loadClass");
    let descriptor = b.utf8("(Ljava/lang/String;)Ljava/lang/Class;");
    let owner_name = b.utf8("java/lang/ClassLoader");
    let owner = b.class(owner_name);
    let nat = b.name_and_type(name, descriptor);
    let site = b.method_ref(owner, nat);

    let pool = ConstantPool::parse(&b.bytes, b.count()).unwrap();
    let method = pool.read_method_ref(site).unwrap();
    assert_eq!(method.name, "loadClass");
    assert_eq!(method.descriptor, "(Ljava/lang/String;)Ljava/lang/Class;");
}

#[test]
fn resolves_interface_method_references() {
    let mut b = PoolBuilder::new();
    let name = b.utf8("run");
    let descriptor = b.utf8("()V");
    let owner_name = b.utf8("java/lang/Runnable");
    let owner = b.class(owner_name);
    let nat = b.name_and_type(name, descriptor);
    let site = b.interface_method_ref(owner, nat);

    let pool = ConstantPool::parse(&b.bytes, b.count()).unwrap();
    let method = pool.read_method_ref(site).unwrap();
    assert_eq!(method.name, "run");
    assert_eq!(method.descriptor, "()V");
}

#[test]
fn rejects_field_references_at_probed_index() {
    let mut b = PoolBuilder::new();
    let name = b.utf8("value");
    let descriptor = b.utf8("I");
    let owner_name = b.utf8("Counter");
    let owner = b.class(owner_name);
    let nat = b.name_and_type(name, descriptor);
    let site = b.field_ref(owner, nat);

    let pool = ConstantPool::parse(&b.bytes, b.count()).unwrap();
    assert_eq!(
        pool.read_method_ref(site),
        Err(ConstantPoolError::WrongKind(site))
    );
}

#[test]
fn survives_wide_entries_and_interleaved_constants() {
    let mut b = PoolBuilder::new();
    let padding = b.utf8("irrelevant");
    let _ = b.string(padding);
    let _ = b.long(0x1122_3344_5566_7788);
    let name = b.utf8("loadClass");
    let descriptor = b.utf8("(Ljava/lang/String;)Ljava/lang/Class;");
    let owner_name = b.utf8("custom/Loader");
    let owner = b.class(owner_name);
    let nat = b.name_and_type(name, descriptor);
    let site = b.method_ref(owner, nat);

    let pool = ConstantPool::parse(&b.bytes, b.count()).unwrap();
    let method = pool.read_method_ref(site).unwrap();
    assert_eq!(method.name, "loadClass");
}

#[test]
fn out_of_range_index_is_reported() {
    let mut b = PoolBuilder::new();
    b.utf8("x");
    let pool = ConstantPool::parse(&b.bytes, b.count()).unwrap();
    assert_eq!(
        pool.read_method_ref(40),
        Err(ConstantPoolError::BadIndex(40))
    );
}

#[test]
fn extracts_defined_class_name_from_class_file() {
    let mut b = PoolBuilder::new();
    let name = b.utf8("jdk/proxy1/$Proxy3");
    let this_class = b.class(name);

    let mut file = Vec::new();
    file.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    file.extend_from_slice(&0u16.to_be_bytes());
    file.extend_from_slice(&61u16.to_be_bytes());
    file.extend_from_slice(&b.count().to_be_bytes());
    file.extend_from_slice(&b.bytes);
    file.extend_from_slice(&0x0031u16.to_be_bytes());
    file.extend_from_slice(&this_class.to_be_bytes());
    file.extend_from_slice(&0u16.to_be_bytes());

    assert_eq!(class_name_from_bytes(&file).unwrap(), "jdk/proxy1/$Proxy3");
}
