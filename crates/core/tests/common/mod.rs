//! Synthesized managed PE images for tests.
//!
//! `ModuleBuilder` writes just enough of an ECMA-335 image (DOS/PE headers,
//! one section holding the CLI header and metadata) for the reader to treat it
//! as a real module.
#![allow(dead_code)]

use std::collections::HashMap;

pub const ECMA_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];
pub const MICROSOFT_TOKEN: [u8; 8] = [0xb0, 0x3f, 0x5f, 0x7f, 0x11, 0xd5, 0x0a, 0x3a];
pub const NETSTANDARD_TOKEN: [u8; 8] = [0xcc, 0x7b, 0x13, 0xff, 0xcd, 0x2d, 0xdd, 0x51];
/// The ECMA standard public key; hashes to [`ECMA_TOKEN`].
pub const ECMA_KEY: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];

/// Signature element types.
pub mod sig {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const I4: u8 = 0x08;
    pub const STRING: u8 = 0x0E;
    pub const OBJECT: u8 = 0x1C;
    pub const CLASS: u8 = 0x12;
    pub const VALUETYPE: u8 = 0x11;
    pub const GENERICINST: u8 = 0x15;
    pub const VAR: u8 = 0x13;
    pub const MVAR: u8 = 0x1E;
    pub const SZARRAY: u8 = 0x1D;

    pub const DEFAULT: u8 = 0x00;
    pub const HASTHIS: u8 = 0x20;
    pub const GENERIC: u8 = 0x10;
    pub const FIELD: u8 = 0x06;

    /// `CLASS` reference to a TypeRef row.
    pub fn class(type_ref: u32) -> Vec<u8> {
        vec![CLASS, type_def_or_ref(type_ref, 1)]
    }

    pub fn type_def_or_ref(rid: u32, tag: u32) -> u8 {
        let encoded = (rid << 2) | tag;
        assert!(encoded < 0x80, "fixture only encodes single-byte tokens");
        encoded as u8
    }

    /// Method signature with the given calling convention byte.
    pub fn method(conv: u8, ret: &[u8], params: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![conv, params.len() as u8];
        out.extend_from_slice(ret);
        for p in params {
            out.extend_from_slice(p);
        }
        out
    }

    pub fn generic_method(arity: u8, ret: &[u8], params: &[&[u8]]) -> Vec<u8> {
        let mut out = vec![GENERIC | HASTHIS, arity, params.len() as u8];
        out.extend_from_slice(ret);
        for p in params {
            out.extend_from_slice(p);
        }
        out
    }

    pub fn field(ty: &[u8]) -> Vec<u8> {
        let mut out = vec![FIELD];
        out.extend_from_slice(ty);
        out
    }
}

/// Declaring type of a MemberRef row.
#[derive(Debug, Clone, Copy)]
pub enum Parent {
    TypeDef(u32),
    TypeRef(u32),
    TypeSpec(u32),
}

impl Parent {
    fn coded(self) -> u32 {
        match self {
            Parent::TypeDef(rid) => rid << 3,
            Parent::TypeRef(rid) => (rid << 3) | 1,
            Parent::TypeSpec(rid) => (rid << 3) | 4,
        }
    }
}

struct AssemblyRow {
    version: [u16; 4],
    flags: u32,
    key: u32,
    name: u32,
    culture: u32,
}

#[derive(Default)]
pub struct ModuleBuilder {
    strings: Vec<u8>,
    interned: HashMap<String, u32>,
    blobs: Vec<u8>,
    module_name: u32,
    assembly: Option<AssemblyRow>,
    assembly_refs: Vec<AssemblyRow>,
    /// (resolution scope coded index, name, namespace)
    type_refs: Vec<(u32, u32, u32)>,
    /// (name, namespace)
    type_defs: Vec<(u32, u32)>,
    type_specs: Vec<u32>,
    /// (parent coded index, name, signature)
    member_refs: Vec<(u32, u32, u32)>,
    nested: Vec<(u32, u32)>,
}

impl ModuleBuilder {
    pub fn new(module_name: &str) -> Self {
        let mut builder = Self { strings: vec![0], blobs: vec![0], ..Self::default() };
        builder.module_name = builder.string(module_name);
        builder
    }

    /// Library module that defines assembly `name` (no public key).
    pub fn library(module_name: &str, name: &str, version: [u16; 4]) -> Self {
        let mut builder = Self::new(module_name);
        let name = builder.string(name);
        builder.assembly = Some(AssemblyRow { version, flags: 0, key: 0, name, culture: 0 });
        builder
    }

    pub fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(offset) = self.interned.get(value) {
            return *offset;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        self.interned.insert(value.to_string(), offset);
        offset
    }

    pub fn blob(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return 0;
        }
        let offset = self.blobs.len() as u32;
        let len = data.len();
        if len < 0x80 {
            self.blobs.push(len as u8);
        } else {
            assert!(len < 0x4000, "fixture blob too large");
            self.blobs.push(0x80 | (len >> 8) as u8);
            self.blobs.push(len as u8);
        }
        self.blobs.extend_from_slice(data);
        offset
    }

    /// AssemblyRef carrying an 8-byte token; returns its rid.
    pub fn assembly_ref(&mut self, name: &str, version: [u16; 4], token: &[u8]) -> u32 {
        let key = self.blob(token);
        let name = self.string(name);
        self.assembly_refs.push(AssemblyRow { version, flags: 0, key, name, culture: 0 });
        self.assembly_refs.len() as u32
    }

    /// AssemblyRef carrying the full public key (flag 0x0001).
    pub fn assembly_ref_with_key(&mut self, name: &str, version: [u16; 4], key: &[u8]) -> u32 {
        let key = self.blob(key);
        let name = self.string(name);
        self.assembly_refs.push(AssemblyRow { version, flags: 1, key, name, culture: 0 });
        self.assembly_refs.len() as u32
    }

    pub fn type_ref(&mut self, assembly_ref: u32, namespace: &str, name: &str) -> u32 {
        let scope = (assembly_ref << 2) | 2;
        let (name, namespace) = (self.string(name), self.string(namespace));
        self.type_refs.push((scope, name, namespace));
        self.type_refs.len() as u32
    }

    pub fn nested_type_ref(&mut self, enclosing: u32, name: &str) -> u32 {
        let scope = (enclosing << 2) | 3;
        let name = self.string(name);
        self.type_refs.push((scope, name, 0));
        self.type_refs.len() as u32
    }

    pub fn type_def(&mut self, namespace: &str, name: &str) -> u32 {
        let (name, namespace) = (self.string(name), self.string(namespace));
        self.type_defs.push((name, namespace));
        self.type_defs.len() as u32
    }

    pub fn nest(&mut self, nested: u32, enclosing: u32) {
        self.nested.push((nested, enclosing));
    }

    /// `GENERICINST CLASS <type_ref> <args...>` type spec.
    pub fn generic_instance(&mut self, type_ref: u32, args: &[&[u8]]) -> u32 {
        let mut blob =
            vec![sig::GENERICINST, sig::CLASS, sig::type_def_or_ref(type_ref, 1), args.len() as u8];
        for arg in args {
            blob.extend_from_slice(arg);
        }
        self.type_spec(&blob)
    }

    pub fn type_spec(&mut self, blob: &[u8]) -> u32 {
        let blob = self.blob(blob);
        self.type_specs.push(blob);
        self.type_specs.len() as u32
    }

    pub fn member_ref(&mut self, parent: Parent, name: &str, signature: &[u8]) -> u32 {
        let (name, signature) = (self.string(name), self.blob(signature));
        self.member_refs.push((parent.coded(), name, signature));
        self.member_refs.len() as u32
    }

    /// The `#~` stream.
    fn tables(&self) -> Vec<u8> {
        let counts: [(usize, usize); 8] = [
            (0x00, 1),
            (0x01, self.type_refs.len()),
            (0x02, self.type_defs.len()),
            (0x0A, self.member_refs.len()),
            (0x1B, self.type_specs.len()),
            (0x20, usize::from(self.assembly.is_some())),
            (0x23, self.assembly_refs.len()),
            (0x29, self.nested.len()),
        ];
        let mut valid = 0u64;
        for (table, count) in counts {
            if count > 0 {
                valid |= 1 << table;
            }
        }

        let mut out = Vec::new();
        put_u32(&mut out, 0);
        out.extend_from_slice(&[2, 0, 0, 1]);
        out.extend_from_slice(&valid.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        for (_, count) in counts {
            if count > 0 {
                put_u32(&mut out, count as u32);
            }
        }

        // Module: generation, name, mvid, encid, encbaseid
        put_u16(&mut out, 0);
        put_u16(&mut out, self.module_name as u16);
        out.extend_from_slice(&[0; 6]);

        for (scope, name, namespace) in &self.type_refs {
            put_u16(&mut out, *scope as u16);
            put_u16(&mut out, *name as u16);
            put_u16(&mut out, *namespace as u16);
        }
        for (name, namespace) in &self.type_defs {
            put_u32(&mut out, 0x0010_0001);
            put_u16(&mut out, *name as u16);
            put_u16(&mut out, *namespace as u16);
            put_u16(&mut out, 0);
            put_u16(&mut out, 1);
            put_u16(&mut out, 1);
        }
        for (parent, name, signature) in &self.member_refs {
            put_u16(&mut out, *parent as u16);
            put_u16(&mut out, *name as u16);
            put_u16(&mut out, *signature as u16);
        }
        for blob in &self.type_specs {
            put_u16(&mut out, *blob as u16);
        }
        if let Some(assembly) = &self.assembly {
            put_u32(&mut out, 0x8004);
            for part in assembly.version {
                put_u16(&mut out, part);
            }
            put_u32(&mut out, assembly.flags);
            put_u16(&mut out, assembly.key as u16);
            put_u16(&mut out, assembly.name as u16);
            put_u16(&mut out, assembly.culture as u16);
        }
        for row in &self.assembly_refs {
            for part in row.version {
                put_u16(&mut out, part);
            }
            put_u32(&mut out, row.flags);
            put_u16(&mut out, row.key as u16);
            put_u16(&mut out, row.name as u16);
            put_u16(&mut out, row.culture as u16);
            put_u16(&mut out, 0);
        }
        for (nested, enclosing) in &self.nested {
            put_u16(&mut out, *nested as u16);
            put_u16(&mut out, *enclosing as u16);
        }
        out
    }

    /// Metadata root plus streams.
    pub fn metadata(&self) -> Vec<u8> {
        assert!(self.strings.len() < 0x10000 && self.blobs.len() < 0x10000);
        let streams: [(&[u8], Vec<u8>); 3] = [
            (b"#~", pad4(self.tables())),
            (b"#Strings", pad4(self.strings.clone())),
            (b"#Blob", pad4(self.blobs.clone())),
        ];
        let version = b"v4.0.30319\0\0";
        let header_len: usize = 16
            + version.len()
            + 4
            + streams.iter().map(|(name, _)| 8 + ((name.len() + 4) & !3)).sum::<usize>();

        let mut out = Vec::new();
        put_u32(&mut out, 0x424A_5342);
        put_u16(&mut out, 1);
        put_u16(&mut out, 1);
        put_u32(&mut out, 0);
        put_u32(&mut out, version.len() as u32);
        out.extend_from_slice(version);
        put_u16(&mut out, 0);
        put_u16(&mut out, streams.len() as u16);

        let mut offset = header_len;
        for (name, body) in &streams {
            put_u32(&mut out, offset as u32);
            put_u32(&mut out, body.len() as u32);
            let mut padded = name.to_vec();
            padded.resize((name.len() + 4) & !3, 0);
            out.extend_from_slice(&padded);
            offset += body.len();
        }
        assert_eq!(out.len(), header_len);
        for (_, body) in &streams {
            out.extend_from_slice(body);
        }
        out
    }

    /// Complete PE32 image.
    pub fn build(&self) -> Vec<u8> {
        wrap_pe(&self.metadata())
    }
}

const SECTION_RVA: u32 = 0x2000;
const FILE_ALIGNMENT: usize = 0x200;
const CLI_HEADER_SIZE: u32 = 72;

/// Place `metadata` behind a CLI header in a single-section PE32 DLL.
pub fn wrap_pe(metadata: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, CLI_HEADER_SIZE);
    put_u16(&mut body, 2);
    put_u16(&mut body, 5);
    put_u32(&mut body, SECTION_RVA + CLI_HEADER_SIZE);
    put_u32(&mut body, metadata.len() as u32);
    put_u32(&mut body, 1); // ILONLY
    put_u32(&mut body, 0);
    body.resize(CLI_HEADER_SIZE as usize, 0);
    body.extend_from_slice(metadata);
    let virtual_size = body.len() as u32;
    let raw_size = body.len().div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT;
    body.resize(raw_size, 0);

    let mut image = Vec::new();
    image.extend_from_slice(b"MZ");
    image.resize(0x3C, 0);
    put_u32(&mut image, 0x80);
    image.resize(0x80, 0);
    image.extend_from_slice(b"PE\0\0");

    // COFF header
    put_u16(&mut image, 0x014C);
    put_u16(&mut image, 1);
    put_u32(&mut image, 0);
    put_u32(&mut image, 0);
    put_u32(&mut image, 0);
    put_u16(&mut image, 0xE0);
    put_u16(&mut image, 0x2102);

    // Optional header, standard fields
    put_u16(&mut image, 0x010B);
    image.extend_from_slice(&[8, 0]);
    put_u32(&mut image, raw_size as u32);
    put_u32(&mut image, 0);
    put_u32(&mut image, 0);
    put_u32(&mut image, 0);
    put_u32(&mut image, SECTION_RVA);
    put_u32(&mut image, 0);
    // Windows fields
    put_u32(&mut image, 0x1000_0000);
    put_u32(&mut image, 0x2000);
    put_u32(&mut image, FILE_ALIGNMENT as u32);
    for v in [4u16, 0, 0, 0, 4, 0] {
        put_u16(&mut image, v);
    }
    put_u32(&mut image, 0);
    put_u32(&mut image, SECTION_RVA + (raw_size as u32).div_ceil(0x2000) * 0x2000);
    put_u32(&mut image, FILE_ALIGNMENT as u32);
    put_u32(&mut image, 0);
    put_u16(&mut image, 3);
    put_u16(&mut image, 0x8540);
    for v in [0x0010_0000u32, 0x1000, 0x0010_0000, 0x1000, 0, 16] {
        put_u32(&mut image, v);
    }
    // Data directories; only the CLR runtime header (index 14) is set.
    for index in 0..16 {
        if index == 14 {
            put_u32(&mut image, SECTION_RVA);
            put_u32(&mut image, CLI_HEADER_SIZE);
        } else {
            put_u32(&mut image, 0);
            put_u32(&mut image, 0);
        }
    }

    // Section table
    image.extend_from_slice(b".text\0\0\0");
    put_u32(&mut image, virtual_size);
    put_u32(&mut image, SECTION_RVA);
    put_u32(&mut image, raw_size as u32);
    put_u32(&mut image, FILE_ALIGNMENT as u32);
    put_u32(&mut image, 0);
    put_u32(&mut image, 0);
    put_u16(&mut image, 0);
    put_u16(&mut image, 0);
    put_u32(&mut image, 0x6000_0020);

    assert!(image.len() <= FILE_ALIGNMENT);
    image.resize(FILE_ALIGNMENT, 0);
    image.extend_from_slice(&body);
    image
}

fn pad4(mut data: Vec<u8>) -> Vec<u8> {
    data.resize((data.len() + 3) & !3, 0);
    data
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Console app compiled against the full framework: calls
/// `Console.WriteLine(string)`, `object..ctor()` and one user library method.
pub fn framework_console_app() -> Vec<u8> {
    let mut m = ModuleBuilder::library("App.exe", "App", [1, 0, 0, 0]);
    let mscorlib = m.assembly_ref("mscorlib", [4, 0, 0, 0], &ECMA_TOKEN);
    let contoso = m.assembly_ref("Contoso.Core", [1, 2, 0, 0], &[]);
    let object = m.type_ref(mscorlib, "System", "Object");
    let console = m.type_ref(mscorlib, "System", "Console");
    let widget = m.type_ref(contoso, "Contoso", "Widget");
    m.member_ref(Parent::TypeRef(object), ".ctor", &sig::method(sig::HASTHIS, &[sig::VOID], &[]));
    m.member_ref(
        Parent::TypeRef(console),
        "WriteLine",
        &sig::method(sig::DEFAULT, &[sig::VOID], &[&[sig::STRING]]),
    );
    m.member_ref(Parent::TypeRef(widget), "Spin", &sig::method(sig::HASTHIS, &[sig::VOID], &[]));
    m.build()
}

/// Library compiled against netstandard 2.0 calling the same `Console.WriteLine`.
pub fn netstandard_library() -> Vec<u8> {
    let mut m = ModuleBuilder::library("Contoso.Core.dll", "Contoso.Core", [1, 2, 0, 0]);
    let netstandard = m.assembly_ref("netstandard", [2, 0, 0, 0], &NETSTANDARD_TOKEN);
    let console = m.type_ref(netstandard, "System", "Console");
    let object = m.type_ref(netstandard, "System", "Object");
    let env = m.type_ref(netstandard, "System", "AppDomain");
    m.member_ref(Parent::TypeRef(object), ".ctor", &sig::method(sig::HASTHIS, &[sig::VOID], &[]));
    m.member_ref(
        Parent::TypeRef(console),
        "WriteLine",
        &sig::method(sig::DEFAULT, &[sig::VOID], &[&[sig::STRING]]),
    );
    m.member_ref(
        Parent::TypeRef(env),
        "CreateDomain",
        &sig::method(sig::DEFAULT, &sig::class(env), &[&[sig::STRING]]),
    );
    m.build()
}

/// Catalog matching the fixtures above.
pub const CATALOG_JSON: &str = r#"{
    "targets": [".NETCoreApp,Version=v2.0", ".NETFramework,Version=v4.8"],
    "apis": {
        "T:System.Object": [".NETCoreApp,Version=v2.0", ".NETFramework,Version=v4.8"],
        "T:System.Console": [".NETCoreApp,Version=v2.0", ".NETFramework,Version=v4.8"],
        "T:System.AppDomain": [".NETCoreApp,Version=v2.0", ".NETFramework,Version=v4.8"],
        "M:System.Object.#ctor": [".NETCoreApp,Version=v2.0", ".NETFramework,Version=v4.8"],
        "M:System.Console.WriteLine(System.String)": [
            ".NETCoreApp,Version=v2.0",
            ".NETFramework,Version=v4.8"
        ],
        "M:System.AppDomain.CreateDomain(System.String)": [".NETFramework,Version=v4.8"]
    }
}"#;
