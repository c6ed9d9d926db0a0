use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::metadata::heaps::{BlobHeap, StringsHeap};
use crate::metadata::pe::metadata_slice;
use crate::metadata::root::MetadataRoot;
use crate::metadata::signature::{
    field_doc_id, method_doc_id, type_doc_id, MemberSignature, SignatureReader, TypeNameSource,
    MAX_SIGNATURE_DEPTH,
};
use crate::metadata::tables::{CodedIndex, TableId, TableStream};
use crate::metadata::ParseError;
use crate::model::{AssemblyIdentity, AssemblyVersion};

/// AssemblyRef flag: the blob holds the full public key rather than its token.
const ASSEMBLY_FLAG_PUBLIC_KEY: u32 = 0x0001;

const ELEMENT_TYPE_GENERICINST: u8 = 0x15;

/// One externally resolved API touch-point: a type, method or field whose
/// declaring type lives in another assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberReference {
    /// `T:`, `M:` or `F:` documentation id.
    pub doc_id: String,
    /// Doc id of the declaring type.
    pub defining_type: String,
    pub member_name: String,
    /// Assembly the declaring type resolves to.
    pub assembly: AssemblyIdentity,
}

/// Decoded view of a managed module: who it is, what it references.
///
/// Everything is decoded eagerly when the module is opened, so a malformed
/// image fails at open time and the accessors are infallible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetadata {
    name: String,
    runtime_version: String,
    identity: Option<AssemblyIdentity>,
    assembly_references: Vec<AssemblyIdentity>,
    member_references: Vec<MemberReference>,
}

impl ModuleMetadata {
    /// Build module metadata from already-decoded parts.
    ///
    /// Used by frontends that obtain references from another reader, and by tests.
    pub fn new(
        name: impl Into<String>,
        identity: Option<AssemblyIdentity>,
        assembly_references: Vec<AssemblyIdentity>,
        member_references: Vec<MemberReference>,
    ) -> Self {
        Self {
            name: name.into(),
            runtime_version: String::new(),
            identity,
            assembly_references,
            member_references,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metadata version string, e.g. `v4.0.30319`.
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Identity from the Assembly table; `None` for netmodules.
    pub fn identity(&self) -> Option<&AssemblyIdentity> {
        self.identity.as_ref()
    }

    /// Every AssemblyRef row, in table order.
    pub fn assembly_references(&self) -> &[AssemblyIdentity] {
        &self.assembly_references
    }

    /// Type and member references that resolve to an AssemblyRef, in table order.
    pub fn member_references(&self) -> &[MemberReference] {
        &self.member_references
    }

    pub(crate) fn parse(bytes: &[u8], fallback_name: &str) -> Result<Self, ParseError> {
        let metadata = metadata_slice(bytes)?;
        let root = MetadataRoot::parse(metadata)?;
        let ctx = Context::new(&root)?;

        let name = ctx.module_name()?.unwrap_or_else(|| fallback_name.to_string());
        let identity = ctx.assembly_identity()?;
        let member_references = ctx.member_references()?;

        Ok(Self {
            name,
            runtime_version: root.version.clone(),
            identity,
            assembly_references: ctx.assembly_refs,
            member_references,
        })
    }
}

/// Tables and heaps of one module plus the lookups derived from them.
struct Context<'a> {
    tables: TableStream<'a>,
    strings: StringsHeap<'a>,
    blobs: BlobHeap<'a>,
    assembly_refs: Vec<AssemblyIdentity>,
    /// Nested TypeDef rid -> enclosing TypeDef rid.
    enclosing: HashMap<u32, u32>,
}

impl<'a> Context<'a> {
    fn new(root: &MetadataRoot<'a>) -> Result<Self, ParseError> {
        let tables = TableStream::parse(root.tables)?;
        let mut ctx = Self {
            tables,
            strings: StringsHeap::new(root.strings),
            blobs: BlobHeap::new(root.blobs),
            assembly_refs: Vec::new(),
            enclosing: HashMap::new(),
        };

        for rid in 1..=ctx.tables.row_count(TableId::NestedClass) {
            let row = ctx.tables.row(TableId::NestedClass, rid)?;
            ctx.enclosing.insert(row.get(0), row.get(1));
        }

        let mut assembly_refs = Vec::new();
        for rid in 1..=ctx.tables.row_count(TableId::AssemblyRef) {
            let row = ctx.tables.row(TableId::AssemblyRef, rid)?;
            let version = AssemblyVersion::new(
                row.get(0) as u16,
                row.get(1) as u16,
                row.get(2) as u16,
                row.get(3) as u16,
            );
            let key = ctx.blobs.get(row.get(5))?;
            let token = public_key_token(key, row.get(4) & ASSEMBLY_FLAG_PUBLIC_KEY != 0)?;
            assembly_refs.push(AssemblyIdentity::new(
                ctx.strings.get(row.get(6))?,
                version,
                ctx.strings.get(row.get(7))?,
                token,
            ));
        }
        ctx.assembly_refs = assembly_refs;
        Ok(ctx)
    }

    fn module_name(&self) -> Result<Option<String>, ParseError> {
        if self.tables.row_count(TableId::Module) == 0 {
            return Ok(None);
        }
        let row = self.tables.row(TableId::Module, 1)?;
        let name = self.strings.get(row.get(1))?;
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    fn assembly_identity(&self) -> Result<Option<AssemblyIdentity>, ParseError> {
        if self.tables.row_count(TableId::Assembly) == 0 {
            return Ok(None);
        }
        let row = self.tables.row(TableId::Assembly, 1)?;
        let version = AssemblyVersion::new(
            row.get(1) as u16,
            row.get(2) as u16,
            row.get(3) as u16,
            row.get(4) as u16,
        );
        // The Assembly table always stores the full public key.
        let token = public_key_token(self.blobs.get(row.get(6))?, true)?;
        Ok(Some(AssemblyIdentity::new(
            self.strings.get(row.get(7))?,
            version,
            self.strings.get(row.get(8))?,
            token,
        )))
    }

    fn member_references(&self) -> Result<Vec<MemberReference>, ParseError> {
        let mut references = Vec::new();

        for rid in 1..=self.tables.row_count(TableId::TypeRef) {
            let Some(assembly) = self.type_ref_assembly(rid, 0)? else { continue };
            let type_name = self.type_ref_name(rid, 0)?;
            let simple_name = self.strings.get(self.tables.row(TableId::TypeRef, rid)?.get(1))?;
            references.push(MemberReference {
                doc_id: type_doc_id(&type_name),
                defining_type: type_doc_id(&type_name),
                member_name: simple_name.to_string(),
                assembly: assembly.clone(),
            });
        }

        for rid in 1..=self.tables.row_count(TableId::MemberRef) {
            let row = self.tables.row(TableId::MemberRef, rid)?;
            let declaring = match CodedIndex::MemberRefParent.decode(row.get(0)) {
                Some((TableId::TypeRef, type_ref)) => Some(type_ref),
                Some((TableId::TypeSpec, spec)) => self.type_spec_generic_base(spec)?,
                // TypeDef, MethodDef and ModuleRef parents live in this module.
                _ => None,
            };
            let Some(type_ref) = declaring else { continue };
            let Some(assembly) = self.type_ref_assembly(type_ref, 0)? else { continue };

            let type_name = self.type_ref_name(type_ref, 0)?;
            let member_name = self.strings.get(row.get(1))?;
            let blob = self.blobs.get(row.get(2))?;
            let doc_id = match SignatureReader::new(blob).member(self)? {
                MemberSignature::Field => field_doc_id(&type_name, member_name),
                MemberSignature::Method { generic_params, params, return_type } => {
                    method_doc_id(&type_name, member_name, generic_params, &params, &return_type)
                }
            };
            references.push(MemberReference {
                doc_id,
                defining_type: type_doc_id(&type_name),
                member_name: member_name.to_string(),
                assembly: assembly.clone(),
            });
        }

        Ok(references)
    }

    /// Follow a TypeRef's resolution scope (through enclosing TypeRefs) to its AssemblyRef.
    fn type_ref_assembly(
        &self,
        rid: u32,
        depth: usize,
    ) -> Result<Option<&AssemblyIdentity>, ParseError> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(ParseError::InvalidMetadata("TypeRef resolution scope cycle".into()));
        }
        let row = self.tables.row(TableId::TypeRef, rid)?;
        match CodedIndex::ResolutionScope.decode(row.get(0)) {
            Some((TableId::AssemblyRef, assembly_ref)) if assembly_ref > 0 => self
                .assembly_refs
                .get(assembly_ref as usize - 1)
                .map(Some)
                .ok_or(ParseError::RowOutOfRange {
                    table: TableId::AssemblyRef.name(),
                    row: assembly_ref,
                }),
            Some((TableId::TypeRef, outer)) if outer > 0 => {
                self.type_ref_assembly(outer, depth + 1)
            }
            // Module, ModuleRef or a null scope: defined in this assembly.
            _ => Ok(None),
        }
    }

    fn type_ref_name(&self, rid: u32, depth: usize) -> Result<String, ParseError> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(ParseError::InvalidMetadata("TypeRef nesting cycle".into()));
        }
        let row = self.tables.row(TableId::TypeRef, rid)?;
        let name = self.strings.get(row.get(1))?;
        if let Some((TableId::TypeRef, outer)) = CodedIndex::ResolutionScope.decode(row.get(0)) {
            if outer > 0 {
                return Ok(format!("{}.{}", self.type_ref_name(outer, depth + 1)?, name));
            }
        }
        Ok(qualify(self.strings.get(row.get(2))?, name))
    }

    fn type_def_name(&self, rid: u32, depth: usize) -> Result<String, ParseError> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(ParseError::InvalidMetadata("TypeDef nesting cycle".into()));
        }
        let row = self.tables.row(TableId::TypeDef, rid)?;
        let name = self.strings.get(row.get(1))?;
        match self.enclosing.get(&rid) {
            Some(outer) => Ok(format!("{}.{}", self.type_def_name(*outer, depth + 1)?, name)),
            None => Ok(qualify(self.strings.get(row.get(2))?, name)),
        }
    }

    fn type_spec_name(&self, rid: u32, depth: usize) -> Result<String, ParseError> {
        let row = self.tables.row(TableId::TypeSpec, rid)?;
        let blob = self.blobs.get(row.get(0))?;
        SignatureReader::new(blob).element_type(self, depth + 1)
    }

    /// For `GENERICINST` type specs, the TypeRef rid of the generic type definition.
    fn type_spec_generic_base(&self, rid: u32) -> Result<Option<u32>, ParseError> {
        let row = self.tables.row(TableId::TypeSpec, rid)?;
        let blob = self.blobs.get(row.get(0))?;
        if blob.len() < 3 || blob[0] != ELEMENT_TYPE_GENERICINST {
            // Arrays, pointers and type variables: runtime-provided members.
            return Ok(None);
        }
        let mut pos = 2;
        let encoded = crate::metadata::heaps::read_compressed_u32(blob, &mut pos)?;
        match CodedIndex::TypeDefOrRef.decode(encoded) {
            Some((TableId::TypeRef, type_ref)) if type_ref > 0 => Ok(Some(type_ref)),
            _ => Ok(None),
        }
    }
}

impl TypeNameSource for Context<'_> {
    fn encoded_type_name(&self, encoded: u32, depth: usize) -> Result<String, ParseError> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(ParseError::InvalidSignature("type nesting too deep".into()));
        }
        match CodedIndex::TypeDefOrRef.decode(encoded) {
            Some((TableId::TypeDef, rid)) => self.type_def_name(rid, depth),
            Some((TableId::TypeRef, rid)) => self.type_ref_name(rid, depth),
            Some((TableId::TypeSpec, rid)) => self.type_spec_name(rid, depth),
            _ => Err(ParseError::InvalidSignature(format!("bad TypeDefOrRef token 0x{encoded:X}"))),
        }
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Public key token as lowercase hex: the last 8 bytes of the key's SHA-1,
/// reversed, when `is_full_key`; otherwise the blob is the token itself.
fn public_key_token(blob: &[u8], is_full_key: bool) -> Result<String, ParseError> {
    if blob.is_empty() {
        return Ok(String::new());
    }
    let token: Vec<u8> = if is_full_key {
        let digest = Sha1::digest(blob);
        digest[digest.len() - 8..].iter().rev().copied().collect()
    } else if blob.len() == 8 {
        blob.to_vec()
    } else {
        return Err(ParseError::InvalidMetadata(format!(
            "public key token must be 8 bytes, found {}",
            blob.len()
        )));
    };
    Ok(token.iter().map(|b| format!("{b:02x}")).collect())
}
