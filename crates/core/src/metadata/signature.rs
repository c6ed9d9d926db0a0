//! Signature blobs (ECMA-335 II.23.2) rendered as documentation-id fragments.

use crate::metadata::heaps::read_compressed_u32;
use crate::metadata::ParseError;

/// Nesting limit for types inside signatures and type specs.
pub(crate) const MAX_SIGNATURE_DEPTH: usize = 64;

const ELEMENT_TYPE_VOID: u8 = 0x01;
const ELEMENT_TYPE_PTR: u8 = 0x0F;
const ELEMENT_TYPE_BYREF: u8 = 0x10;
const ELEMENT_TYPE_VALUETYPE: u8 = 0x11;
const ELEMENT_TYPE_CLASS: u8 = 0x12;
const ELEMENT_TYPE_VAR: u8 = 0x13;
const ELEMENT_TYPE_ARRAY: u8 = 0x14;
const ELEMENT_TYPE_GENERICINST: u8 = 0x15;
const ELEMENT_TYPE_TYPEDBYREF: u8 = 0x16;
const ELEMENT_TYPE_FNPTR: u8 = 0x1B;
const ELEMENT_TYPE_SZARRAY: u8 = 0x1D;
const ELEMENT_TYPE_MVAR: u8 = 0x1E;
const ELEMENT_TYPE_CMOD_REQD: u8 = 0x1F;
const ELEMENT_TYPE_CMOD_OPT: u8 = 0x20;
const ELEMENT_TYPE_SENTINEL: u8 = 0x41;
const ELEMENT_TYPE_PINNED: u8 = 0x45;

const CALLCONV_FIELD: u8 = 0x06;
const CALLCONV_GENERIC: u8 = 0x10;

/// Highest array rank the runtime accepts.
const MAX_ARRAY_RANK: u32 = 32;

/// Resolves `TypeDefOrRefEncoded` tokens found in signatures.
pub(crate) trait TypeNameSource {
    /// Doc-id name (`Namespace.Outer.Inner`) for an encoded TypeDef/TypeRef/TypeSpec token.
    fn encoded_type_name(&self, encoded: u32, depth: usize) -> Result<String, ParseError>;
}

/// Decoded MemberRef signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MemberSignature {
    Field,
    Method { generic_params: u32, params: Vec<String>, return_type: String },
}

pub(crate) struct SignatureReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SignatureReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Result<u8, ParseError> {
        self.data.get(self.pos).copied().ok_or_else(|| self.truncated())
    }

    fn byte(&mut self) -> Result<u8, ParseError> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn compressed(&mut self) -> Result<u32, ParseError> {
        read_compressed_u32(self.data, &mut self.pos)
    }

    fn truncated(&self) -> ParseError {
        ParseError::Truncated { what: "signature", offset: self.pos }
    }

    /// Decode a MemberRef signature (field or method).
    pub(crate) fn member(
        &mut self,
        names: &dyn TypeNameSource,
    ) -> Result<MemberSignature, ParseError> {
        if self.peek()? == CALLCONV_FIELD {
            self.byte()?;
            // The field type does not contribute to a field doc id, but it is
            // decoded so malformed blobs are reported.
            self.element_type(names, 0)?;
            return Ok(MemberSignature::Field);
        }
        let (generic_params, params, return_type) = self.method(names, 0)?;
        Ok(MemberSignature::Method { generic_params, params, return_type })
    }

    fn method(
        &mut self,
        names: &dyn TypeNameSource,
        depth: usize,
    ) -> Result<(u32, Vec<String>, String), ParseError> {
        let conv = self.byte()?;
        let generic_params = if conv & CALLCONV_GENERIC != 0 { self.compressed()? } else { 0 };
        let count = self.compressed()?;
        let return_type = self.element_type(names, depth)?;

        let mut params = Vec::new();
        let mut varargs = false;
        for _ in 0..count {
            if self.peek()? == ELEMENT_TYPE_SENTINEL {
                self.byte()?;
                varargs = true;
            }
            let param = self.element_type(names, depth)?;
            // Arguments after the sentinel belong to the call site, not the method.
            if !varargs {
                params.push(param);
            }
        }
        Ok((generic_params, params, return_type))
    }

    /// Decode one `Type` production into its doc-id spelling.
    pub(crate) fn element_type(
        &mut self,
        names: &dyn TypeNameSource,
        depth: usize,
    ) -> Result<String, ParseError> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(ParseError::InvalidSignature("type nesting too deep".into()));
        }
        loop {
            match self.peek()? {
                ELEMENT_TYPE_CMOD_REQD | ELEMENT_TYPE_CMOD_OPT => {
                    self.byte()?;
                    self.compressed()?;
                }
                ELEMENT_TYPE_PINNED => {
                    self.byte()?;
                }
                _ => break,
            }
        }

        let element = self.byte()?;
        if let Some(name) = primitive_name(element) {
            return Ok(name.to_string());
        }
        let name = match element {
            ELEMENT_TYPE_PTR => format!("{}*", self.element_type(names, depth + 1)?),
            ELEMENT_TYPE_BYREF => format!("{}@", self.element_type(names, depth + 1)?),
            ELEMENT_TYPE_VALUETYPE | ELEMENT_TYPE_CLASS => {
                let encoded = self.compressed()?;
                names.encoded_type_name(encoded, depth + 1)?
            }
            ELEMENT_TYPE_VAR => format!("`{}", self.compressed()?),
            ELEMENT_TYPE_MVAR => format!("``{}", self.compressed()?),
            ELEMENT_TYPE_SZARRAY => format!("{}[]", self.element_type(names, depth + 1)?),
            ELEMENT_TYPE_ARRAY => {
                let element = self.element_type(names, depth + 1)?;
                let rank = self.compressed()?;
                let sizes = self.compressed()?;
                for _ in 0..sizes {
                    self.compressed()?;
                }
                let lower_bounds = self.compressed()?;
                for _ in 0..lower_bounds {
                    // Signed compressed integers share the unsigned length encoding.
                    self.compressed()?;
                }
                if rank > MAX_ARRAY_RANK {
                    return Err(ParseError::InvalidSignature(format!(
                        "array rank {rank} exceeds {MAX_ARRAY_RANK}"
                    )));
                }
                let dims = vec!["0:"; rank.max(1) as usize].join(",");
                format!("{element}[{dims}]")
            }
            ELEMENT_TYPE_GENERICINST => {
                let kind = self.byte()?;
                if kind != ELEMENT_TYPE_CLASS && kind != ELEMENT_TYPE_VALUETYPE {
                    return Err(ParseError::InvalidSignature(format!(
                        "generic instantiation of element type 0x{kind:02X}"
                    )));
                }
                let encoded = self.compressed()?;
                let base = names.encoded_type_name(encoded, depth + 1)?;
                let count = self.compressed()?;
                let mut args = Vec::new();
                for _ in 0..count {
                    args.push(self.element_type(names, depth + 1)?);
                }
                format!("{}{{{}}}", strip_generic_arity(&base), args.join(","))
            }
            ELEMENT_TYPE_FNPTR => {
                let (_, params, return_type) = self.method(names, depth + 1)?;
                format!("=FUNC:{}({})", return_type, params.join(","))
            }
            other => {
                return Err(ParseError::InvalidSignature(format!(
                    "unexpected element type 0x{other:02X} at offset {}",
                    self.pos - 1
                )))
            }
        };
        Ok(name)
    }
}

fn primitive_name(element: u8) -> Option<&'static str> {
    Some(match element {
        ELEMENT_TYPE_VOID => "System.Void",
        0x02 => "System.Boolean",
        0x03 => "System.Char",
        0x04 => "System.SByte",
        0x05 => "System.Byte",
        0x06 => "System.Int16",
        0x07 => "System.UInt16",
        0x08 => "System.Int32",
        0x09 => "System.UInt32",
        0x0A => "System.Int64",
        0x0B => "System.UInt64",
        0x0C => "System.Single",
        0x0D => "System.Double",
        0x0E => "System.String",
        ELEMENT_TYPE_TYPEDBYREF => "System.TypedReference",
        0x18 => "System.IntPtr",
        0x19 => "System.UIntPtr",
        0x1C => "System.Object",
        _ => return None,
    })
}

/// Remove `` `N`` arity markers: `Dictionary`2` -> `Dictionary`.
pub(crate) fn strip_generic_arity(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '`' && chars.peek().is_some_and(|d| d.is_ascii_digit()) {
            while chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Doc id for a method: `M:Type.Name``N(Params)~Return`.
pub(crate) fn method_doc_id(
    type_name: &str,
    member_name: &str,
    generic_params: u32,
    params: &[String],
    return_type: &str,
) -> String {
    let mut id = format!("M:{}.{}", type_name, member_name.replace('.', "#"));
    if generic_params > 0 {
        id.push_str(&format!("``{generic_params}"));
    }
    if !params.is_empty() {
        id.push('(');
        id.push_str(&params.join(","));
        id.push(')');
    }
    if member_name == "op_Implicit" || member_name == "op_Explicit" {
        id.push('~');
        id.push_str(return_type);
    }
    id
}

pub(crate) fn field_doc_id(type_name: &str, member_name: &str) -> String {
    format!("F:{}.{}", type_name, member_name.replace('.', "#"))
}

pub(crate) fn type_doc_id(type_name: &str) -> String {
    format!("T:{type_name}")
}
