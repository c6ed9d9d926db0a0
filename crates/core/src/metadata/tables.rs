use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::metadata::ParseError;

/// Number of table slots defined by ECMA-335 partition II (0x00..=0x2C).
pub(crate) const TABLE_COUNT: usize = 0x2D;

/// Widest row in the schema (Assembly and AssemblyRef have nine columns).
const MAX_COLUMNS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRva = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    pub(crate) const ALL: [TableId; TABLE_COUNT] = [
        TableId::Module,
        TableId::TypeRef,
        TableId::TypeDef,
        TableId::FieldPtr,
        TableId::Field,
        TableId::MethodPtr,
        TableId::MethodDef,
        TableId::ParamPtr,
        TableId::Param,
        TableId::InterfaceImpl,
        TableId::MemberRef,
        TableId::Constant,
        TableId::CustomAttribute,
        TableId::FieldMarshal,
        TableId::DeclSecurity,
        TableId::ClassLayout,
        TableId::FieldLayout,
        TableId::StandAloneSig,
        TableId::EventMap,
        TableId::EventPtr,
        TableId::Event,
        TableId::PropertyMap,
        TableId::PropertyPtr,
        TableId::Property,
        TableId::MethodSemantics,
        TableId::MethodImpl,
        TableId::ModuleRef,
        TableId::TypeSpec,
        TableId::ImplMap,
        TableId::FieldRva,
        TableId::EncLog,
        TableId::EncMap,
        TableId::Assembly,
        TableId::AssemblyProcessor,
        TableId::AssemblyOs,
        TableId::AssemblyRef,
        TableId::AssemblyRefProcessor,
        TableId::AssemblyRefOs,
        TableId::File,
        TableId::ExportedType,
        TableId::ManifestResource,
        TableId::NestedClass,
        TableId::GenericParam,
        TableId::MethodSpec,
        TableId::GenericParamConstraint,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            TableId::Module => "Module",
            TableId::TypeRef => "TypeRef",
            TableId::TypeDef => "TypeDef",
            TableId::MemberRef => "MemberRef",
            TableId::TypeSpec => "TypeSpec",
            TableId::Assembly => "Assembly",
            TableId::AssemblyRef => "AssemblyRef",
            TableId::NestedClass => "NestedClass",
            TableId::ModuleRef => "ModuleRef",
            TableId::MethodDef => "MethodDef",
            _ => "metadata",
        }
    }

    fn columns(self) -> &'static [Column] {
        use CodedIndex as C;
        use Column::*;
        use TableId as T;
        match self {
            T::Module => &[Fixed2, Str, Guid, Guid, Guid],
            T::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            T::TypeDef => &[
                Fixed4,
                Str,
                Str,
                Coded(C::TypeDefOrRef),
                Index(T::Field),
                Index(T::MethodDef),
            ],
            T::FieldPtr => &[Index(T::Field)],
            T::Field => &[Fixed2, Str, Blob],
            T::MethodPtr => &[Index(T::MethodDef)],
            T::MethodDef => &[Fixed4, Fixed2, Fixed2, Str, Blob, Index(T::Param)],
            T::ParamPtr => &[Index(T::Param)],
            T::Param => &[Fixed2, Fixed2, Str],
            T::InterfaceImpl => &[Index(T::TypeDef), Coded(C::TypeDefOrRef)],
            T::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            // Type is one byte followed by one byte of padding.
            T::Constant => &[Fixed2, Coded(C::HasConstant), Blob],
            T::CustomAttribute => {
                &[Coded(C::HasCustomAttribute), Coded(C::CustomAttributeType), Blob]
            }
            T::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            T::DeclSecurity => &[Fixed2, Coded(C::HasDeclSecurity), Blob],
            T::ClassLayout => &[Fixed2, Fixed4, Index(T::TypeDef)],
            T::FieldLayout => &[Fixed4, Index(T::Field)],
            T::StandAloneSig => &[Blob],
            T::EventMap => &[Index(T::TypeDef), Index(T::Event)],
            T::EventPtr => &[Index(T::Event)],
            T::Event => &[Fixed2, Str, Coded(C::TypeDefOrRef)],
            T::PropertyMap => &[Index(T::TypeDef), Index(T::Property)],
            T::PropertyPtr => &[Index(T::Property)],
            T::Property => &[Fixed2, Str, Blob],
            T::MethodSemantics => &[Fixed2, Index(T::MethodDef), Coded(C::HasSemantics)],
            T::MethodImpl => {
                &[Index(T::TypeDef), Coded(C::MethodDefOrRef), Coded(C::MethodDefOrRef)]
            }
            T::ModuleRef => &[Str],
            T::TypeSpec => &[Blob],
            T::ImplMap => &[Fixed2, Coded(C::MemberForwarded), Str, Index(T::ModuleRef)],
            T::FieldRva => &[Fixed4, Index(T::Field)],
            T::EncLog => &[Fixed4, Fixed4],
            T::EncMap => &[Fixed4],
            T::Assembly => &[Fixed4, Fixed2, Fixed2, Fixed2, Fixed2, Fixed4, Blob, Str, Str],
            T::AssemblyProcessor => &[Fixed4],
            T::AssemblyOs => &[Fixed4, Fixed4, Fixed4],
            T::AssemblyRef => &[Fixed2, Fixed2, Fixed2, Fixed2, Fixed4, Blob, Str, Str, Blob],
            T::AssemblyRefProcessor => &[Fixed4, Index(T::AssemblyRef)],
            T::AssemblyRefOs => &[Fixed4, Fixed4, Fixed4, Index(T::AssemblyRef)],
            T::File => &[Fixed4, Str, Blob],
            T::ExportedType => &[Fixed4, Fixed4, Str, Str, Coded(C::Implementation)],
            T::ManifestResource => &[Fixed4, Fixed4, Str, Coded(C::Implementation)],
            T::NestedClass => &[Index(T::TypeDef), Index(T::TypeDef)],
            T::GenericParam => &[Fixed2, Fixed2, Coded(C::TypeOrMethodDef), Str],
            T::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            T::GenericParamConstraint => &[Index(T::GenericParam), Coded(C::TypeDefOrRef)],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Fixed2,
    Fixed4,
    Str,
    Guid,
    Blob,
    Index(TableId),
    Coded(CodedIndex),
}

/// Coded index kinds (ECMA-335 II.24.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndex {
    fn tag_bits(self) -> u32 {
        match self {
            CodedIndex::HasFieldMarshal
            | CodedIndex::HasSemantics
            | CodedIndex::MethodDefOrRef
            | CodedIndex::MemberForwarded
            | CodedIndex::TypeOrMethodDef => 1,
            CodedIndex::TypeDefOrRef
            | CodedIndex::HasConstant
            | CodedIndex::HasDeclSecurity
            | CodedIndex::Implementation
            | CodedIndex::ResolutionScope => 2,
            CodedIndex::MemberRefParent | CodedIndex::CustomAttributeType => 3,
            CodedIndex::HasCustomAttribute => 5,
        }
    }

    /// Tables addressed by each tag value; `None` marks unused tags.
    fn tables(self) -> &'static [Option<TableId>] {
        use TableId as T;
        match self {
            CodedIndex::TypeDefOrRef => &[Some(T::TypeDef), Some(T::TypeRef), Some(T::TypeSpec)],
            CodedIndex::HasConstant => &[Some(T::Field), Some(T::Param), Some(T::Property)],
            CodedIndex::HasCustomAttribute => &[
                Some(T::MethodDef),
                Some(T::Field),
                Some(T::TypeRef),
                Some(T::TypeDef),
                Some(T::Param),
                Some(T::InterfaceImpl),
                Some(T::MemberRef),
                Some(T::Module),
                Some(T::DeclSecurity),
                Some(T::Property),
                Some(T::Event),
                Some(T::StandAloneSig),
                Some(T::ModuleRef),
                Some(T::TypeSpec),
                Some(T::Assembly),
                Some(T::AssemblyRef),
                Some(T::File),
                Some(T::ExportedType),
                Some(T::ManifestResource),
                Some(T::GenericParam),
                Some(T::GenericParamConstraint),
                Some(T::MethodSpec),
            ],
            CodedIndex::HasFieldMarshal => &[Some(T::Field), Some(T::Param)],
            CodedIndex::HasDeclSecurity => {
                &[Some(T::TypeDef), Some(T::MethodDef), Some(T::Assembly)]
            }
            CodedIndex::MemberRefParent => &[
                Some(T::TypeDef),
                Some(T::TypeRef),
                Some(T::ModuleRef),
                Some(T::MethodDef),
                Some(T::TypeSpec),
            ],
            CodedIndex::HasSemantics => &[Some(T::Event), Some(T::Property)],
            CodedIndex::MethodDefOrRef => &[Some(T::MethodDef), Some(T::MemberRef)],
            CodedIndex::MemberForwarded => &[Some(T::Field), Some(T::MethodDef)],
            CodedIndex::Implementation => {
                &[Some(T::File), Some(T::AssemblyRef), Some(T::ExportedType)]
            }
            CodedIndex::CustomAttributeType => {
                &[None, None, Some(T::MethodDef), Some(T::MemberRef), None]
            }
            CodedIndex::ResolutionScope => {
                &[Some(T::Module), Some(T::ModuleRef), Some(T::AssemblyRef), Some(T::TypeRef)]
            }
            CodedIndex::TypeOrMethodDef => &[Some(T::TypeDef), Some(T::MethodDef)],
        }
    }

    /// Split a coded value into its table and 1-based row; row 0 means null.
    pub(crate) fn decode(self, value: u32) -> Option<(TableId, u32)> {
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let table = (*self.tables().get(tag)?)?;
        Some((table, value >> bits))
    }
}

/// Decoded column values for one row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Row {
    values: [u32; MAX_COLUMNS],
}

impl Row {
    pub(crate) fn get(&self, column: usize) -> u32 {
        self.values[column]
    }
}

/// The `#~` stream: row counts plus the raw table data with computed layout.
#[derive(Debug)]
pub(crate) struct TableStream<'a> {
    data: &'a [u8],
    rows: [u32; TABLE_COUNT],
    offsets: [usize; TABLE_COUNT],
    row_sizes: [usize; TABLE_COUNT],
    wide_strings: bool,
    wide_guids: bool,
    wide_blobs: bool,
}

impl<'a> TableStream<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        let mut reader = Cursor::new(data);
        let truncated = |offset: u64| ParseError::Truncated {
            what: "table stream header",
            offset: offset as usize,
        };

        // Reserved, major, minor.
        reader.set_position(6);
        let heap_sizes = reader.read_u8().map_err(|_| truncated(6))?;
        reader.set_position(8);
        let valid = reader.read_u64::<LittleEndian>().map_err(|_| truncated(8))?;
        let _sorted = reader.read_u64::<LittleEndian>().map_err(|_| truncated(16))?;

        let mut rows = [0u32; TABLE_COUNT];
        for bit in 0..64usize {
            if valid & (1u64 << bit) == 0 {
                continue;
            }
            let count =
                reader.read_u32::<LittleEndian>().map_err(|_| truncated(reader.position()))?;
            // Tables past 0x2C (portable PDB) are laid out after every table we decode.
            if bit < TABLE_COUNT {
                rows[bit] = count;
            }
        }
        if heap_sizes & 0x40 != 0 {
            // Extra data word written by some EnC-aware compilers.
            reader.set_position(reader.position() + 4);
        }

        let mut stream = Self {
            data,
            rows,
            offsets: [0; TABLE_COUNT],
            row_sizes: [0; TABLE_COUNT],
            wide_strings: heap_sizes & 0x01 != 0,
            wide_guids: heap_sizes & 0x02 != 0,
            wide_blobs: heap_sizes & 0x04 != 0,
        };

        let mut offset = reader.position() as usize;
        for table in TableId::ALL {
            let row_size: usize =
                table.columns().iter().map(|column| stream.column_width(*column)).sum();
            stream.row_sizes[table.index()] = row_size;
            stream.offsets[table.index()] = offset;
            offset = row_size
                .checked_mul(stream.rows[table.index()] as usize)
                .and_then(|len| offset.checked_add(len))
                .ok_or_else(|| {
                    ParseError::InvalidMetadata(format!("{} table too large", table.name()))
                })?;
        }
        if offset > data.len() {
            return Err(ParseError::Truncated { what: "metadata tables", offset: data.len() });
        }

        Ok(stream)
    }

    pub(crate) fn row_count(&self, table: TableId) -> u32 {
        self.rows[table.index()]
    }

    /// Decode row `rid` (1-based) of `table`.
    pub(crate) fn row(&self, table: TableId, rid: u32) -> Result<Row, ParseError> {
        if rid == 0 || rid > self.row_count(table) {
            return Err(ParseError::RowOutOfRange { table: table.name(), row: rid });
        }
        let size = self.row_sizes[table.index()];
        let start = self.offsets[table.index()] + size * (rid as usize - 1);
        let mut reader = Cursor::new(&self.data[start..start + size]);

        let mut values = [0u32; MAX_COLUMNS];
        for (slot, column) in values.iter_mut().zip(table.columns()) {
            let value = match self.column_width(*column) {
                2 => reader.read_u16::<LittleEndian>().map(u32::from),
                _ => reader.read_u32::<LittleEndian>(),
            };
            *slot = value.map_err(|_| ParseError::Truncated { what: "table row", offset: start })?;
        }
        Ok(Row { values })
    }

    fn column_width(&self, column: Column) -> usize {
        let wide = match column {
            Column::Fixed2 => false,
            Column::Fixed4 => true,
            Column::Str => self.wide_strings,
            Column::Guid => self.wide_guids,
            Column::Blob => self.wide_blobs,
            Column::Index(table) => self.row_count(table) > u32::from(u16::MAX),
            Column::Coded(coded) => {
                let max_rows = coded
                    .tables()
                    .iter()
                    .flatten()
                    .map(|table| self.row_count(*table))
                    .max()
                    .unwrap_or(0);
                max_rows >= 1u32 << (16 - coded.tag_bits())
            }
        };
        if wide {
            4
        } else {
            2
        }
    }
}
