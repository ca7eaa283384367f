use crate::loader::init_expr::ConstExpr;
use crate::loader::sections::{scan_sections, Section, SectionKind};
use crate::loader::stream::{ByteSource, LoaderError, SourceReader};
use crate::types::{ImportName, ValType};
use alloc::{boxed::Box, string::String, vec::Vec};
use core::fmt;

type ExportMap = hashbrown::HashMap<Box<str>, usize, fnv::FnvBuildHasher>;

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Box<[ValType]>,
    pub results: Box<[ValType]>,
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> (")?;
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{result}")?;
        }
        write!(f, ")")
    }
}

/// Where a function's code comes from.
#[derive(Debug, Clone)]
pub enum FunctionOrigin {
    /// Satisfied by a host binding at attach time.
    Imported(ImportName),
    /// A body inside this module's code section. The range covers the
    /// locals declaration and the instructions up to the final `end`.
    Defined { body_offset: u64, body_size: u32 },
}

/// One entry of the merged function index space.
#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub type_idx: u32,
    pub origin: FunctionOrigin,
}

impl FunctionEntry {
    pub fn is_imported(&self) -> bool {
        matches!(self.origin, FunctionOrigin::Imported(_))
    }
}

/// Declared limits of a table or memory, in entries or pages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Limits {
    pub min: u64,
    pub max: Option<u64>,
}

/// One entry of the merged memory index space.
#[derive(Debug, Clone)]
pub struct MemoryDecl {
    pub limits: Limits,
    pub is_memory64: bool,
    pub imported: Option<ImportName>,
}

/// One entry of the merged table index space.
#[derive(Debug, Clone)]
pub struct TableDecl {
    pub elem_type: ValType,
    pub limits: Limits,
    pub imported: Option<ImportName>,
}

/// One entry of the merged global index space.
#[derive(Debug, Clone)]
pub struct GlobalDecl {
    pub ty: ValType,
    pub mutable: bool,
    pub origin: GlobalOrigin,
}

#[derive(Debug, Clone)]
pub enum GlobalOrigin {
    Imported(ImportName),
    Defined(ConstExpr),
}

/// The four exportable item kinds, by their binary encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ExternalKind {
    Func = 0,
    Table = 1,
    Memory = 2,
    Global = 3,
}

#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub name: String,
    pub kind: ExternalKind,
    pub index: u32,
}

/// How an element segment takes effect.
#[derive(Debug, Clone)]
pub enum ElementMode {
    Active { table_idx: u32, offset: ConstExpr },
    Passive,
    Declared,
}

#[derive(Debug, Clone)]
pub struct ElementSegment {
    pub mode: ElementMode,
    pub elem_type: ValType,
    pub items: Box<[ConstExpr]>,
}

/// How a data segment takes effect.
#[derive(Debug, Clone)]
pub enum DataMode {
    Active { memory_idx: u32, offset: ConstExpr },
    Passive,
}

/// A data segment's payload stays in the byte source until
/// instantiation copies it out.
#[derive(Debug, Clone)]
pub struct DataSegment {
    pub mode: DataMode,
    pub bytes_offset: u64,
    pub bytes_len: u32,
}

/// An immutable module image.
///
/// Built once by [`Module::load`] and never mutated afterwards, so it
/// can be shared between runtimes; each runtime owns its own
/// instantiation. Function bodies and data payloads remain in the byte
/// source and are read back on demand.
pub struct Module {
    source: Box<dyn ByteSource>,
    sections: Vec<Section>,
    types: Vec<FuncType>,
    functions: Vec<FunctionEntry>,
    tables: Vec<TableDecl>,
    memories: Vec<MemoryDecl>,
    globals: Vec<GlobalDecl>,
    exports: Vec<ExportEntry>,
    export_index: ExportMap,
    elements: Vec<ElementSegment>,
    data: Vec<DataSegment>,
    start_function: Option<u32>,
    num_imported_functions: u32,
    num_imported_tables: u32,
    num_imported_memories: u32,
    num_imported_globals: u32,
}

impl core::fmt::Debug for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Module")
            .field("sections", &self.sections)
            .field("types", &self.types)
            .field("functions", &self.functions)
            .field("tables", &self.tables)
            .field("memories", &self.memories)
            .field("globals", &self.globals)
            .field("exports", &self.exports)
            .field("elements", &self.elements)
            .field("data", &self.data)
            .field("start_function", &self.start_function)
            .field("num_imported_functions", &self.num_imported_functions)
            .field("num_imported_tables", &self.num_imported_tables)
            .field("num_imported_memories", &self.num_imported_memories)
            .field("num_imported_globals", &self.num_imported_globals)
            .finish()
    }
}

fn section_reader<'a>(
    source: &'a dyn ByteSource,
    sections: &[Section],
    kind: SectionKind,
) -> Result<Option<SourceReader<'a>>, LoaderError> {
    let section = sections.iter().find(|s| s.kind == kind);
    match section {
        Some(section) => Ok(Some(SourceReader::window(
            source,
            section.offset,
            section.size,
        )?)),
        None => Ok(None),
    }
}

impl Module {
    /// Loads a module image from an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Result<Self, LoaderError> {
        Self::load(Box::new(crate::loader::stream::MemorySource::new(bytes.into())))
    }

    /// Loads a module image from a file path.
    #[cfg(feature = "std")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, LoaderError> {
        Self::load(Box::new(crate::loader::stream::FileSource::open(path)?))
    }

    /// Loads a module image from any byte source.
    pub fn load(source: Box<dyn ByteSource>) -> Result<Self, LoaderError> {
        Self::load_header(source.as_ref())?;
        let sections = scan_sections(source.as_ref())?;
        let mut module = Module {
            source,
            sections,
            types: Vec::new(),
            functions: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            exports: Vec::new(),
            export_index: ExportMap::default(),
            elements: Vec::new(),
            data: Vec::new(),
            start_function: None,
            num_imported_functions: 0,
            num_imported_tables: 0,
            num_imported_memories: 0,
            num_imported_globals: 0,
        };
        module.load_types()?;
        module.load_imports()?;
        module.load_functions()?;
        module.load_tables()?;
        module.load_memories()?;
        module.load_globals()?;
        module.load_exports()?;
        module.load_start()?;
        module.load_elements()?;
        module.load_code()?;
        module.load_data()?;
        module.check_invariants()?;
        Ok(module)
    }

    /// Verifies magic `\0asm` and version `1`.
    fn load_header(source: &dyn ByteSource) -> Result<(), LoaderError> {
        let mut header = [0u8; 8];
        if source.len() < 8 {
            return Err(LoaderError::Malformed("shorter than header"));
        }
        source.read_at(0, &mut header)?;
        if header[0..4] != *b"\0asm" {
            return Err(LoaderError::Malformed("bad magic"));
        }
        if u32::from_le_bytes([header[4], header[5], header[6], header[7]]) != 1 {
            return Err(LoaderError::Malformed("unsupported version"));
        }
        Ok(())
    }


    fn load_types(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Type)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            if reader.read_byte()? != 0x60 {
                return Err(LoaderError::Malformed("function type tag"));
            }
            let params = read_valtype_vec(&mut reader)?;
            let results = read_valtype_vec(&mut reader)?;
            self.types.push(FuncType { params, results });
        }
        Ok(())
    }

    fn load_imports(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Import)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let module = reader.read_name()?;
            let field = reader.read_name()?;
            let name = ImportName::new(&module, &field);
            match reader.read_byte()? {
                0x00 => {
                    let type_idx = reader.read_u32_leb()?;
                    self.functions.push(FunctionEntry {
                        type_idx,
                        origin: FunctionOrigin::Imported(name),
                    });
                    self.num_imported_functions += 1;
                }
                0x01 => {
                    let (elem_type, limits) = read_table_type(&mut reader)?;
                    self.tables.push(TableDecl {
                        elem_type,
                        limits,
                        imported: Some(name),
                    });
                    self.num_imported_tables += 1;
                }
                0x02 => {
                    let (limits, is_memory64) = read_memory_type(&mut reader)?;
                    self.memories.push(MemoryDecl {
                        limits,
                        is_memory64,
                        imported: Some(name),
                    });
                    self.num_imported_memories += 1;
                }
                0x03 => {
                    let (ty, mutable) = read_global_type(&mut reader)?;
                    self.globals.push(GlobalDecl {
                        ty,
                        mutable,
                        origin: GlobalOrigin::Imported(name),
                    });
                    self.num_imported_globals += 1;
                }
                _ => return Err(LoaderError::Malformed("import kind")),
            }
        }
        Ok(())
    }

    fn load_functions(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Function)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let type_idx = reader.read_u32_leb()?;
            self.functions.push(FunctionEntry {
                type_idx,
                // the code section fills the range in afterwards
                origin: FunctionOrigin::Defined {
                    body_offset: 0,
                    body_size: 0,
                },
            });
        }
        Ok(())
    }

    fn load_tables(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Table)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let (elem_type, limits) = read_table_type(&mut reader)?;
            self.tables.push(TableDecl {
                elem_type,
                limits,
                imported: None,
            });
        }
        Ok(())
    }

    fn load_memories(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Memory)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let (limits, is_memory64) = read_memory_type(&mut reader)?;
            self.memories.push(MemoryDecl {
                limits,
                is_memory64,
                imported: None,
            });
        }
        Ok(())
    }

    fn load_globals(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Global)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let (ty, mutable) = read_global_type(&mut reader)?;
            let init = ConstExpr::parse(&mut reader)?;
            self.globals.push(GlobalDecl {
                ty,
                mutable,
                origin: GlobalOrigin::Defined(init),
            });
        }
        Ok(())
    }

    fn load_exports(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Export)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let name = reader.read_name()?;
            let kind = match reader.read_byte()? {
                0 => ExternalKind::Func,
                1 => ExternalKind::Table,
                2 => ExternalKind::Memory,
                3 => ExternalKind::Global,
                _ => return Err(LoaderError::Malformed("export kind")),
            };
            let index = reader.read_u32_leb()?;
            if self.export_index.contains_key(name.as_str()) {
                return Err(LoaderError::Malformed("duplicate export name"));
            }
            self.export_index
                .insert(name.clone().into_boxed_str(), self.exports.len());
            self.exports.push(ExportEntry { name, kind, index });
        }
        Ok(())
    }

    fn load_start(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Start)? else {
            return Ok(());
        };
        self.start_function = Some(reader.read_u32_leb()?);
        Ok(())
    }

    fn load_elements(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Element)? else {
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        for _ in 0..count {
            let encoding = reader.read_u32_leb()?;
            if encoding > 7 {
                return Err(LoaderError::Malformed("element segment encoding"));
            }
            let uses_exprs = encoding & 0x04 != 0;
            let mode = match encoding & 0x03 {
                0 => ElementMode::Active {
                    table_idx: 0,
                    offset: ConstExpr::parse(&mut reader)?,
                },
                2 => {
                    let table_idx = reader.read_u32_leb()?;
                    ElementMode::Active {
                        table_idx,
                        offset: ConstExpr::parse(&mut reader)?,
                    }
                }
                1 => ElementMode::Passive,
                _ => ElementMode::Declared,
            };
            let elem_type = if encoding == 0 || encoding == 4 {
                ValType::FuncRef
            } else if uses_exprs {
                ValType::from_byte(reader.read_byte()?)
                    .filter(ValType::is_ref)
                    .ok_or(LoaderError::Malformed("element reference type"))?
            } else {
                if reader.read_byte()? != 0x00 {
                    return Err(LoaderError::Malformed("element kind"));
                }
                ValType::FuncRef
            };
            let item_count = reader.read_u32_leb()?;
            let mut items = Vec::with_capacity(item_count as usize);
            for _ in 0..item_count {
                if uses_exprs {
                    items.push(ConstExpr::parse(&mut reader)?);
                } else {
                    items.push(ConstExpr::RefFunc(reader.read_u32_leb()?));
                }
            }
            self.elements.push(ElementSegment {
                mode,
                elem_type,
                items: items.into_boxed_slice(),
            });
        }
        Ok(())
    }

    fn load_code(&mut self) -> Result<(), LoaderError> {
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Code)? else {
            if self.num_imported_functions as usize != self.functions.len() {
                return Err(LoaderError::Malformed("missing code section"));
            }
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        let defined = self.functions.len() - self.num_imported_functions as usize;
        if count as usize != defined {
            return Err(LoaderError::Malformed("function and code counts differ"));
        }
        let first_defined = self.num_imported_functions as usize;
        for i in 0..count as usize {
            let body_size = reader.read_u32_leb()?;
            let body_offset = reader.pos();
            reader.skip(body_size as u64)?;
            self.functions[first_defined + i].origin = FunctionOrigin::Defined {
                body_offset,
                body_size,
            };
        }
        Ok(())
    }

    fn load_data(&mut self) -> Result<(), LoaderError> {
        let declared_count = match section_reader(self.source.as_ref(), &self.sections, SectionKind::DataCount)? {
            Some(mut reader) => Some(reader.read_u32_leb()?),
            None => None,
        };
        let Some(mut reader) = section_reader(self.source.as_ref(), &self.sections, SectionKind::Data)? else {
            if matches!(declared_count, Some(n) if n != 0) {
                return Err(LoaderError::Malformed("data count without data"));
            }
            return Ok(());
        };
        let count = reader.read_u32_leb()?;
        if matches!(declared_count, Some(n) if n != count) {
            return Err(LoaderError::Malformed("data count mismatch"));
        }
        for _ in 0..count {
            let mode = match reader.read_u32_leb()? {
                0 => DataMode::Active {
                    memory_idx: 0,
                    offset: ConstExpr::parse(&mut reader)?,
                },
                1 => DataMode::Passive,
                2 => {
                    let memory_idx = reader.read_u32_leb()?;
                    DataMode::Active {
                        memory_idx,
                        offset: ConstExpr::parse(&mut reader)?,
                    }
                }
                _ => return Err(LoaderError::Malformed("data segment mode")),
            };
            let bytes_len = reader.read_u32_leb()?;
            let bytes_offset = reader.pos();
            reader.skip(bytes_len as u64)?;
            self.data.push(DataSegment {
                mode,
                bytes_offset,
                bytes_len,
            });
        }
        Ok(())
    }

    fn check_invariants(&self) -> Result<(), LoaderError> {
        for function in &self.functions {
            if function.type_idx as usize >= self.types.len() {
                return Err(LoaderError::Malformed("function type index out of range"));
            }
        }
        for memory in &self.memories {
            if let Some(max) = memory.limits.max {
                if memory.limits.min > max {
                    return Err(LoaderError::Malformed("memory min exceeds max"));
                }
            }
        }
        for table in &self.tables {
            if let Some(max) = table.limits.max {
                if table.limits.min > max {
                    return Err(LoaderError::Malformed("table min exceeds max"));
                }
            }
        }
        if let Some(start) = self.start_function {
            if start as usize >= self.functions.len() {
                return Err(LoaderError::Malformed("start function out of range"));
            }
        }
        Ok(())
    }

    pub fn types(&self) -> &[FuncType] {
        &self.types
    }

    pub fn functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    pub fn function(&self, func_idx: u32) -> Option<&FunctionEntry> {
        self.functions.get(func_idx as usize)
    }

    /// The signature of the function at `func_idx`.
    pub fn func_type_of(&self, func_idx: u32) -> Option<&FuncType> {
        let entry = self.function(func_idx)?;
        self.types.get(entry.type_idx as usize)
    }

    pub fn tables(&self) -> &[TableDecl] {
        &self.tables
    }

    pub fn memories(&self) -> &[MemoryDecl] {
        &self.memories
    }

    pub fn globals(&self) -> &[GlobalDecl] {
        &self.globals
    }

    pub fn exports(&self) -> &[ExportEntry] {
        &self.exports
    }

    pub fn elements(&self) -> &[ElementSegment] {
        &self.elements
    }

    pub fn data_segments(&self) -> &[DataSegment] {
        &self.data
    }

    pub fn start_function(&self) -> Option<u32> {
        self.start_function
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn num_imported_functions(&self) -> u32 {
        self.num_imported_functions
    }

    pub fn num_imported_tables(&self) -> u32 {
        self.num_imported_tables
    }

    pub fn num_imported_memories(&self) -> u32 {
        self.num_imported_memories
    }

    pub fn num_imported_globals(&self) -> u32 {
        self.num_imported_globals
    }

    /// Looks up an export by name.
    pub fn export(&self, name: &str) -> Option<&ExportEntry> {
        self.export_index.get(name).map(|&i| &self.exports[i])
    }

    /// The function index exported under `name`, if any.
    pub fn exported_function(&self, name: &str) -> Option<u32> {
        let entry = self.export(name)?;
        (entry.kind == ExternalKind::Func).then_some(entry.index)
    }

    /// The body byte range of a defined function.
    pub fn body_range(&self, func_idx: u32) -> Option<(u64, u32)> {
        match self.function(func_idx)?.origin {
            FunctionOrigin::Defined {
                body_offset,
                body_size,
            } => Some((body_offset, body_size)),
            FunctionOrigin::Imported(_) => None,
        }
    }

    /// Copies a defined function's body out of the byte source.
    pub fn load_function_body(&self, func_idx: u32) -> Result<Vec<u8>, LoaderError> {
        let (offset, size) = self
            .body_range(func_idx)
            .ok_or(LoaderError::Malformed("no body for function"))?;
        let mut body = alloc::vec![0u8; size as usize];
        self.source.read_at(offset, &mut body)?;
        Ok(body)
    }

    /// Copies a data segment's payload out of the byte source.
    pub fn load_data_bytes(&self, segment: &DataSegment) -> Result<Vec<u8>, LoaderError> {
        let mut bytes = alloc::vec![0u8; segment.bytes_len as usize];
        self.source.read_at(segment.bytes_offset, &mut bytes)?;
        Ok(bytes)
    }

    /// Maps an absolute source offset to the defined function holding
    /// it and the offset within that function's body.
    ///
    /// Used to annotate diagnostic traps with a code location.
    pub fn function_for_offset(&self, absolute_offset: u64) -> Option<(u32, u32)> {
        for (idx, entry) in self.functions.iter().enumerate() {
            if let FunctionOrigin::Defined {
                body_offset,
                body_size,
            } = entry.origin
            {
                if absolute_offset >= body_offset
                    && absolute_offset < body_offset + body_size as u64
                {
                    return Some((idx as u32, (absolute_offset - body_offset) as u32));
                }
            }
        }
        None
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "module: {} types, {} functions ({} imported), {} tables, {} memories, {} globals",
            self.types.len(),
            self.functions.len(),
            self.num_imported_functions,
            self.tables.len(),
            self.memories.len(),
            self.globals.len(),
        )?;
        for section in &self.sections {
            match &section.name {
                Some(name) => writeln!(
                    f,
                    "  section {:?} \"{}\" at {} ({} bytes)",
                    section.kind, name, section.offset, section.size
                )?,
                None => writeln!(
                    f,
                    "  section {:?} at {} ({} bytes)",
                    section.kind, section.offset, section.size
                )?,
            }
        }
        for export in &self.exports {
            writeln!(f, "  export \"{}\" -> {:?} {}", export.name, export.kind, export.index)?;
        }
        Ok(())
    }
}

fn read_valtype_vec(reader: &mut SourceReader<'_>) -> Result<Box<[ValType]>, LoaderError> {
    let count = reader.read_u32_leb()?;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        types.push(read_valtype(reader)?);
    }
    Ok(types.into_boxed_slice())
}

fn read_valtype(reader: &mut SourceReader<'_>) -> Result<ValType, LoaderError> {
    ValType::from_byte(reader.read_byte()?).ok_or(LoaderError::Malformed("value type"))
}

fn read_table_type(reader: &mut SourceReader<'_>) -> Result<(ValType, Limits), LoaderError> {
    let elem_type = ValType::from_byte(reader.read_byte()?)
        .filter(ValType::is_ref)
        .ok_or(LoaderError::Malformed("table element type"))?;
    let flags = reader.read_byte()?;
    let limits = match flags {
        0x00 => Limits {
            min: reader.read_u32_leb()? as u64,
            max: None,
        },
        0x01 => Limits {
            min: reader.read_u32_leb()? as u64,
            max: Some(reader.read_u32_leb()? as u64),
        },
        _ => return Err(LoaderError::Malformed("table limits flags")),
    };
    Ok((elem_type, limits))
}

fn read_memory_type(reader: &mut SourceReader<'_>) -> Result<(Limits, bool), LoaderError> {
    let flags = reader.read_byte()?;
    if flags & 0x02 != 0 {
        return Err(LoaderError::Unsupported("shared memory"));
    }
    if flags & !0x07 != 0 {
        return Err(LoaderError::Malformed("memory limits flags"));
    }
    let is_memory64 = flags & 0x04 != 0;
    let read_count = |reader: &mut SourceReader<'_>| -> Result<u64, LoaderError> {
        if is_memory64 {
            reader.read_u64_leb()
        } else {
            Ok(reader.read_u32_leb()? as u64)
        }
    };
    let min = read_count(reader)?;
    let max = if flags & 0x01 != 0 {
        Some(read_count(reader)?)
    } else {
        None
    };
    Ok((Limits { min, max }, is_memory64))
}

fn read_global_type(reader: &mut SourceReader<'_>) -> Result<(ValType, bool), LoaderError> {
    let ty = read_valtype(reader)?;
    let mutable = match reader.read_byte()? {
        0x00 => false,
        0x01 => true,
        _ => return Err(LoaderError::Malformed("global mutability flag")),
    };
    Ok((ty, mutable))
}
