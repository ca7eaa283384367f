use crate::loader::stream::{ByteSource, LoaderError, SourceReader};
use alloc::{string::String, vec::Vec};
use num_derive::FromPrimitive;

/// Binary section identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum SectionKind {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
    DataCount = 12,
}

/// One recorded section: where its payload lives in the source.
#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    /// Payload offset in the source (past id and size).
    pub offset: u64,
    /// Payload length in bytes.
    pub size: u64,
    /// Present for custom sections only.
    pub name: Option<String>,
}

/// Scans the section table after the 8-byte header.
///
/// Two passes over the id/size chain: the first only counts and
/// validates the layout, the second records each section and the names
/// of custom ones. Unknown ids and duplicate non-custom sections fail
/// the load.
pub fn scan_sections(source: &dyn ByteSource) -> Result<Vec<Section>, LoaderError> {
    let mut count = 0usize;
    let mut reader = SourceReader::new(source);
    reader.skip(8)?;
    while reader.remaining() > 0 {
        let _id = reader.read_byte()?;
        let size = reader.read_u32_leb()? as u64;
        reader.skip(size)?;
        count += 1;
    }

    let mut sections = Vec::with_capacity(count);
    let mut seen = [false; 13];
    let mut reader = SourceReader::new(source);
    reader.skip(8)?;
    for _ in 0..count {
        let id = reader.read_byte()?;
        let size = reader.read_u32_leb()? as u64;
        let kind: SectionKind = num_traits::FromPrimitive::from_u8(id)
            .ok_or(LoaderError::Malformed("unknown section id"))?;
        let mut offset = reader.pos();
        let mut payload = size;
        let mut name = None;
        if kind == SectionKind::Custom {
            let mut window = SourceReader::window(source, offset, size)?;
            let section_name = window.read_name()?;
            let consumed = window.pos() - offset;
            offset += consumed;
            payload -= consumed;
            name = Some(section_name);
        } else {
            if seen[id as usize] {
                return Err(LoaderError::Malformed("duplicate section"));
            }
            seen[id as usize] = true;
        }
        sections.push(Section {
            kind,
            offset,
            size: payload,
            name,
        });
        reader.skip(size)?;
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::stream::MemorySource;

    fn with_header(body: &[u8]) -> Vec<u8> {
        let mut bytes = alloc::vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn records_offsets_and_names() {
        // custom section "hi" with 1 payload byte, then an empty type section
        let source = MemorySource::new(with_header(&[
            0x00, 0x04, 0x02, b'h', b'i', 0xAA, 0x01, 0x01, 0x00,
        ]));
        let sections = scan_sections(&source).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].kind, SectionKind::Custom);
        assert_eq!(sections[0].name.as_deref(), Some("hi"));
        assert_eq!(sections[0].size, 1);
        assert_eq!(sections[1].kind, SectionKind::Type);
    }

    #[test]
    fn duplicate_section_fails() {
        let source = MemorySource::new(with_header(&[0x01, 0x01, 0x00, 0x01, 0x01, 0x00]));
        assert!(matches!(
            scan_sections(&source),
            Err(LoaderError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_section_fails() {
        let source = MemorySource::new(with_header(&[0x0D, 0x00]));
        assert!(scan_sections(&source).is_err());
    }

    #[test]
    fn truncated_section_fails() {
        let source = MemorySource::new(with_header(&[0x01, 0x7F]));
        assert!(scan_sections(&source).is_err());
    }
}
