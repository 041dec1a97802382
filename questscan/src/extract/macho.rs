use std::path::Path;
use tracing::{debug, trace};

use super::{RegionExtractor, RegionKind, Regions};
use crate::errors::ExtractError;

const MH_MAGIC: u32 = 0xfeed_face;
const MH_CIGAM: u32 = 0xcefa_edfe;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_CIGAM_64: u32 = 0xcffa_edfe;
const FAT_MAGIC: u32 = 0xcafe_babe;
const FAT_CIGAM: u32 = 0xbeba_feca;

const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;

const LOAD_COMMAND_SIZE: usize = 8;
const NAME_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

/// Field layout of the 32-bit and 64-bit header variants
#[derive(Debug, Clone, Copy)]
struct Layout {
    is_64: bool,
    header_size: usize,
    segment_size: usize,
    section_size: usize,
    nsects_offset: usize,
}

impl Layout {
    const MACHO_32: Layout = Layout {
        is_64: false,
        header_size: 28,
        segment_size: 56,
        section_size: 68,
        nsects_offset: 48,
    };

    const MACHO_64: Layout = Layout {
        is_64: true,
        header_size: 32,
        segment_size: 72,
        section_size: 80,
        nsects_offset: 64,
    };
}

/// Bounds-checked reads over the raw image
struct ByteReader<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    fn bytes_at<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let end = offset.checked_add(N)?;
        self.data.get(offset..end)?.try_into().ok()
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let raw = self.bytes_at::<4>(offset)?;
        Some(match self.endian {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        })
    }

    fn u64_at(&self, offset: usize) -> Option<u64> {
        let raw = self.bytes_at::<8>(offset)?;
        Some(match self.endian {
            Endian::Little => u64::from_le_bytes(raw),
            Endian::Big => u64::from_be_bytes(raw),
        })
    }

    /// NUL-padded 16 byte name field. Names are raw bytes; only the tracked
    /// ones need to be ASCII.
    fn name_at(&self, offset: usize) -> Option<&'a [u8]> {
        let end = offset.checked_add(NAME_LEN)?;
        let raw = self.data.get(offset..end)?;
        let len = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        Some(&raw[..len])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SectionHeader {
    name: Vec<u8>,
    offset: u64,
    size: u64,
}

/// Reads the `__text` and `__cstring` sections of thin Mach-O binaries.
///
/// Both byte orders and both word sizes are accepted. Fat (universal)
/// binaries are reported as not applicable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachOExtractor;

impl MachOExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts the tracked regions from an in-memory image.
    ///
    /// Regions are read in [`RegionKind::ALL`] order, first matching section
    /// wins. A section running past the end of the file stops extraction
    /// there: regions read before it are kept, and if there are none the
    /// file is reported as truncated.
    pub fn extract_bytes(&self, path: &Path, data: &[u8]) -> Result<Regions, ExtractError> {
        let sections =
            parse_sections(data).map_err(|reason| ExtractError::not_applicable(path, reason))?;

        let mut regions = Regions::new();
        for kind in RegionKind::ALL {
            let name = kind.section_name();
            let Some(section) = sections.iter().find(|s| s.name == name.as_bytes()) else {
                continue;
            };

            let Some(bytes) = section_bytes(data, section) else {
                if regions.is_empty() {
                    return Err(ExtractError::truncated(path, name));
                }
                debug!(
                    "{}: {} runs past end of file, keeping earlier regions",
                    path.display(),
                    name
                );
                break;
            };

            trace!(
                "{}: {} at offset {} ({} bytes)",
                path.display(),
                name,
                section.offset,
                section.size
            );
            regions.insert(kind, bytes.to_vec());
        }

        Ok(regions)
    }
}

fn section_bytes<'a>(data: &'a [u8], section: &SectionHeader) -> Option<&'a [u8]> {
    let start = usize::try_from(section.offset).ok()?;
    let end = section
        .offset
        .checked_add(section.size)
        .and_then(|end| usize::try_from(end).ok())?;
    data.get(start..end)
}

impl RegionExtractor for MachOExtractor {
    fn extract(&self, path: &Path) -> Result<Regions, ExtractError> {
        let data = std::fs::read(path).map_err(|e| ExtractError::io(path, e))?;
        self.extract_bytes(path, &data)
    }
}

fn parse_sections(data: &[u8]) -> Result<Vec<SectionHeader>, String> {
    let magic = ByteReader {
        data,
        endian: Endian::Little,
    }
    .u32_at(0)
    .ok_or("file too small for a Mach-O header")?;

    let (endian, layout) = match magic {
        MH_MAGIC => (Endian::Little, Layout::MACHO_32),
        MH_MAGIC_64 => (Endian::Little, Layout::MACHO_64),
        MH_CIGAM => (Endian::Big, Layout::MACHO_32),
        MH_CIGAM_64 => (Endian::Big, Layout::MACHO_64),
        FAT_MAGIC | FAT_CIGAM => return Err("fat binaries are not supported".to_string()),
        other => return Err(format!("unknown magic {:#010x}", other)),
    };

    let reader = ByteReader { data, endian };
    let header_err = || "truncated Mach-O header".to_string();
    let ncmds = reader.u32_at(16).ok_or_else(header_err)? as usize;
    let sizeofcmds = reader.u32_at(20).ok_or_else(header_err)? as usize;
    if data.len() < layout.header_size {
        return Err(header_err());
    }

    let cmds_end = layout
        .header_size
        .checked_add(sizeofcmds)
        .filter(|&end| end <= data.len())
        .ok_or("load commands run past end of file")?;

    let mut sections = Vec::new();
    let mut offset = layout.header_size;
    for index in 0..ncmds {
        let malformed = || format!("malformed load command {}", index);
        if offset + LOAD_COMMAND_SIZE > cmds_end {
            return Err(malformed());
        }
        let cmd = reader.u32_at(offset).ok_or_else(malformed)?;
        let cmdsize = reader.u32_at(offset + 4).ok_or_else(malformed)? as usize;
        if cmdsize < LOAD_COMMAND_SIZE || offset + cmdsize > cmds_end {
            return Err(malformed());
        }

        match cmd {
            LC_SEGMENT if !layout.is_64 => {
                read_segment(&reader, layout, offset, cmdsize, &mut sections)?
            }
            LC_SEGMENT_64 if layout.is_64 => {
                read_segment(&reader, layout, offset, cmdsize, &mut sections)?
            }
            _ => {}
        }
        offset += cmdsize;
    }

    Ok(sections)
}

fn read_segment(
    reader: &ByteReader<'_>,
    layout: Layout,
    offset: usize,
    cmdsize: usize,
    sections: &mut Vec<SectionHeader>,
) -> Result<(), String> {
    let malformed = || format!("malformed segment command at offset {}", offset);
    if cmdsize < layout.segment_size {
        return Err(malformed());
    }

    let nsects = reader
        .u32_at(offset + layout.nsects_offset)
        .ok_or_else(malformed)? as usize;
    let needed = nsects
        .checked_mul(layout.section_size)
        .and_then(|n| n.checked_add(layout.segment_size))
        .ok_or_else(malformed)?;
    if needed > cmdsize {
        return Err(malformed());
    }

    for i in 0..nsects {
        let base = offset + layout.segment_size + i * layout.section_size;
        let name = reader.name_at(base).ok_or_else(malformed)?;
        let (size, file_offset) = if layout.is_64 {
            (reader.u64_at(base + 40), reader.u32_at(base + 48))
        } else {
            (reader.u32_at(base + 36).map(u64::from), reader.u32_at(base + 40))
        };

        sections.push(SectionHeader {
            name: name.to_vec(),
            size: size.ok_or_else(malformed)?,
            offset: u64::from(file_offset.ok_or_else(malformed)?),
        });
    }

    Ok(())
}
