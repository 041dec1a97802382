//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use anyhow::Result;
use questscan::SAMPLE_FILE_SIZE;
use std::fs;
use std::path::Path;

const MH_MAGIC_64: u32 = 0xfeed_facf;
const LC_SEGMENT_64: u32 = 0x19;
const HEADER_SIZE: usize = 32;
const SEGMENT_SIZE: usize = 72;
const SECTION_SIZE: usize = 80;

fn name16(buf: &mut Vec<u8>, name: &str) {
    let mut raw = [0u8; 16];
    raw[..name.len()].copy_from_slice(name.as_bytes());
    buf.extend_from_slice(&raw);
}

/// Little-endian 64-bit Mach-O with one `__TEXT` segment holding the given
/// sections, zero padded to `len` bytes.
pub fn macho_image(sections: &[(&str, &[u8])], len: usize) -> Vec<u8> {
    let cmdsize = SEGMENT_SIZE + sections.len() * SECTION_SIZE;
    let mut data_offset = HEADER_SIZE + cmdsize;
    let mut buf = Vec::with_capacity(len);

    for v in [MH_MAGIC_64, 0x0100_0007, 3, 2, 1, cmdsize as u32, 0, 0] {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    buf.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    buf.extend_from_slice(&(cmdsize as u32).to_le_bytes());
    name16(&mut buf, "__TEXT");
    buf.extend_from_slice(&[0u8; 32]);
    for v in [7u32, 5, sections.len() as u32, 0] {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    for (name, bytes) in sections {
        name16(&mut buf, name);
        name16(&mut buf, "__TEXT");
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        buf.extend_from_slice(&(data_offset as u32).to_le_bytes());
        buf.extend_from_slice(&[0u8; 28]);
        data_offset += bytes.len();
    }

    for (_, bytes) in sections {
        buf.extend_from_slice(bytes);
    }
    buf.resize(len.max(buf.len()), 0);
    buf
}

/// Writes a fingerprint-sized sample with the given `__text` and `__cstring`
pub fn write_sample(path: &Path, text: &[u8], cstring: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let image = macho_image(
        &[("__text", text), ("__cstring", cstring)],
        SAMPLE_FILE_SIZE as usize,
    );
    fs::write(path, image)?;
    Ok(())
}

/// Writes a fingerprint-sized file that is plain text
pub fn write_text_decoy(path: &Path) -> Result<()> {
    let mut data = b"#!/bin/sh\necho not a binary\n".to_vec();
    data.resize(SAMPLE_FILE_SIZE as usize, b' ');
    fs::write(path, data)?;
    Ok(())
}

/// Writes a fingerprint-sized sample whose `__cstring` header claims more
/// bytes than the file holds
pub fn write_sample_with_short_strings(path: &Path, text: &[u8]) -> Result<()> {
    let mut image = macho_image(
        &[("__text", text), ("__cstring", b"cut\0")],
        SAMPLE_FILE_SIZE as usize,
    );
    let size_at = HEADER_SIZE + SEGMENT_SIZE + SECTION_SIZE + 40;
    image[size_at..size_at + 8].copy_from_slice(&SAMPLE_FILE_SIZE.to_le_bytes());
    fs::write(path, image)?;
    Ok(())
}
