use std::fmt::Write as FmtWrite;
use std::io::Read;

use crate::database::{FilesDatabase, Item};
use crate::errors::{Error, Result};
use crate::reader::{ByteReader, MAX_NAME_LEN};

pub const SIGNATURE_ITSF: u32 = 0x4653_5449;
pub const SIGNATURE_ITSP: u32 = 0x5053_5449;
pub const SIGNATURE_PMGL: u32 = 0x4C47_4D50;
pub const SIGNATURE_LZXC: u32 = 0x4358_5A4C;

pub const SIGNATURE_IFCM: u32 = 0x4D43_4649;
pub const SIGNATURE_AOLL: u32 = 0x4C4C_4F41;
pub const SIGNATURE_CAOL: u32 = 0x4C4F_4143;

pub const SIGNATURE_ITOL: u32 = 0x4C4F_5449;
pub const SIGNATURE_ITLS: u32 = 0x534C_5449;

// Classic CHM containers are always ITSF version 3; the Help2 inner ITSF
// block uses version 4.
pub const CHM_VERSION: u32 = 3;

// One entry of a header-section table: a (offset, size) pair relative to
// the container start.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderSection {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug)]
pub struct ChmHeader {
    pub header_sections: [HeaderSection; 2],
}

#[derive(Debug)]
pub struct Help2Header {
    pub header_sections: [HeaderSection; 5],
    pub num_dir_entries: u64,
}

// One directory listing entry: length-prefixed name followed by three
// self-delimiting integers.
fn read_dir_entry<R: Read>(r: &mut ByteReader<R>, db: &mut FilesDatabase) -> Result<()> {
    let name_len = r.read_enc_int()?;
    if name_len == 0 || name_len > MAX_NAME_LEN {
        return Err(Error::HeaderError);
    }
    let name = r.read_string(name_len)?;

    // Self-delimiting integers carry at most 63 bits, so offset + size
    // cannot wrap.
    let section = r.read_enc_int()?;
    let offset = r.read_enc_int()?;
    let size = r.read_enc_int()?;

    db.items.push(Item {
        name,
        section,
        offset,
        size,
    });
    Ok(())
}

// New-format listing records carry no usable item table; they are captured
// as a hex-dumped diagnostic instead.
fn read_new_format_entry<R: Read>(r: &mut ByteReader<R>, db: &mut FilesDatabase) -> Result<()> {
    let name_len = r.read_u16()?;
    if name_len == 0 {
        return Err(Error::HeaderError);
    }
    let name = r.read_ustring(u64::from(name_len))?;
    let tag = r.read_u8()?;
    let mut len = r.read_enc_int()?;

    let record = &mut db.new_format_string;
    record.push_str(&name);
    let _ = write!(record, " {:02X} ", tag);
    while len != 0 {
        len -= 1;
        let b = r.read_u8()?;
        let _ = write!(record, "{:02X}", b);
    }
    record.push_str("\r\n");
    Ok(())
}

// Fixed ITSF v3 header, minus the already-consumed signature and version.
pub fn read_chm_header<R: Read>(
    r: &mut ByteReader<R>,
    db: &mut FilesDatabase,
) -> Result<ChmHeader> {
    let header_size = r.read_u32()?;
    if header_size != 0x60 {
        return Err(Error::Malformed("ITSF header size"));
    }
    db.phys_size = u64::from(header_size);

    let unknown = r.read_u32()?;
    if unknown != 0 && unknown != 1 {
        return Err(Error::Malformed("ITSF reserved field"));
    }

    db.is_arc = true;

    r.read_u32()?; // timestamp
    r.read_u32()?; // language id
    r.read_guid()?;
    r.read_guid()?;

    let mut header_sections = [HeaderSection::default(); 2];
    for hs in header_sections.iter_mut() {
        hs.offset = r.read_u64()?;
        hs.size = r.read_u64()?;
        db.update_phys_size(hs.offset.saturating_add(hs.size));
    }

    db.content_offset = r.read_u64()?;

    Ok(ChmHeader { header_sections })
}

// Header section 0 of both dialects: a constant-prefixed block carrying
// the container's own idea of its file size.
pub fn read_file_size_section<R: Read>(
    r: &mut ByteReader<R>,
    size: u64,
    db: &mut FilesDatabase,
) -> Result<()> {
    if size < 0x18 {
        return Err(Error::HeaderError);
    }
    if r.read_u32()? != 0x01FE {
        return Err(Error::HeaderError);
    }
    r.read_u32()?; // 0

    let file_size = r.read_u64()?;
    db.update_phys_size(file_size);

    r.read_u32()?; // 0
    r.read_u32()?; // 0
    Ok(())
}

// Header section 1 of a classic CHM: ITSP directory header followed by
// equally-sized directory chunks. PMGL chunks list items; anything else is
// an index chunk and is skipped.
pub fn read_chm_directory<R: Read>(r: &mut ByteReader<R>, db: &mut FilesDatabase) -> Result<()> {
    if r.read_u32()? != SIGNATURE_ITSP {
        return Err(Error::HeaderError);
    }
    if r.read_u32()? != 1 {
        return Err(Error::HeaderError);
    }
    r.read_u32()?; // directory header length
    r.read_u32()?; // 0x0A

    let dir_chunk_size = u64::from(r.read_u32()?);
    if dir_chunk_size < 32 {
        return Err(Error::HeaderError);
    }

    r.read_u32()?; // quickref density
    r.read_u32()?; // depth of the index tree
    r.read_u32()?; // root index chunk number, or -1
    r.read_u32()?; // first listing chunk number
    r.read_u32()?; // last listing chunk number
    r.read_u32()?; // -1

    let num_dir_chunks = r.read_u32()?;

    r.read_u32()?; // windows language id
    r.read_guid()?;
    r.read_u32()?; // header length, again
    r.read_u32()?; // -1
    r.read_u32()?; // -1
    r.read_u32()?; // -1

    for _ in 0..num_dir_chunks {
        let chunk_pos = r.processed();
        if r.read_u32()? == SIGNATURE_PMGL {
            // The quickref area grows backwards from the end of the chunk;
            // its trailing u16 is the entry count.
            let quickref_len = u64::from(r.read_u32()?);
            if quickref_len > dir_chunk_size || quickref_len < 2 {
                return Err(Error::HeaderError);
            }
            r.read_u32()?; // 0
            r.read_u32()?; // previous listing chunk number
            r.read_u32()?; // next listing chunk number

            let mut num_items: u64 = 0;
            loop {
                let offset = r.processed() - chunk_pos;
                let limit = dir_chunk_size - quickref_len;
                if offset > limit {
                    return Err(Error::HeaderError);
                }
                if offset == limit {
                    break;
                }
                read_dir_entry(r, db)?;
                num_items += 1;
            }

            r.skip(quickref_len - 2)?;
            if u64::from(r.read_u16()?) != num_items {
                return Err(Error::HeaderError);
            }
        } else {
            r.skip(dir_chunk_size - 4)?;
        }
    }

    Ok(())
}

const HELP2_SIGNATURE_SIZE: u64 = 8;
const HELP2_SCAN_LIMIT: u64 = 1 << 18;

// Slides an 8-byte little-endian window over the stream until the paired
// ITOL/ITLS signature appears. Returns the signature offset relative to
// the scan start.
pub fn scan_help2_signature<R: Read>(r: &mut ByteReader<R>, limit: Option<u64>) -> Result<u64> {
    let signature = (u64::from(SIGNATURE_ITLS) << 32) | u64::from(SIGNATURE_ITOL);

    let mut bound = HELP2_SCAN_LIMIT;
    if let Some(limit) = limit {
        if bound > limit {
            bound = limit;
        }
    }

    let mut val: u64 = 0;
    loop {
        let b = match r.read_u8() {
            Ok(b) => b,
            Err(Error::UnexpectedEnd) => return Err(Error::Malformed("no ITOL/ITLS signature")),
            Err(e) => return Err(e),
        };
        val >>= 8;
        val |= u64::from(b) << 56;
        if r.processed() >= HELP2_SIGNATURE_SIZE {
            if val == signature {
                return Ok(r.processed() - HELP2_SIGNATURE_SIZE);
            }
            if r.processed() > bound {
                return Err(Error::Malformed("no ITOL/ITLS signature"));
            }
        }
    }
}

// ITOL/ITLS outer header, post-header directory information and the inner
// CAOL section, with the optional ITSF v4 block of classic Help2 files.
// The signature pair has already been consumed by the scan.
pub fn read_help2_header<R: Read>(
    r: &mut ByteReader<R>,
    db: &mut FilesDatabase,
) -> Result<Help2Header> {
    if r.read_u32()? != 1 {
        return Err(Error::Malformed("ITOL version"));
    }
    if r.read_u32()? != 0x28 {
        return Err(Error::Malformed("header section table offset"));
    }
    if r.read_u32()? != 5 {
        return Err(Error::Malformed("header section count"));
    }

    db.is_arc = true;

    r.read_u32()?; // post-header table length
    r.read_guid()?;

    let mut header_sections = [HeaderSection::default(); 5];
    for hs in header_sections.iter_mut() {
        hs.offset = r.read_u64()?;
        hs.size = r.read_u64()?;
        db.update_phys_size(hs.offset.saturating_add(hs.size));
    }

    // Post-header: directory information.
    r.read_u32()?; // 2
    r.read_u32()?; // offset of CAOL within the post-header
    r.read_u64()?; // top-level AOLI chunk number, or -1
    r.read_u64()?; // first AOLL chunk number
    r.read_u64()?; // last AOLL chunk number
    r.read_u64()?; // 0
    r.read_u32()?; // directory chunk size
    r.read_u32()?; // quickref density
    r.read_u32()?; // 0
    r.read_u32()?; // depth of the directory index tree
    r.read_u64()?; // 0

    let num_dir_entries = r.read_u64()?;

    // Directory index information; the index itself is not needed for
    // listing, every field is positional only.
    r.read_u64()?; // top-level AOLI chunk number, or -1
    r.read_u64()?; // first AOLL chunk number
    r.read_u64()?; // last AOLL chunk number
    r.read_u64()?; // 0
    r.read_u32()?; // index chunk size
    r.read_u32()?; // quickref density
    r.read_u32()?; // 0
    r.read_u32()?; // depth
    r.read_u64()?; // flags
    r.read_u64()?; // number of directory index entries
    r.read_u32()?; // directory size bound
    r.read_u32()?; // directory index size bound
    r.read_u64()?; // 0

    if r.read_u32()? != SIGNATURE_CAOL {
        return Err(Error::HeaderError);
    }
    if r.read_u32()? != 2 {
        return Err(Error::HeaderError);
    }
    let caol_len = r.read_u32()?;
    if caol_len != 0x2C && caol_len != 0x50 {
        return Err(Error::HeaderError);
    }

    r.read_u16()?; // compiler id, 'HH' in most files
    r.read_u16()?; // 0
    r.read_u32()?;
    r.read_u32()?; // directory chunk size, again
    r.read_u32()?; // index chunk size, again
    r.read_u32()?; // directory size bound, again
    r.read_u32()?; // directory index size bound, again
    r.read_u32()?; // 0
    r.read_u32()?; // 0

    if caol_len == 0x2C {
        db.new_format = true;
        db.content_offset = 0;
    } else {
        r.read_u32()?; // 0
        if r.read_u32()? != SIGNATURE_ITSF {
            return Err(Error::HeaderError);
        }
        if r.read_u32()? != 4 {
            return Err(Error::HeaderError);
        }
        if r.read_u32()? != 0x20 {
            return Err(Error::HeaderError);
        }
        let unknown = r.read_u32()?;
        if unknown != 0 && unknown != 1 {
            return Err(Error::HeaderError);
        }
        db.content_offset = db.start_position.saturating_add(r.read_u64()?);
        r.read_u32()?; // timestamp
        r.read_u32()?; // language id
    }

    Ok(Help2Header {
        header_sections,
        num_dir_entries,
    })
}

// Header section 1 of a Help2 container: IFCM directory header followed by
// AOLL listing chunks. The declared total entry count must be consumed
// exactly.
pub fn read_help2_directory<R: Read>(
    r: &mut ByteReader<R>,
    db: &mut FilesDatabase,
    mut num_dir_entries: u64,
) -> Result<()> {
    if r.read_u32()? != SIGNATURE_IFCM {
        return Err(Error::HeaderError);
    }
    if r.read_u32()? != 1 {
        return Err(Error::HeaderError);
    }

    let dir_chunk_size = u64::from(r.read_u32()?);
    if dir_chunk_size < 64 {
        return Err(Error::HeaderError);
    }

    r.read_u32()?; // 0x100000
    r.read_u32()?; // -1
    r.read_u32()?; // -1

    let num_dir_chunks = r.read_u32()?;
    r.read_u32()?; // high dword of the chunk count

    for _ in 0..num_dir_chunks {
        let chunk_pos = r.processed();
        if r.read_u32()? == SIGNATURE_AOLL {
            let quickref_len = u64::from(r.read_u32()?);
            if quickref_len > dir_chunk_size || quickref_len < 2 {
                return Err(Error::HeaderError);
            }
            r.read_u64()?; // chunk number, matches physical position
            r.read_u64()?; // previous listing chunk number
            r.read_u64()?; // next listing chunk number
            r.read_u64()?; // number of the first listing entry in this chunk
            r.read_u32()?; // 1
            r.read_u32()?; // 0

            let mut num_items: u64 = 0;
            loop {
                let offset = r.processed() - chunk_pos;
                let limit = dir_chunk_size - quickref_len;
                if offset > limit {
                    return Err(Error::HeaderError);
                }
                if offset == limit {
                    break;
                }
                if db.new_format {
                    read_new_format_entry(r, db)?;
                } else {
                    read_dir_entry(r, db)?;
                }
                num_items += 1;
            }

            r.skip(quickref_len - 2)?;
            if u64::from(r.read_u16()?) != num_items {
                return Err(Error::HeaderError);
            }
            if num_items > num_dir_entries {
                return Err(Error::HeaderError);
            }
            num_dir_entries -= num_items;
        } else {
            r.skip(dir_chunk_size - 4)?;
        }
    }

    if num_dir_entries != 0 {
        return Err(Error::HeaderError);
    }
    Ok(())
}
