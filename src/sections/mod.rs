use std::convert::TryFrom;
use std::fmt::Write as FmtWrite;
use std::io::{Read, Seek, Take};

use num_enum::TryFromPrimitive;

use crate::database::FilesDatabase;
use crate::errors::{Error, Result};
use crate::guid::{Guid, CHM_LZX_GUID};
use crate::headers::SIGNATURE_LZXC;
use crate::reader::{open_window, ByteReader};

const NAME_LIST: &str = "::DataSpace/NameList";
const STORAGE: &str = "::DataSpace/Storage/";
const CONTENT: &str = "Content";
const CONTROL_DATA: &str = "ControlData";
const SPAN_INFO: &str = "SpanInfo";
const TRANSFORM: &str = "Transform/";
const TRANSFORM_LIST: &str = "List";
const RESET_TABLE: &str = "/InstanceData/ResetTable";

// LZX blocks are always 32 KiB.
const LZX_BLOCK_SIZE: u64 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum LzxVersion {
    V2 = 2,
    V3 = 3,
}

// Sparse map from uncompressed block boundaries to compressed-stream
// offsets; empty only for sections with no uncompressed data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetTable {
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub block_size: u64,
    pub reset_offsets: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LzxInfo {
    pub version: LzxVersion,

    // Each in units of 0x8000 bytes, power-of-two, at most 64.
    pub reset_interval: u32,
    pub window_size: u32,
    pub cache_size: u32,

    pub reset_table: ResetTable,
}

impl LzxInfo {
    // Dictionary size in bits; the window is stored in 32 KiB units.
    pub fn num_dict_bits(&self) -> u32 {
        15 + self.window_size.trailing_zeros()
    }
}

// One stage of a section's compression pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub guid: Guid,

    // Raw dwords for transforms we do not interpret.
    pub control_data: Vec<u8>,

    pub lzx: Option<LzxInfo>,
}

impl MethodInfo {
    pub fn new(guid: Guid) -> Self {
        Self {
            guid,
            control_data: Vec::new(),
            lzx: None,
        }
    }

    pub fn is_lzx(&self) -> bool {
        self.guid.is_lzx()
    }

    pub fn is_des(&self) -> bool {
        self.guid.is_des()
    }

    pub fn name(&self) -> String {
        if let Some(ref lzx) = self.lzx {
            return format!("LZX:{}", lzx.num_dict_bits());
        }
        if self.is_des() {
            return "DES".to_string();
        }

        let mut s = self.guid.to_string();
        if !self.control_data.is_empty() {
            s.push(':');
            for b in &self.control_data {
                let _ = write!(s, "{:02X}", b);
            }
        }
        s
    }
}

// One content section: a stream of stored bytes sharing a compression
// pipeline. Section 0 is the uncompressed stream holding the metadata
// items and never carries methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionInfo {
    pub name: String,

    // Offset of the section's stream within the content area.
    pub offset: u64,

    pub compressed_size: u64,
    pub uncompressed_size: u64,

    pub methods: Vec<MethodInfo>,
}

impl SectionInfo {
    // A section is addressable for extraction only when its whole pipeline
    // is a single LZX stage.
    pub fn is_lzx(&self) -> bool {
        self.methods.len() == 1 && self.methods[0].is_lzx()
    }

    pub fn method_name(&self) -> String {
        let mut s = String::new();
        if !self.is_lzx() {
            s.push_str(&self.name);
            s.push_str(": ");
        }
        for (i, method) in self.methods.iter().enumerate() {
            if i != 0 {
                s.push(' ');
            }
            s.push_str(&method.name());
        }
        s
    }
}

fn section_prefix(name: &str) -> String {
    format!("{}{}/", STORAGE, name)
}

// Positions a window over a metadata item's bytes within the content area.
// All ::DataSpace items live in section 0, which is stored uncompressed.
fn open_item_window<'a, S: Read + Seek>(
    source: &'a mut S,
    db: &FilesDatabase,
    name: &str,
    missing: &'static str,
) -> Result<(ByteReader<Take<&'a mut S>>, u64)> {
    let item = db.find_item(name).ok_or(Error::Malformed(missing))?;
    let pos = db
        .content_offset
        .checked_add(item.offset)
        .ok_or(Error::Malformed("item outside content area"))?;
    let size = item.size;

    Ok((open_window(source, pos, size)?, size))
}

fn check_lzx_param(v: u32, what: &'static str) -> Result<u32> {
    if v == 0 || v > 64 || !v.is_power_of_two() {
        return Err(Error::Malformed(what));
    }
    Ok(v)
}

fn read_name_list<S: Read + Seek>(source: &mut S, db: &mut FilesDatabase) -> Result<()> {
    let (mut r, _) = open_item_window(source, db, NAME_LIST, "missing NameList")?;

    r.read_u16()?; // length of the list in code units
    let num_sections = r.read_u16()?;

    let mut sections = Vec::with_capacity(num_sections as usize);
    for _ in 0..num_sections {
        let name_len = r.read_u16()?;
        let name = r.read_ustring(u64::from(name_len))?;
        if r.read_u16()? != 0 {
            return Err(Error::Malformed("NameList entry terminator"));
        }
        sections.push(SectionInfo {
            name,
            ..SectionInfo::default()
        });
    }

    db.sections = sections;
    Ok(())
}

fn read_transform_list<S: Read + Seek>(
    source: &mut S,
    db: &FilesDatabase,
    transform_prefix: &str,
) -> Result<Vec<MethodInfo>> {
    let name = format!("{}{}", transform_prefix, TRANSFORM_LIST);
    let (mut r, size) = open_item_window(source, db, &name, "missing Transform/List")?;

    if size & 0xF != 0 || size < 0x10 {
        return Err(Error::Malformed("Transform/List size"));
    }

    let mut methods = Vec::new();
    for _ in 0..size / 0x10 {
        methods.push(MethodInfo::new(r.read_guid()?));
    }
    Ok(methods)
}

fn read_control_data<S: Read + Seek>(
    source: &mut S,
    db: &FilesDatabase,
    prefix: &str,
    methods: &mut [MethodInfo],
) -> Result<()> {
    let name = format!("{}{}", prefix, CONTROL_DATA);
    let (mut r, _) = open_item_window(source, db, &name, "missing ControlData")?;

    for method in methods.iter_mut() {
        let num_dwords = r.read_u32()?;

        if method.is_lzx() {
            if num_dwords < 5 {
                return Err(Error::Malformed("LZX control data too short"));
            }
            if r.read_u32()? != SIGNATURE_LZXC {
                return Err(Error::Malformed("LZXC signature"));
            }

            let version = LzxVersion::try_from(r.read_u32()?)
                .map_err(|_| Error::Malformed("LZX version"))?;
            let reset_interval = check_lzx_param(r.read_u32()?, "LZX reset interval")?;
            let window_size = check_lzx_param(r.read_u32()?, "LZX window size")?;
            let cache_size = check_lzx_param(r.read_u32()?, "LZX cache size")?;

            r.skip(u64::from(num_dwords - 5) * 4)?;

            method.lzx = Some(LzxInfo {
                version,
                reset_interval,
                window_size,
                cache_size,
                reset_table: ResetTable::default(),
            });
        } else {
            method.control_data = r.read_bytes(u64::from(num_dwords) * 4)?;
        }
    }

    Ok(())
}

fn read_reset_table<S: Read + Seek>(
    source: &mut S,
    db: &FilesDatabase,
    name: &str,
    uncompressed_size: u64,
) -> Result<ResetTable> {
    let (mut r, size) = open_item_window(source, db, name, "missing ResetTable")?;

    if size < 4 {
        if size != 0 {
            return Err(Error::Malformed("truncated ResetTable"));
        }
        // Index-only containers store no reset table.
        if uncompressed_size != 0 {
            return Err(Error::Malformed("empty ResetTable for non-empty section"));
        }
        return Ok(ResetTable::default());
    }

    let version = r.read_u32()?;
    if version != 2 && version != 3 {
        return Err(Error::Malformed("ResetTable version"));
    }
    let num_entries = r.read_u32()?;
    if r.read_u32()? != 8 {
        return Err(Error::Malformed("ResetTable entry size"));
    }
    if r.read_u32()? != 0x28 {
        return Err(Error::Malformed("ResetTable header length"));
    }

    let mut table = ResetTable::default();
    table.uncompressed_size = r.read_u64()?;
    table.compressed_size = r.read_u64()?;
    table.block_size = r.read_u64()?;
    if table.block_size != LZX_BLOCK_SIZE {
        return Err(Error::Malformed("ResetTable block size"));
    }

    // A count that cannot fit in the item would only fail mid-read; reject
    // it against the declared item size up front.
    if u64::from(num_entries) * 8 > size - 0x28 {
        return Err(Error::UnexpectedEnd);
    }
    for _ in 0..num_entries {
        table.reset_offsets.push(r.read_u64()?);
    }

    Ok(table)
}

// High-level pass: interprets the ::DataSpace metadata filesystem that the
// low-level item table points at, filling the per-section compression
// descriptors, then finalizes the user-visible file list.
pub fn read_high_level<S: Read + Seek>(source: &mut S, db: &mut FilesDatabase) -> Result<()> {
    read_name_list(source, db)?;

    for i in 1..db.sections.len() {
        let prefix = section_prefix(&db.sections[i].name);
        let transform_prefix = format!("{}{}", prefix, TRANSFORM);

        {
            let name = format!("{}{}", prefix, CONTENT);
            let item = db
                .find_item(&name)
                .ok_or(Error::Malformed("missing Content item"))?;
            let (offset, size) = (item.offset, item.size);
            db.sections[i].offset = offset;
            db.sections[i].compressed_size = size;
        }

        let mut methods = if db.help2_format {
            read_transform_list(source, db, &transform_prefix)?
        } else {
            vec![MethodInfo::new(*CHM_LZX_GUID)]
        };

        read_control_data(source, db, &prefix, &mut methods)?;

        {
            let name = format!("{}{}", prefix, SPAN_INFO);
            let (mut r, _) = open_item_window(source, db, &name, "missing SpanInfo")?;
            db.sections[i].uncompressed_size = r.read_u64()?;
        }
        let uncompressed_size = db.sections[i].uncompressed_size;

        for method in methods.iter_mut() {
            let name = format!("{}{}{}", transform_prefix, method.guid, RESET_TABLE);
            if let Some(ref mut lzx) = method.lzx {
                lzx.reset_table = read_reset_table(source, db, &name, uncompressed_size)?;
            }
        }

        db.sections[i].methods = methods;
    }

    db.set_indices();
    db.sort();
    if !db.check() {
        return Err(Error::Malformed("overlapping content items"));
    }

    Ok(())
}
