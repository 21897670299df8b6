// Synthetic container images for the integration tests. The builders mirror
// the on-disk layout one field at a time so individual fields can be broken
// deliberately.

#![allow(dead_code)]

pub const CHM_LZX_GUID_STR: &str = "{7FC28940-9D31-11D0-9B27-00A0C91E9C7C}";
pub const HELP2_LZX_GUID_STR: &str = "{0A9007C6-4076-11D3-8789-0000F8105754}";

pub struct Writer {
    pub buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    pub fn guid(&mut self, data1: u32, data2: u16, data3: u16, data4: [u8; 8]) {
        self.u32(data1);
        self.u16(data2);
        self.u16(data3);
        self.bytes(&data4);
    }

    pub fn utf16(&mut self, s: &str) {
        for unit in s.encode_utf16() {
            self.u16(unit);
        }
    }

    // 7-bit groups, most significant first, continuation bit on all but the
    // last byte.
    pub fn enc_int(&mut self, mut v: u64) {
        let mut groups = vec![(v & 0x7F) as u8];
        v >>= 7;
        while v != 0 {
            groups.push((v & 0x7F) as u8 | 0x80);
            v >>= 7;
        }
        groups.reverse();
        self.buf.extend_from_slice(&groups);
    }

    pub fn pad_to(&mut self, len: usize) {
        assert!(self.buf.len() <= len, "fixture overflowed its region");
        self.buf.resize(len, 0);
    }
}

#[derive(Clone)]
pub struct DirEntry {
    pub name: String,
    pub section: u64,
    pub offset: u64,
    pub size: u64,
}

impl DirEntry {
    pub fn new(name: &str, section: u64, offset: u64, size: u64) -> Self {
        Self {
            name: name.to_string(),
            section,
            offset,
            size,
        }
    }
}

fn entry_bytes(items: &[DirEntry]) -> Vec<u8> {
    let mut w = Writer::new();
    for item in items {
        w.enc_int(item.name.len() as u64);
        w.bytes(item.name.as_bytes());
        w.enc_int(item.section);
        w.enc_int(item.offset);
        w.enc_int(item.size);
    }
    w.buf
}

// The metadata filesystem of a single LZX-compressed section named
// "MSCompressed", laid out blob by blob into the content area.
struct DataSpace {
    content: Vec<u8>,
    items: Vec<DirEntry>,
}

fn build_data_space(
    help2: bool,
    corrupt_lzxc_magic: bool,
    uncompressed_size: u64,
    reset_offsets: &[u64],
) -> DataSpace {
    const COMPRESSED_SIZE: u64 = 0x20;

    let mut namelist = Writer::new();
    namelist.u16(0x1C);
    namelist.u16(2);
    for name in &["Uncompressed", "MSCompressed"] {
        namelist.u16(name.len() as u16);
        namelist.utf16(name);
        namelist.u16(0);
    }

    let mut transform_list = Writer::new();
    transform_list.guid(
        0x0A90_07C6,
        0x4076,
        0x11D3,
        [0x87, 0x89, 0x00, 0x00, 0xF8, 0x10, 0x57, 0x54],
    );

    let mut control = Writer::new();
    control.u32(6);
    control.bytes(if corrupt_lzxc_magic { b"XXXX" } else { b"LZXC" });
    control.u32(2); // version
    control.u32(2); // reset interval
    control.u32(2); // window size
    control.u32(2); // cache size
    control.u32(0); // trailing unknown dword

    let mut span = Writer::new();
    span.u64(uncompressed_size);

    let mut reset = Writer::new();
    if !(reset_offsets.is_empty() && uncompressed_size == 0) {
        reset.u32(2);
        reset.u32(reset_offsets.len() as u32);
        reset.u32(8);
        reset.u32(0x28);
        reset.u64(uncompressed_size);
        reset.u64(COMPRESSED_SIZE);
        reset.u64(0x8000);
        for &offset in reset_offsets {
            reset.u64(offset);
        }
    }

    let prefix = "::DataSpace/Storage/MSCompressed/";
    let lzx_guid = if help2 {
        HELP2_LZX_GUID_STR
    } else {
        CHM_LZX_GUID_STR
    };

    let mut content = Writer::new();
    let mut items = Vec::new();
    {
        let mut place = |name: String, blob: &[u8]| {
            items.push(DirEntry {
                name,
                section: 0,
                offset: content.len() as u64,
                size: blob.len() as u64,
            });
            content.bytes(blob);
        };

        place("::DataSpace/NameList".to_string(), &namelist.buf);
        place(
            format!("{}Content", prefix),
            &vec![0xCC; COMPRESSED_SIZE as usize],
        );
        if help2 {
            place(format!("{}Transform/List", prefix), &transform_list.buf);
        }
        place(format!("{}ControlData", prefix), &control.buf);
        place(format!("{}SpanInfo", prefix), &span.buf);
        place(
            format!("{}Transform/{}/InstanceData/ResetTable", prefix, lzx_guid),
            &reset.buf,
        );
    }

    DataSpace {
        content: content.buf,
        items,
    }
}

pub struct ChmImage {
    pub bytes: Vec<u8>,
    pub dir_offset: u64,
    pub content_offset: u64,
}

pub struct ChmBuilder {
    pub dir_chunk_size: u32,
    pub corrupt_lzxc_magic: bool,
    pub user_items: Vec<DirEntry>,
    pub uncompressed_size: u64,
    pub reset_offsets: Vec<u64>,

    // Replaces the encoded entry area of the listing chunk: raw bytes plus
    // the count declared in the quickref trailer.
    pub raw_dir_entries: Option<(Vec<u8>, u16)>,
}

impl Default for ChmBuilder {
    fn default() -> Self {
        Self {
            dir_chunk_size: 0x200,
            corrupt_lzxc_magic: false,
            user_items: vec![DirEntry::new("/x.htm", 1, 0, 5)],
            uncompressed_size: 5,
            reset_offsets: vec![0],
            raw_dir_entries: None,
        }
    }
}

impl ChmBuilder {
    pub fn build(&self) -> ChmImage {
        let data_space = build_data_space(
            false,
            self.corrupt_lzxc_magic,
            self.uncompressed_size,
            &self.reset_offsets,
        );

        let mut items = data_space.items.clone();
        items.extend(self.user_items.iter().cloned());

        let (entries, count) = match &self.raw_dir_entries {
            Some((raw, n)) => (raw.clone(), u64::from(*n)),
            None => (entry_bytes(&items), items.len() as u64),
        };

        let chunk_size = self.dir_chunk_size as usize;
        let quickref_len = chunk_size - 20 - entries.len();
        let mut chunk = Writer::new();
        chunk.bytes(b"PMGL");
        chunk.u32(quickref_len as u32);
        chunk.u32(0);
        chunk.u32(0xFFFF_FFFF); // previous listing chunk
        chunk.u32(0xFFFF_FFFF); // next listing chunk
        chunk.bytes(&entries);
        chunk.pad_to(chunk_size - 2);
        chunk.u16(count as u16);

        let sec0_off = 0x60u64;
        let sec0_size = 0x18u64;
        let sec1_off = sec0_off + sec0_size;
        let sec1_size = 0x54 + chunk_size as u64;
        let content_offset = sec1_off + sec1_size;
        let total = content_offset + data_space.content.len() as u64;

        let mut w = Writer::new();
        w.bytes(b"ITSF");
        w.u32(3);
        w.u32(0x60);
        w.u32(1);
        w.u32(0); // timestamp
        w.u32(0x0409); // language id
        w.bytes(&[0u8; 16]);
        w.bytes(&[0u8; 16]);
        w.u64(sec0_off);
        w.u64(sec0_size);
        w.u64(sec1_off);
        w.u64(sec1_size);
        w.u64(content_offset);
        assert_eq!(w.len(), 0x60);

        // Header section 0: the file-size block.
        w.u32(0x01FE);
        w.u32(0);
        w.u64(total);
        w.u32(0);
        w.u32(0);
        assert_eq!(w.len() as u64, sec1_off);

        // Header section 1: ITSP directory header plus one listing chunk.
        w.bytes(b"ITSP");
        w.u32(1);
        w.u32(0x54);
        w.u32(0x0A);
        w.u32(self.dir_chunk_size);
        w.u32(2); // quickref density
        w.u32(1); // index tree depth
        w.u32(0xFFFF_FFFF); // root index chunk
        w.u32(0); // first listing chunk
        w.u32(0); // last listing chunk
        w.u32(0xFFFF_FFFF);
        w.u32(1); // number of directory chunks
        w.u32(0x0409);
        w.bytes(&[0u8; 16]);
        w.u32(0x54);
        w.u32(0xFFFF_FFFF);
        w.u32(0xFFFF_FFFF);
        w.u32(0xFFFF_FFFF);
        assert_eq!(w.len() as u64, sec1_off + 0x54);

        w.bytes(&chunk.buf);
        assert_eq!(w.len() as u64, content_offset);

        w.bytes(&data_space.content);

        ChmImage {
            bytes: w.buf,
            dir_offset: sec1_off,
            content_offset,
        }
    }
}

pub struct Help2Image {
    pub bytes: Vec<u8>,
    pub start_position: u64,
}

pub struct Help2Builder {
    pub new_format: bool,
    pub prefix_junk: usize,
    pub dir_chunk_size: u32,
    pub user_items: Vec<DirEntry>,
    pub uncompressed_size: u64,
    pub reset_offsets: Vec<u64>,
    pub caol_len_override: Option<u32>,
}

impl Default for Help2Builder {
    fn default() -> Self {
        Self {
            new_format: false,
            prefix_junk: 0,
            dir_chunk_size: 0x200,
            user_items: vec![DirEntry::new("/y.htm", 1, 0, 5)],
            uncompressed_size: 5,
            reset_offsets: vec![0],
            caol_len_override: None,
        }
    }
}

impl Help2Builder {
    pub fn build(&self) -> Help2Image {
        let caol_len: u32 = if self.new_format { 0x2C } else { 0x50 };
        let caol_written = self.caol_len_override.unwrap_or(caol_len);

        let data_space = if self.new_format {
            DataSpace {
                content: Vec::new(),
                items: Vec::new(),
            }
        } else {
            build_data_space(true, false, self.uncompressed_size, &self.reset_offsets)
        };

        let mut items = data_space.items.clone();
        if !self.new_format {
            items.extend(self.user_items.iter().cloned());
        }

        // Entry area of the single AOLL chunk.
        let (entries, num_entries) = if self.new_format {
            let mut rec = Writer::new();
            rec.u16(4);
            rec.utf16("test");
            rec.u8(0x01);
            rec.enc_int(3);
            rec.bytes(&[0xAA, 0xBB, 0xCC]);
            (rec.buf, 1u64)
        } else {
            (entry_bytes(&items), items.len() as u64)
        };

        let chunk_size = self.dir_chunk_size as usize;
        let quickref_len = chunk_size - 48 - entries.len();
        let mut chunk = Writer::new();
        chunk.bytes(b"AOLL");
        chunk.u32(quickref_len as u32);
        chunk.u64(0); // chunk number
        chunk.u64(0xFFFF_FFFF_FFFF_FFFF); // previous listing chunk
        chunk.u64(0xFFFF_FFFF_FFFF_FFFF); // next listing chunk
        chunk.u64(0); // first listing entry number
        chunk.u32(1);
        chunk.u32(0);
        chunk.bytes(&entries);
        chunk.pad_to(chunk_size - 2);
        chunk.u16(num_entries as u16);

        // Start-relative layout.
        let caol_end = 0x110u64 + 44 + if caol_len == 0x50 { 36 } else { 0 };
        let sec0_off = caol_end;
        let sec0_size = 0x18u64;
        let sec1_off = sec0_off + sec0_size;
        let sec1_size = 32 + chunk_size as u64;
        let content_rel = sec1_off + sec1_size;

        let mut w = Writer::new();
        w.bytes(&vec![0u8; self.prefix_junk]);
        let start = w.len() as u64;

        w.bytes(b"ITOLITLS");
        w.u32(1);
        w.u32(0x28); // header section table offset
        w.u32(5);
        w.u32(0xC8); // post-header table length
        w.bytes(&[0u8; 16]);
        assert_eq!(w.len() as u64 - start, 0x28);

        w.u64(sec0_off);
        w.u64(sec0_size);
        w.u64(sec1_off);
        w.u64(sec1_size);
        for _ in 0..3 {
            w.u64(0);
            w.u64(0);
        }
        assert_eq!(w.len() as u64 - start, 0x78);

        // Post-header directory information.
        w.u32(2);
        w.u32(0x98);
        w.u64(0xFFFF_FFFF_FFFF_FFFF); // top-level AOLI chunk
        w.u64(0); // first AOLL chunk
        w.u64(0); // last AOLL chunk
        w.u64(0);
        w.u32(self.dir_chunk_size);
        w.u32(2); // quickref density
        w.u32(0);
        w.u32(1); // index tree depth
        w.u64(0);
        w.u64(num_entries);

        // Directory index information.
        w.u64(0xFFFF_FFFF_FFFF_FFFF);
        w.u64(0);
        w.u64(0);
        w.u64(0);
        w.u32(0x200);
        w.u32(2);
        w.u32(0);
        w.u32(1);
        w.u64(0);
        w.u64(0);
        w.u32(0x0010_0000);
        w.u32(0x0002_0000);
        w.u64(0);
        assert_eq!(w.len() as u64 - start, 0x110);

        w.bytes(b"CAOL");
        w.u32(2);
        w.u32(caol_written);
        w.u16(0x4848); // compiler id 'HH'
        w.u16(0);
        w.u32(0);
        w.u32(self.dir_chunk_size);
        w.u32(0x200);
        w.u32(0x0010_0000);
        w.u32(0x0002_0000);
        w.u32(0);
        w.u32(0);

        if caol_len == 0x50 {
            w.u32(0);
            w.bytes(b"ITSF");
            w.u32(4);
            w.u32(0x20);
            w.u32(1);
            w.u64(content_rel);
            w.u32(0); // timestamp
            w.u32(0x0409); // language id
        }
        assert_eq!(w.len() as u64 - start, caol_end);

        // Header section 0: the file-size block.
        w.u32(0x01FE);
        w.u32(0);
        w.u64(content_rel + data_space.content.len() as u64);
        w.u32(0);
        w.u32(0);
        assert_eq!(w.len() as u64 - start, sec1_off);

        // Header section 1: IFCM directory header plus one listing chunk.
        w.bytes(b"IFCM");
        w.u32(1);
        w.u32(self.dir_chunk_size);
        w.u32(0x0010_0000);
        w.u32(0xFFFF_FFFF);
        w.u32(0xFFFF_FFFF);
        w.u32(1); // number of directory chunks
        w.u32(0);
        assert_eq!(w.len() as u64 - start, sec1_off + 32);

        w.bytes(&chunk.buf);
        assert_eq!(w.len() as u64 - start, content_rel);

        w.bytes(&data_space.content);

        Help2Image {
            bytes: w.buf,
            start_position: start,
        }
    }
}
