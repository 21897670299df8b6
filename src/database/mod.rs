use std::cmp::Ordering;

use crate::sections::SectionInfo;

// One directory entry. Internal items begin with "::", user-visible items
// with "/". A name ending in "/" denotes a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,

    // Index into the content-section table; 0 is the uncompressed section.
    pub section: u64,

    // Offset within the owning section's content stream.
    pub offset: u64,

    pub size: u64,
}

impl Item {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_user_item(&self) -> bool {
        self.name.starts_with('/')
    }
}

// The aggregate produced by InArchive::open. Populated monotonically while
// parsing and treated as immutable afterwards.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilesDatabase {
    // Absolute offset of the detected signature in the input stream.
    pub start_position: u64,

    // Absolute offset of the content area.
    pub content_offset: u64,

    // Maximum observed end offset across header sections and the embedded
    // file-size field.
    pub phys_size: u64,

    // Items in directory order.
    pub items: Vec<Item>,

    // Content sections as named by the NameList; entry 0 carries no methods.
    pub sections: Vec<SectionInfo>,

    // Indices of user-visible items, in the finalizer's sort order.
    pub indices: Vec<usize>,

    pub help2_format: bool,
    pub new_format: bool,

    // Diagnostic dump of new-format directory records.
    pub new_format_string: String,

    // Result flags.
    pub is_arc: bool,
    pub low_level: bool,
    pub unsupported_feature: bool,
    pub headers_error: bool,
    pub unexpected_end: bool,
}

impl FilesDatabase {
    pub fn new() -> Self {
        let mut db = Self::default();
        db.low_level = true;
        db
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // Drops everything the high-level pass produced, leaving the raw item
    // listing intact.
    pub fn high_level_clear(&mut self) {
        self.low_level = true;
        self.sections.clear();
        self.indices.clear();
    }

    pub fn update_phys_size(&mut self, end: u64) {
        if self.phys_size < end {
            self.phys_size = end;
        }
    }

    // First item with exactly this name, in directory order.
    pub fn find_item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.name == name)
    }

    // Selects the user-visible items. Single-character names are reserved
    // entries, not files.
    pub fn set_indices(&mut self) {
        for (i, item) in self.items.iter().enumerate() {
            if item.is_user_item() && item.name.len() != 1 {
                self.indices.push(i);
            }
        }
    }

    // Directories first (kept in directory order); files by section, then
    // offset, then size, ties broken by directory order.
    pub fn sort(&mut self) {
        let items = &self.items;
        self.indices.sort_by(|&a, &b| {
            let item1 = &items[a];
            let item2 = &items[b];
            match (item1.is_dir(), item2.is_dir()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (true, true) => a.cmp(&b),
                (false, false) => item1
                    .section
                    .cmp(&item2.section)
                    .then(item1.offset.cmp(&item2.offset))
                    .then(item1.size.cmp(&item2.size))
                    .then(a.cmp(&b)),
            }
        });
    }

    // Files within one compressed section must not overlap in sorted order.
    pub fn check(&self) -> bool {
        let mut max_pos: u64 = 0;
        let mut prev_section: u64 = 0;

        for &index in &self.indices {
            let item = &self.items[index];
            if item.section == 0 || item.is_dir() {
                continue;
            }
            if item.section != prev_section {
                prev_section = item.section;
                max_pos = 0;
                continue;
            }
            if item.offset < max_pos {
                return false;
            }
            max_pos = match item.offset.checked_add(item.size) {
                Some(end) => end,
                None => return false,
            };
        }

        true
    }
}
