use std::io::{Read, Seek, SeekFrom};

use crate::database::FilesDatabase;
use crate::errors::{Error, Result};
use crate::headers;
use crate::reader::{open_window, ByteReader};
use crate::sections::read_high_level;

// Top-level entry point. The dialect is chosen up front: classic CHM
// containers start with their signature, Help2 containers are located by a
// bounded scan.
pub struct InArchive {
    help2: bool,
}

impl InArchive {
    pub fn new(help2: bool) -> Self {
        Self { help2 }
    }

    // Parses the container into `db`. Once the dialect is recognized,
    // malformed or truncated data is reported through the database flags
    // and the call still succeeds with whatever was parsed; only
    // unrecognized input and I/O failures produce an error.
    pub fn open<S: Read + Seek>(
        &self,
        source: &mut S,
        search_header_size_limit: Option<u64>,
        db: &mut FilesDatabase,
    ) -> Result<()> {
        db.clear();
        db.help2_format = self.help2;
        db.start_position = source.seek(SeekFrom::Current(0))?;

        match self.open_low_level(source, search_header_size_limit, db) {
            // New-format directories carry no item table to resolve.
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(Error::UnexpectedEnd) if db.is_arc => {
                db.unexpected_end = true;
                return Ok(());
            }
            Err(Error::HeaderError) if db.is_arc => {
                db.headers_error = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        // Listing must survive a broken metadata filesystem: every
        // high-level failure short of I/O is downgraded to a flag.
        match read_high_level(source, db) {
            Ok(()) => {
                db.low_level = false;
                Ok(())
            }
            Err(Error::Malformed(_)) => {
                db.high_level_clear();
                db.unsupported_feature = true;
                Ok(())
            }
            Err(Error::UnexpectedEnd) => {
                db.high_level_clear();
                db.unexpected_end = true;
                Ok(())
            }
            Err(Error::HeaderError) => {
                db.high_level_clear();
                db.headers_error = true;
                Ok(())
            }
            Err(e) => {
                db.high_level_clear();
                Err(e)
            }
        }
    }

    // Low-level pass: recognize the dialect, read its headers and walk the
    // directory chunks into the raw item table. Returns true when a
    // new-format directory was read and high-level parsing must not run.
    fn open_low_level<S: Read + Seek>(
        &self,
        source: &mut S,
        search_header_size_limit: Option<u64>,
        db: &mut FilesDatabase,
    ) -> Result<bool> {
        if self.help2 {
            let header = {
                let mut r = ByteReader::new(source.by_ref());
                let found_at = headers::scan_help2_signature(&mut r, search_header_size_limit)?;
                db.start_position += found_at;
                headers::read_help2_header(&mut r, db)?
            };

            {
                let section = header.header_sections[0];
                let pos = db.start_position.saturating_add(section.offset);
                let mut w = open_window(source, pos, section.size)?;
                headers::read_file_size_section(&mut w, section.size, db)?;
            }
            {
                let section = header.header_sections[1];
                let pos = db.start_position.saturating_add(section.offset);
                let mut w = open_window(source, pos, section.size)?;
                headers::read_help2_directory(&mut w, db, header.num_dir_entries)?;
            }

            Ok(db.new_format)
        } else {
            let header = {
                let mut r = ByteReader::new(source.by_ref());
                if r.read_u32()? != headers::SIGNATURE_ITSF {
                    return Err(Error::Malformed("no ITSF signature"));
                }
                if r.read_u32()? != headers::CHM_VERSION {
                    return Err(Error::Malformed("unsupported ITSF version"));
                }
                headers::read_chm_header(&mut r, db)?
            };

            {
                let section = header.header_sections[0];
                let mut w = open_window(source, section.offset, section.size)?;
                headers::read_file_size_section(&mut w, section.size, db)?;
            }
            {
                let section = header.header_sections[1];
                let mut w = open_window(source, section.offset, section.size)?;
                headers::read_chm_directory(&mut w, db)?;
            }

            Ok(false)
        }
    }
}
