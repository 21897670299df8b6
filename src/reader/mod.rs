use std::io::{BufReader, Read, Seek, SeekFrom, Take};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::errors::{Error, Result};
use crate::guid::Guid;

// Buffer in front of the caller's source; matches the chunk granularity the
// directory is read with.
const BUFFER_CAPACITY: usize = 1 << 14;

// Names are bounded to 8 KiB after decoding their length prefix.
pub const MAX_NAME_LEN: u64 = 1 << 13;

// Little-endian primitive reader over any byte stream. Every read is
// counted, so chunk-relative offsets can be recovered with processed().
pub struct ByteReader<R: Read> {
    inner: BufReader<R>,
    processed: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::with_capacity(BUFFER_CAPACITY, inner),
            processed: 0,
        }
    }

    // Bytes consumed since this reader (or window) was opened.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.inner.read_u8()?;
        self.processed += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let v = self.inner.read_u16::<LittleEndian>()?;
        self.processed += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>()?;
        self.processed += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self.inner.read_u64::<LittleEndian>()?;
        self.processed += 8;
        Ok(v)
    }

    // Self-delimiting integer: 7 bits per byte, MSB set on continuation
    // bytes, most significant group first. At most 9 bytes (63 bits).
    pub fn read_enc_int(&mut self) -> Result<u64> {
        let mut val: u64 = 0;

        for _ in 0..9 {
            let b = self.read_u8()?;
            val |= u64::from(b & 0x7F);
            if b < 0x80 {
                return Ok(val);
            }
            val <<= 7;
        }

        Err(Error::HeaderError)
    }

    pub fn read_guid(&mut self) -> Result<Guid> {
        let data1 = self.read_u32()?;
        let data2 = self.read_u16()?;
        let data3 = self.read_u16()?;

        let mut data4 = [0u8; 8];
        self.inner.read_exact(&mut data4)?;
        self.processed += 8;

        Ok(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }

    // Reads exactly `size` bytes. The allocation grows with the data
    // actually present, so a hostile length fails with UnexpectedEnd before
    // it can reserve the full amount.
    pub fn read_bytes(&mut self, size: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let got = self.inner.by_ref().take(size).read_to_end(&mut buf)?;

        self.processed += got as u64;

        if (got as u64) < size {
            return Err(Error::UnexpectedEnd);
        }

        Ok(buf)
    }

    // Consumes exactly `size` bytes; the result is the prefix up to the
    // first NUL, decoded as UTF-8.
    pub fn read_string(&mut self, size: u64) -> Result<String> {
        let mut buf = self.read_bytes(size)?;

        if let Some(pos) = buf.iter().position(|&b| b == 0) {
            buf.truncate(pos);
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    // Consumes exactly `size` UTF-16LE code units; the result is the prefix
    // up to the first zero unit.
    pub fn read_ustring(&mut self, size: u64) -> Result<String> {
        let mut units = Vec::new();
        let mut remaining = size;

        while remaining != 0 {
            remaining -= 1;
            let c = self.read_u16()?;
            if c == 0 {
                self.skip(2 * remaining)?;
                break;
            }
            units.push(c);
        }

        Ok(String::from_utf16_lossy(&units))
    }

    pub fn skip(&mut self, size: u64) -> Result<()> {
        let mut scratch = [0u8; 256];
        let mut remaining = size;

        while remaining != 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            self.inner.read_exact(&mut scratch[..want])?;
            self.processed += want as u64;
            remaining -= want as u64;
        }

        Ok(())
    }
}

// Seeks the source to `pos` and returns a reader limited to exactly `size`
// bytes. The window borrows the source for its lifetime, so a new window
// can only be opened once the previous one is dropped.
pub fn open_window<S: Read + Seek>(
    source: &mut S,
    pos: u64,
    size: u64,
) -> Result<ByteReader<Take<&mut S>>> {
    source.seek(SeekFrom::Start(pos))?;

    Ok(ByteReader::new(source.by_ref().take(size)))
}
