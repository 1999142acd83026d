//! Access to the bytes of a LAS file.
//!
//! The codec itself never opens files. Everything it reads or writes goes through
//! these traits, which are implemented for anything that is `Read + Seek` or
//! `Write + Seek` (files, cursors over in-memory buffers, ...).

use std::io::{Read, Seek, SeekFrom, Write};

/// A byte stream, that can supply bytes at a given (absolute) offset.
pub trait ReadAt {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()>;

    fn read_vec_at(&mut self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// A byte stream, that accepts bytes at a given (absolute) offset.
pub trait WriteAt {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> std::io::Result<()>;
}

impl<T> ReadAt for T
where
    T: Read + Seek,
{
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

impl<T> WriteAt for T
where
    T: Write + Seek,
{
    fn write_at(&mut self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(data)
    }
}
