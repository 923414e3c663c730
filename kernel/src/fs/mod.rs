//! Read-only reader for the embedded filesystem image.
//!
//! Layout follows `original_source/student-distrib/file_system.c`/`.h`
//! one-for-one: a boot block (dentry count/inode count/data-block count,
//! then up to 63 64-byte dentries), followed by one 4 KiB block per inode,
//! followed by the data blocks themselves. Two behaviors are deliberately
//! *not* carried over from the original: `lookup_by_index` bounds against
//! the dentry count rather than the inode count, and `read_data` walks
//! `offset / BLOCK_SIZE` / `offset % BLOCK_SIZE` directly instead of the
//! original's `FILE_SYS_OFFSET`-gated stride workaround.

use spin::Once;

use crate::{
    config,
    error::{FsError, KernelResult},
};

/// On-disk file-type tag, matching `RTC_TYPE`/`DIRECTORY_TYPE`/`REG_FILE_TYPE`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileType {
    Rtc,
    Directory,
    Regular,
}

impl FileType {
    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Rtc),
            1 => Some(Self::Directory),
            2 => Some(Self::Regular),
            _ => None,
        }
    }
}

/// A directory entry, copied out of the boot block by value.
#[derive(Clone, Copy)]
pub struct Dentry {
    pub name: [u8; config::NAME_LEN],
    pub name_len: usize,
    pub file_type: FileType,
    pub inode: u32,
}

#[repr(C)]
struct RawDentry {
    name: [u8; config::NAME_LEN],
    file_type: u32,
    inode: u32,
    reserved: [u8; 24],
}

#[repr(C)]
struct RawBootBlock {
    num_dentries: u32,
    num_inodes: u32,
    num_data_blocks: u32,
    reserved: [u8; 52],
    dentries: [RawDentry; config::MAX_DENTRIES],
}

#[repr(C)]
struct RawInode {
    size: u32,
    blocks: [u32; config::MAX_INODE_BLOCKS],
}

/// Base pointer plus the two counts read out of the boot block once at
/// mount time, so every later lookup avoids re-reading them.
struct FsImage {
    base: usize,
    num_dentries: u32,
    num_inodes: u32,
}

impl FsImage {
    fn boot_block(&self) -> &RawBootBlock {
        // SAFETY: `base` points at a boot block validated at mount time,
        // for the image's read-only lifetime.
        unsafe { &*(self.base as *const RawBootBlock) }
    }

    fn inode(&self, index: u32) -> &RawInode {
        let addr = self.base + config::BLOCK_SIZE + index as usize * config::BLOCK_SIZE;
        // SAFETY: caller has checked `index < self.num_inodes`.
        unsafe { &*(addr as *const RawInode) }
    }

    fn data_block(&self, index: u32) -> &[u8; config::BLOCK_SIZE] {
        let addr = self.base
            + config::BLOCK_SIZE
            + self.num_inodes as usize * config::BLOCK_SIZE
            + index as usize * config::BLOCK_SIZE;
        // SAFETY: `index` came out of a block-index slot inside a valid
        // inode, which the image's builder never populates out of range.
        unsafe { &*(addr as *const [u8; config::BLOCK_SIZE]) }
    }

    fn copy_out(raw: &RawDentry) -> Option<Dentry> {
        let file_type = FileType::from_raw(raw.file_type)?;
        let name_len = raw
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(config::NAME_LEN);
        Some(Dentry {
            name: raw.name,
            name_len,
            file_type,
            inode: raw.inode,
        })
    }

    fn lookup_by_name(&self, name: &[u8]) -> KernelResult<Dentry> {
        let mut query = name;
        if let Some(&b'\n') = query.last() {
            query = &query[..query.len() - 1];
        }
        let query_len = query
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(query.len())
            .min(config::NAME_LEN);
        let query = &query[..query_len];

        let block = self.boot_block();
        for raw in block.dentries.iter().take(block.num_dentries as usize) {
            let Some(dentry) = Self::copy_out(raw) else {
                continue;
            };
            if dentry.name_len == query.len() && &dentry.name[..dentry.name_len] == query {
                return Ok(dentry);
            }
        }
        Err(FsError::NotFound.into())
    }

    fn lookup_by_index(&self, index: u32) -> KernelResult<Dentry> {
        let block = self.boot_block();
        if index >= block.num_dentries {
            return Err(FsError::BadIndex.into());
        }
        Self::copy_out(&block.dentries[index as usize]).ok_or_else(|| FsError::BadIndex.into())
    }

    fn file_size(&self, inode_index: u32) -> KernelResult<u32> {
        if inode_index >= self.num_inodes {
            return Err(FsError::BadIndex.into());
        }
        Ok(self.inode(inode_index).size)
    }

    fn read_data(&self, inode_index: u32, offset: u32, buf: &mut [u8]) -> KernelResult<usize> {
        if inode_index >= self.num_inodes {
            return Err(FsError::BadIndex.into());
        }
        let node = self.inode(inode_index);
        if offset >= node.size {
            return Ok(0);
        }

        let remaining_in_file = (node.size - offset) as usize;
        let to_read = buf.len().min(remaining_in_file);

        let mut block_cursor = (offset as usize) / config::BLOCK_SIZE;
        let mut byte_cursor = (offset as usize) % config::BLOCK_SIZE;
        let mut written = 0usize;

        while written < to_read {
            let block_index = *node.blocks.get(block_cursor).ok_or(FsError::BadBlock)?;
            let block = self.data_block(block_index);
            let take = (config::BLOCK_SIZE - byte_cursor).min(to_read - written);
            buf[written..written + take]
                .copy_from_slice(&block[byte_cursor..byte_cursor + take]);
            written += take;
            byte_cursor = 0;
            block_cursor += 1;
        }

        Ok(written)
    }
}

// SAFETY: the image is a read-only boot module mapped for the kernel's
// entire lifetime; no mutation ever happens through `base`.
unsafe impl Send for FsImage {}
unsafe impl Sync for FsImage {}

static IMAGE: Once<FsImage> = Once::new();

fn image() -> &'static FsImage {
    IMAGE
        .get()
        .expect("fs::init must run before any fs:: call")
}

/// Records the physical base address of the filesystem boot module. Must run
/// once, before any other `fs::` call, after the address has been resolved
/// from the multiboot module table.
pub fn init(base: u32) {
    IMAGE.call_once(|| {
        // SAFETY: `base` is the physical address of the first multiboot
        // module, already validated by the caller to exist.
        let boot_block = unsafe { &*(base as *const RawBootBlock) };
        FsImage {
            base: base as usize,
            num_dentries: boot_block.num_dentries,
            num_inodes: boot_block.num_inodes,
        }
    });
}

/// Compares `name` (NUL- or newline-terminated, trailing newline stripped)
/// against the boot-block dentry array. Requires an exact length match so a
/// shorter stored name never matches as a prefix of a longer query.
pub fn lookup_by_name(name: &[u8]) -> KernelResult<Dentry> {
    image().lookup_by_name(name)
}

/// Bounds-checked copy-out of dentry `index`, bounded by the dentry count
/// (not the inode count, unlike the original).
pub fn lookup_by_index(index: u32) -> KernelResult<Dentry> {
    image().lookup_by_index(index)
}

/// Returns the byte length of file `inode_index`, or an error if out of
/// range.
pub fn file_size(inode_index: u32) -> KernelResult<u32> {
    image().file_size(inode_index)
}

/// Reads up to `buf.len()` bytes from file `inode_index` starting at byte
/// `offset`, clamped to the file's size. Returns the number of bytes
/// written; 0 if `offset >= size`.
pub fn read_data(inode_index: u32, offset: u32, buf: &mut [u8]) -> KernelResult<usize> {
    image().read_data(inode_index, offset, buf)
}

/// `dir_read`'s per-call semantics: given the open-file slot's current
/// cursor (a dentry index), copies the next filename into `buf` and
/// returns the number of bytes copied, or 0 once past the last dentry.
pub fn dir_read_at(cursor: u32, buf: &mut [u8]) -> usize {
    match lookup_by_index(cursor) {
        Ok(dentry) => {
            let len = dentry.name_len.min(buf.len());
            buf[..len].copy_from_slice(&dentry.name[..len]);
            len
        }
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::vec::Vec;

    /// Builds a boot-block-plus-inodes-plus-data image entirely in a `Vec`,
    /// for exercising the lookup/stride arithmetic under the hosted test
    /// target without any real boot module.
    struct TestImage {
        bytes: Vec<u8>,
        num_inodes: u32,
    }

    impl TestImage {
        fn new(names_and_types: &[(&[u8], u32)]) -> Self {
            let dentries_off = 4 + 4 + 4 + 52;
            let data_off = dentries_off + config::MAX_DENTRIES * core::mem::size_of::<RawDentry>();
            let mut bytes = std::vec![0u8; data_off];
            bytes[0..4].copy_from_slice(&(names_and_types.len() as u32).to_le_bytes());
            bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
            for (i, (name, ty)) in names_and_types.iter().enumerate() {
                let off = dentries_off + i * core::mem::size_of::<RawDentry>();
                bytes[off..off + name.len()].copy_from_slice(name);
                let type_off = off + config::NAME_LEN;
                bytes[type_off..type_off + 4].copy_from_slice(&ty.to_le_bytes());
            }
            Self { bytes, num_inodes: 0 }
        }

        fn append_file(&mut self, data: &[u8]) -> u32 {
            let inode_index = self.num_inodes;
            let num_blocks = data.len().div_ceil(config::BLOCK_SIZE);
            let inode_off = self.bytes.len();
            self.bytes
                .resize(inode_off + core::mem::size_of::<RawInode>(), 0);
            self.bytes[inode_off..inode_off + 4].copy_from_slice(&(data.len() as u32).to_le_bytes());

            let first_block = self.num_inodes; // arbitrary distinct block numbering for the test
            for b in 0..num_blocks {
                let block_num = first_block * 16 + b as u32 + 1;
                let off_field = inode_off + 4 + b * 4;
                self.bytes[off_field..off_field + 4].copy_from_slice(&block_num.to_le_bytes());

                let chunk_start = b * config::BLOCK_SIZE;
                let chunk_end = (chunk_start + config::BLOCK_SIZE).min(data.len());
                let mut block_bytes = std::vec![0u8; config::BLOCK_SIZE];
                block_bytes[..chunk_end - chunk_start].copy_from_slice(&data[chunk_start..chunk_end]);

                let block_base = self.data_base_offset(block_num);
                if self.bytes.len() < block_base + config::BLOCK_SIZE {
                    self.bytes.resize(block_base + config::BLOCK_SIZE, 0);
                }
                self.bytes[block_base..block_base + config::BLOCK_SIZE]
                    .copy_from_slice(&block_bytes);
            }
            self.num_inodes += 1;
            inode_index
        }

        fn data_base_offset(&self, block_num: u32) -> usize {
            let dentries_off = 4 + 4 + 4 + 52;
            let inode_region = dentries_off + config::MAX_DENTRIES * core::mem::size_of::<RawDentry>();
            inode_region + 64 * core::mem::size_of::<RawInode>() + block_num as usize * config::BLOCK_SIZE
        }

        fn image(&self) -> FsImage {
            FsImage {
                base: self.bytes.as_ptr() as usize,
                num_dentries: u32::from_le_bytes(self.bytes[0..4].try_into().unwrap()),
                num_inodes: self.num_inodes,
            }
        }
    }

    #[test]
    fn name_length_must_match_exactly() {
        let img = TestImage::new(&[(b"frame0.txt", 2)]);
        let fs = img.image();
        assert!(fs.lookup_by_name(b"frame0.tx").is_err());
        assert!(fs.lookup_by_name(b"frame0.txt").is_ok());
    }

    #[test]
    fn lookup_by_index_bounds_against_dentry_count() {
        let img = TestImage::new(&[(b"a", 2)]);
        let fs = img.image();
        assert!(fs.lookup_by_index(0).is_ok());
        assert!(fs.lookup_by_index(1).is_err());
    }

    #[test]
    fn read_data_clamps_to_remaining_file_size() {
        let mut img = TestImage::new(&[(b"f", 2)]);
        let data: Vec<u8> = (0u8..=255).cycle().take(5000).collect();
        let inode = img.append_file(&data);
        let fs = img.image();

        let mut buf = [0u8; 4096];
        let n = fs.read_data(inode, 0, &mut buf).unwrap();
        assert_eq!(n, 4096);
        assert_eq!(&buf[..n], &data[..4096]);

        let mut buf2 = [0u8; 4096];
        let n2 = fs.read_data(inode, 4096, &mut buf2).unwrap();
        assert_eq!(n2, 5000 - 4096);
        assert_eq!(&buf2[..n2], &data[4096..5000]);

        let mut buf3 = [0u8; 16];
        let n3 = fs.read_data(inode, 5000, &mut buf3).unwrap();
        assert_eq!(n3, 0);
    }

    #[test]
    fn read_data_rejects_out_of_range_inode() {
        let img = TestImage::new(&[(b"f", 2)]);
        let fs = img.image();
        let mut buf = [0u8; 16];
        assert!(fs.read_data(0, 0, &mut buf).is_err());
    }
}
