//! Sparse Range Files
//!
//! A [`SparseFile`] is a logical byte array of fixed maximum size in which
//! only explicitly written regions are stored. Unwritten regions read back
//! as zero and take no memory.
//!
//! Written data is held as disjoint, non-adjacent extents keyed by their
//! start offset. Range listings round every extent outward to the alignment
//! unit and merge the rounded intervals that touch.

use bytes::Bytes;
use std::collections::BTreeMap;

use crate::errors::{FileShareError, Result};
use crate::protocol::{check_file_size, check_range, coalesce_ranges};
use crate::types::{FileRange, FILE_RANGE_ALIGNMENT};

/// A fixed-size file that persists only its written ranges
#[derive(Debug, Clone)]
pub struct SparseFile {
    max_size: u64,
    alignment: u64,
    extents: BTreeMap<u64, Vec<u8>>,
}

impl SparseFile {
    /// Creates an empty file whose address space is `[0, max_size)`
    ///
    /// Fails with `InvalidSize` when `max_size` is zero or above
    /// [`MAX_FILE_SIZE`](crate::MAX_FILE_SIZE).
    pub fn new(max_size: u64) -> Result<Self> {
        Self::with_alignment(max_size, FILE_RANGE_ALIGNMENT)
    }

    /// Creates an empty file that reports ranges rounded to `alignment`
    pub fn with_alignment(max_size: u64, alignment: u64) -> Result<Self> {
        check_file_size(max_size)?;
        if alignment == 0 {
            return Err(FileShareError::InvalidArgument(
                "Range alignment must be positive".to_string(),
            ));
        }

        Ok(Self {
            max_size,
            alignment,
            extents: BTreeMap::new(),
        })
    }

    /// Declared maximum size of the file
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Alignment unit used when reporting ranges
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Number of bytes physically held by the file
    pub fn stored_bytes(&self) -> u64 {
        self.extents.values().map(|bytes| bytes.len() as u64).sum()
    }

    /// Total length of the ranges reported by [`list_ranges`](Self::list_ranges)
    pub fn allocated_bytes(&self) -> u64 {
        self.list_ranges().iter().map(FileRange::length).sum()
    }

    /// Writes `data` starting at `offset`
    ///
    /// Overlapping writes overwrite earlier data. The write must end at or
    /// before the declared maximum size. An empty write is a no-op.
    pub fn write_range(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let length = data.len() as u64;
        check_range(offset, length, self.max_size)?;
        if data.is_empty() {
            return Ok(());
        }
        let end = offset + length;

        // Extents that overlap or touch the new data, highest start first.
        let touching: Vec<u64> = self
            .extents
            .range(..=end)
            .rev()
            .take_while(|(start, bytes)| **start + bytes.len() as u64 >= offset)
            .map(|(start, _)| *start)
            .collect();

        if let [start] = touching[..] {
            if let Some(bytes) = self.extents.get_mut(&start) {
                if start <= offset && end <= start + bytes.len() as u64 {
                    let at = (offset - start) as usize;
                    bytes[at..at + data.len()].copy_from_slice(data);
                    return Ok(());
                }
            }
        }

        let merged_start = touching.last().map_or(offset, |start| (*start).min(offset));
        let merged_end = touching
            .first()
            .and_then(|start| self.extents.get(start).map(|bytes| start + bytes.len() as u64))
            .map_or(end, |extent_end| extent_end.max(end));

        let mut merged = vec![0u8; to_len(merged_end - merged_start)?];
        for start in &touching {
            if let Some(bytes) = self.extents.remove(start) {
                let at = (start - merged_start) as usize;
                merged[at..at + bytes.len()].copy_from_slice(&bytes);
            }
        }
        let at = (offset - merged_start) as usize;
        merged[at..at + data.len()].copy_from_slice(data);

        self.extents.insert(merged_start, merged);
        Ok(())
    }

    /// Reads exactly `length` bytes starting at `offset`
    ///
    /// Bytes that were never written read back as zero.
    pub fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        check_range(offset, length, self.max_size)?;
        let mut out = vec![0u8; to_len(length)?];
        let end = offset + length;

        for (start, bytes) in self.extents.range(..end).rev() {
            let extent_end = start + bytes.len() as u64;
            if extent_end <= offset {
                break;
            }
            let from = (*start).max(offset);
            let to = extent_end.min(end);
            out[(from - offset) as usize..(to - offset) as usize]
                .copy_from_slice(&bytes[(from - start) as usize..(to - start) as usize]);
        }

        Ok(Bytes::from(out))
    }

    /// Reads the whole file, holes included
    pub fn read_all(&self) -> Result<Bytes> {
        self.read_range(0, self.max_size)
    }

    /// Deallocates `length` bytes starting at `offset`
    ///
    /// The region reads back as zero afterwards.
    pub fn clear_range(&mut self, offset: u64, length: u64) -> Result<()> {
        check_range(offset, length, self.max_size)?;
        if length == 0 {
            return Ok(());
        }
        let end = offset + length;

        let overlapping: Vec<u64> = self
            .extents
            .range(..end)
            .rev()
            .take_while(|(start, bytes)| **start + bytes.len() as u64 > offset)
            .map(|(start, _)| *start)
            .collect();

        for start in overlapping {
            let Some(mut bytes) = self.extents.remove(&start) else {
                continue;
            };
            let extent_end = start + bytes.len() as u64;

            if extent_end > end {
                let tail = bytes.split_off((end - start) as usize);
                self.extents.insert(end, tail);
            }
            if start < offset {
                bytes.truncate((offset - start) as usize);
                self.extents.insert(start, bytes);
            }
        }

        Ok(())
    }

    /// Lists the written ranges, rounded outward to the alignment unit
    ///
    /// Ranges are ordered by start offset. Written regions whose rounded
    /// intervals touch or overlap are reported as one range.
    pub fn list_ranges(&self) -> Vec<FileRange> {
        coalesce_ranges(
            self.extents
                .iter()
                .map(|(start, bytes)| (*start, start + bytes.len() as u64 - 1)),
            self.alignment,
            self.max_size,
        )
    }
}

fn to_len(length: u64) -> Result<usize> {
    usize::try_from(length).map_err(|_| {
        FileShareError::InvalidArgument(format!("Range length {} exceeds address space", length))
    })
}
