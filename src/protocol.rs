//! File Share Protocol Helpers
//!
//! This module holds the pure, protocol-level rules used by the stores and
//! the client: range alignment and coalescing, path handling, resource name
//! validation and local file I/O.

use bytes::Bytes;
use std::path::Path;

use crate::errors::{FileShareError, Result};
use crate::types::*;

/// Rounds `offset` down to the nearest multiple of `alignment`
pub fn align_down(offset: u64, alignment: u64) -> u64 {
    offset - offset % alignment
}

/// Rounds `offset` up to the nearest multiple of `alignment`
///
/// Saturates at the largest multiple representable in a u64.
pub fn align_up(offset: u64, alignment: u64) -> u64 {
    match offset % alignment {
        0 => offset,
        rem => offset
            .checked_add(alignment - rem)
            .unwrap_or_else(|| align_down(u64::MAX, alignment)),
    }
}

/// Rounds a written region `[start, end]` outward to alignment boundaries
///
/// The reported start is the largest multiple of `alignment` not above
/// `start`; the reported end is the smallest value of the form
/// `k * alignment - 1` not below `end`.
///
/// Examples with an alignment of 512:
///   - [0, 511] -> [0, 511]
///   - [1512, 2023] -> [1024, 2047]
///   - [2000, 3000] -> [1536, 3071]
pub fn round_range(start: u64, end: u64, alignment: u64) -> FileRange {
    let rounded_end = align_up(end.saturating_add(1), alignment).saturating_sub(1);
    FileRange::new(align_down(start, alignment), rounded_end.max(end))
}

/// Rounds written regions outward and merges those that touch or overlap
///
/// `regions` must be sorted by start offset and hold closed intervals.
/// Reported ends are clamped to `max_size - 1` so every range stays inside
/// the file.
pub fn coalesce_ranges<I>(regions: I, alignment: u64, max_size: u64) -> Vec<FileRange>
where
    I: IntoIterator<Item = (u64, u64)>,
{
    let mut ranges: Vec<FileRange> = Vec::new();
    let last_byte = max_size.saturating_sub(1);

    for (start, end) in regions {
        let mut rounded = round_range(start, end, alignment);
        rounded.end_offset = rounded.end_offset.min(last_byte);

        match ranges.last_mut() {
            Some(prev) if rounded.start_offset <= prev.end_offset.saturating_add(1) => {
                prev.end_offset = prev.end_offset.max(rounded.end_offset);
            }
            _ => ranges.push(rounded),
        }
    }

    ranges
}

/// Verifies that `offset..offset + length` lies inside a file of `max_size` bytes
pub fn check_range(offset: u64, length: u64, max_size: u64) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= max_size => Ok(()),
        _ => Err(FileShareError::RangeOutOfBounds {
            offset,
            length,
            max_size,
        }),
    }
}

/// Verifies a declared maximum file size
pub fn check_file_size(max_size: u64) -> Result<()> {
    if max_size == 0 || max_size > MAX_FILE_SIZE {
        return Err(FileShareError::InvalidSize(max_size));
    }
    Ok(())
}

/// Formats `offset..offset + length` as an HTTP range header value
///
/// A zero-length region renders as the single byte at `offset`.
///
/// Examples:
///   - (0, 512) -> "bytes=0-511"
///   - (1512, 512) -> "bytes=1512-2023"
pub fn range_header(offset: u64, length: u64) -> String {
    let end = offset.saturating_add(length.max(1) - 1);
    format!("bytes={}-{}", offset, end)
}

/// Splits a share-relative path into validated components
///
/// Leading and trailing separators are ignored; the empty path names the
/// share root and yields no components.
///
/// Examples:
///   - "testfolder/HelloWorld.png" -> ["testfolder", "HelloWorld.png"]
///   - "/testfolder/" -> ["testfolder"]
///   - "" -> []
pub fn split_path(path: &str) -> Result<Vec<String>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split('/')
        .map(|component| {
            validate_file_name(component)?;
            Ok(component.to_string())
        })
        .collect()
}

/// Joins a parent path and an entry name
///
/// This is the inverse operation of split_path for a single component.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Validates a share or container name
///
/// Names are 3 to 63 characters of lowercase letters, digits and hyphens,
/// start and end with a letter or digit and never hold two hyphens in a row.
pub fn validate_share_name(name: &str) -> Result<()> {
    let invalid = || FileShareError::InvalidArgument(format!("Invalid share or container name: {:?}", name));

    if name.len() < MIN_CONTAINER_NAME_LEN || name.len() > MAX_CONTAINER_NAME_LEN {
        return Err(invalid());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid());
    }
    if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a single file or directory name
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > MAX_FILE_NAME_LEN
        || name == "."
        || name == ".."
        || name.contains(INVALID_NAME_CHARS)
        || name.chars().any(char::is_control)
    {
        return Err(FileShareError::InvalidArgument(format!(
            "Invalid file or directory name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Validates a blob name
///
/// Blob names may contain `/` as a virtual directory separator. Every
/// segment must be non-empty and neither `.` nor `..`, so the name maps to
/// one URI path and back unchanged.
pub fn validate_blob_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.len() > 1024
        || name.chars().any(char::is_control)
        || name
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(FileShareError::InvalidArgument(format!(
            "Invalid blob name: {:?}",
            name
        )));
    }
    Ok(())
}

/// Reads the entire contents of a local file
pub async fn read_file_content(filename: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(filename).await?;
    Ok(Bytes::from(data))
}

/// Writes data to a local file, creating parent directories if needed
///
/// If the file already exists, it will be truncated.
pub async fn write_file_content(filename: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(filename, data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align() {
        assert_eq!(align_down(1512, 512), 1024);
        assert_eq!(align_down(1024, 512), 1024);
        assert_eq!(align_up(1512, 512), 1536);
        assert_eq!(align_up(1536, 512), 1536);
        assert_eq!(align_up(0, 512), 0);
        assert_eq!(align_up(u64::MAX, 512), u64::MAX - 511);
    }

    #[test]
    fn test_range_header() {
        assert_eq!(range_header(0, 512), "bytes=0-511");
        assert_eq!(range_header(1512, 512), "bytes=1512-2023");
        assert_eq!(range_header(7, 0), "bytes=7-7");
    }

    #[test]
    fn test_round_range() {
        assert_eq!(round_range(0, 511, 512), FileRange::new(0, 511));
        assert_eq!(round_range(1512, 2023, 512), FileRange::new(1024, 2047));
        assert_eq!(round_range(2000, 3000, 512), FileRange::new(1536, 3071));
        assert_eq!(round_range(5, 5, 4), FileRange::new(4, 7));
    }

    #[test]
    fn test_coalesce_ranges() {
        let ranges = coalesce_ranges([(0, 511), (1512, 2023)], 512, 65536);
        assert_eq!(ranges, vec![FileRange::new(0, 511), FileRange::new(1024, 2047)]);

        let ranges = coalesce_ranges([(0, 511), (700, 800)], 512, 65536);
        assert_eq!(ranges, vec![FileRange::new(0, 1023)]);
    }

    #[test]
    fn test_coalesce_ranges_clamps_to_file_size() {
        let ranges = coalesce_ranges([(990, 999)], 512, 1000);
        assert_eq!(ranges, vec![FileRange::new(512, 999)]);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 512, 512).is_ok());
        assert!(check_range(512, 0, 512).is_ok());
        assert!(check_range(1, 512, 512).is_err());
        assert!(check_range(u64::MAX, 2, u64::MAX).is_err());
    }

    #[test]
    fn test_split_join_path() {
        assert_eq!(
            split_path("testfolder/HelloWorld.png").unwrap(),
            vec!["testfolder".to_string(), "HelloWorld.png".to_string()]
        );
        assert!(split_path("").unwrap().is_empty());
        assert!(split_path("a//b").is_err());
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a/b/", "c"), "a/b/c");
    }

    #[test]
    fn test_validate_share_name() {
        assert!(validate_share_name("demotest-0a1b2c3d4e5f").is_ok());
        assert!(validate_share_name("ab").is_err());
        assert!(validate_share_name("Upper").is_err());
        assert!(validate_share_name("double--hyphen").is_err());
        assert!(validate_share_name("-leading").is_err());
    }

    #[test]
    fn test_validate_blob_name() {
        assert!(validate_blob_name("HelloWorld.png").is_ok());
        assert!(validate_blob_name("nested/dir/file.txt").is_ok());
        assert!(validate_blob_name("a..b/.hidden").is_ok());
        for name in ["", "a//b.txt", "/lead.txt", "trail/", "x/./y.txt", "../up.txt", "a\nb"] {
            assert!(validate_blob_name(name).is_err(), "{:?} accepted", name);
        }
    }
}
