//! Splits a corpus file into byte ranges whose boundaries coincide with
//! occurrences of the split marker, so that no pre-token is ever split
//! across two chunks.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, TrainError};

const SCAN_WINDOW: usize = 4096;

/// Returns a strictly increasing list of byte offsets `[b0, b1, ..., bk]`
/// with `b0 = 0`, `bk = file_size`, and `k <= desired_chunk_count`, such that
/// every interior offset is either `file_size` or the start of an
/// occurrence of `marker`.
///
/// Returns `[0]` for an empty file.
pub fn find_chunk_boundaries(
    path: &Path, desired_chunk_count: usize, marker: &[u8],
) -> Result<Vec<u64>> {
    if desired_chunk_count == 0 {
        return Err(TrainError::InvalidArgument(
            "desired_chunk_count must be >= 1".to_string(),
        ));
    }

    let mut file = File::open(path).map_err(|source| TrainError::InputUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let file_size = file
        .seek(SeekFrom::End(0))
        .map_err(|source| TrainError::InputUnavailable { path: path.to_path_buf(), source })?;

    if file_size == 0 {
        return Ok(vec![0]);
    }

    let chunk_size = file_size / desired_chunk_count as u64;
    if chunk_size == 0 {
        return Ok(vec![0, file_size]);
    }

    let mut boundaries: Vec<u64> =
        (0..=desired_chunk_count).map(|i| i as u64 * chunk_size).collect();
    *boundaries.last_mut().unwrap() = file_size;

    let mut window = vec![0u8; SCAN_WINDOW];
    for bi in 1..desired_chunk_count {
        let mut pos = boundaries[bi];
        loop {
            file.seek(SeekFrom::Start(pos)).map_err(|source| TrainError::InputUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
            let read = file.read(&mut window).map_err(|source| TrainError::InputUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
            if read == 0 {
                boundaries[bi] = file_size;
                break;
            }
            if marker.is_empty() {
                break;
            }
            if let Some(found_at) = find_subslice(&window[..read], marker) {
                boundaries[bi] = pos + found_at as u64;
                break;
            }
            pos += read as u64;
        }
    }

    boundaries.sort_unstable();
    boundaries.dedup();
    log::debug!(
        "chunker: {} boundaries for file of {} bytes (requested {} chunks)",
        boundaries.len() - 1,
        file_size,
        desired_chunk_count
    );
    Ok(boundaries)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
