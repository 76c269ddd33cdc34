//! Base64 archive unpacking.

use crate::release::ports::{RetrievalError, RetrievalResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use std::io::Cursor;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Decodes `payload` and unpacks it into `destination`.
///
/// Zip and gzip-compressed tar archives are recognized by their magic bytes.
/// Entries that would land outside `destination` reject the whole archive.
pub(super) fn unpack(payload: &str, destination: &Utf8Path) -> RetrievalResult<Utf8PathBuf> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|err| RetrievalError::InvalidInput(format!("archive is not valid base64: {err}")))?;

    let entries = if bytes.starts_with(ZIP_LOCAL_HEADER) || bytes.starts_with(ZIP_EMPTY_ARCHIVE) {
        unpack_zip(bytes, destination)?
    } else if bytes.starts_with(GZIP_MAGIC) {
        unpack_tar_gz(bytes, destination)?
    } else {
        return Err(RetrievalError::InvalidInput(
            "archive is neither zip nor tar.gz".to_owned(),
        ));
    };

    if entries == 0 {
        return Err(RetrievalError::InvalidInput("archive is empty".to_owned()));
    }
    Ok(destination.to_path_buf())
}

fn unpack_zip(bytes: Vec<u8>, destination: &Utf8Path) -> RetrievalResult<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
    let entries = archive.len();
    if entries > 0 {
        archive.extract(destination).map_err(zip_error)?;
    }
    Ok(entries)
}

fn zip_error(err: zip::result::ZipError) -> RetrievalError {
    match err {
        zip::result::ZipError::Io(io) => RetrievalError::Failed(format!("unpacking zip: {io}")),
        other => RetrievalError::InvalidInput(format!("corrupt zip archive: {other}")),
    }
}

fn unpack_tar_gz(bytes: Vec<u8>, destination: &Utf8Path) -> RetrievalResult<usize> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    let mut entries = 0_usize;
    for entry in archive.entries().map_err(tar_error)? {
        let mut file = entry.map_err(tar_error)?;
        let inside = file.unpack_in(destination.as_std_path()).map_err(|err| {
            RetrievalError::Failed(format!("unpacking tar entry: {err}"))
        })?;
        if !inside {
            return Err(RetrievalError::InvalidInput(
                "archive entry escapes the workspace".to_owned(),
            ));
        }
        entries += 1;
    }
    Ok(entries)
}

fn tar_error(err: std::io::Error) -> RetrievalError {
    RetrievalError::InvalidInput(format!("corrupt tar.gz archive: {err}"))
}
