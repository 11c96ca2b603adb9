//! Object key and public URI mapping.

use std::path::Path;

use crate::error::{StorageError, StorageResult};

/// Object key for `file` under `folder`, prefixed with `unique` to avoid collisions.
pub fn object_key(folder: &str, unique: &str, file: &Path) -> StorageResult<String> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StorageError::invalid_key(file.display().to_string()))?;

    let folder = folder.trim_matches('/');
    if folder.split('/').any(|seg| seg == "..") {
        return Err(StorageError::invalid_key(folder.to_string()));
    }

    if folder.is_empty() {
        Ok(format!("{}-{}", unique, name))
    } else {
        Ok(format!("{}/{}-{}", folder, unique, name))
    }
}

/// Public URI for `key`.
pub fn public_uri(public_base: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect();
    format!("{}/{}", public_base.trim_end_matches('/'), encoded.join("/"))
}

/// Recover the object key from a public URI.
pub fn key_from_uri(public_base: &str, uri: &str) -> StorageResult<String> {
    let base = public_base.trim_end_matches('/');
    let rest = uri
        .strip_prefix(base)
        .and_then(|r| r.strip_prefix('/'))
        .filter(|r| !r.is_empty())
        .ok_or_else(|| StorageError::invalid_key(uri.to_string()))?;

    let decoded: Result<Vec<String>, _> = rest
        .split('/')
        .map(|seg| urlencoding::decode(seg).map(|s| s.into_owned()))
        .collect();
    decoded
        .map(|segs| segs.join("/"))
        .map_err(|_| StorageError::invalid_key(uri.to_string()))
}
