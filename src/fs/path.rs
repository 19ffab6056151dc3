use crate::fs::error::{FsError, FsResult};

const MAX_PATH_LENGTH: usize = 4096;
const MAX_FILENAME_LENGTH: usize = 255;

/// Normalize a path inside a snapshot tree.
///
/// Paths are rooted at the repository root; a missing leading `/` is
/// accepted (`a.txt` and `/a.txt` name the same file). `.` components and
/// repeated slashes are dropped. `..` is rejected: a snapshot tree has no
/// parent to escape to.
pub fn normalize_path(path: &str) -> FsResult<String> {
    if path.is_empty() {
        return Err(FsError::InvalidPath("Empty path".to_string()));
    }

    if path.contains('\0') {
        return Err(FsError::InvalidPath("Path contains NULL character".to_string()));
    }

    if path.len() > MAX_PATH_LENGTH {
        return Err(FsError::PathTooLong(path.len()));
    }

    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(FsError::InvalidPath(format!("Parent component in {}", path)));
            }
            _ => {
                if part.len() > MAX_FILENAME_LENGTH {
                    return Err(FsError::FilenameTooLong(part.len()));
                }
                parts.push(part);
            }
        }
    }

    Ok(format!("/{}", parts.join("/")))
}

pub fn split_path(path: &str) -> FsResult<(String, String)> {
    let normalized = normalize_path(path)?;

    if normalized == "/" {
        return Err(FsError::InvalidPath("Cannot split root path".to_string()));
    }

    match normalized.rsplit_once('/') {
        Some(("", name)) => Ok(("/".to_string(), name.to_string())),
        Some((parent, name)) => Ok((parent.to_string(), name.to_string())),
        None => Err(FsError::InvalidPath("Empty path after split".to_string())),
    }
}
