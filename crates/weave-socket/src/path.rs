use std::path::{Component, Path, PathBuf};
use weave_core::{Result, WeaveError};

const SOCKET_DIR_NAME: &str = "weave";
const SOCKET_FILE_NAME: &str = "worker.sock";

/// `sockaddr_un.sun_path` capacity on Linux, including the trailing NUL.
const SUN_PATH_MAX: usize = 108;

/// Derives the worker socket path from `XDG_RUNTIME_DIR`, creating the
/// `weave` subdirectory (mode `0700`) if it does not already exist.
pub fn socket_path() -> Result<PathBuf> {
    socket_path_in(SOCKET_DIR_NAME, SOCKET_FILE_NAME)
}

/// Like [`socket_path`], but with caller-chosen directory/file names —
/// used when a loaded config overrides the defaults.
pub fn socket_path_in(dir_name: &str, file_name: &str) -> Result<PathBuf> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|v| !v.is_empty())
        .ok_or(WeaveError::XdgNotSet)?;

    let runtime_dir = PathBuf::from(runtime_dir);
    if !runtime_dir.is_absolute() {
        return Err(WeaveError::XdgNotSet);
    }
    if runtime_dir
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
    {
        return Err(WeaveError::XdgNotSet);
    }

    let dir = runtime_dir.join(dir_name);
    ensure_private_dir(&dir)?;

    let path = dir.join(file_name);
    validate_path_length(&path)?;
    Ok(path)
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| WeaveError::MkdirFailed(e.to_string()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| WeaveError::MkdirFailed(e.to_string()))?;
    }
    Ok(())
}

fn validate_path_length(path: &Path) -> Result<()> {
    // +1 for the NUL terminator the kernel will add.
    if path.as_os_str().len() + 1 > SUN_PATH_MAX {
        return Err(WeaveError::PathTooLong);
    }
    Ok(())
}
