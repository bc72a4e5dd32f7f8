//! Creates the shared and private directories with the permissions spec.md
//! §6 requires: the shared directory world-readable (`0755`), the private
//! directory accessible only to the running user (`0700`).

use std::path::Path;

/// Create both directories if missing and enforce their required
/// permissions.
///
/// # Errors
///
/// Returns an I/O error if either directory cannot be created or
/// `chmod`'d, which spec.md §6 classifies as an invalid private-dir
/// configuration warranting a non-zero exit.
pub fn prepare_directories(shared_dir: &Path, private_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(shared_dir)?;
    std::fs::create_dir_all(private_dir)?;
    set_mode(shared_dir, 0o755)?;
    set_mode(private_dir, 0o700)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
