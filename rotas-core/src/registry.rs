//! YAML route registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.rotas/
//!   routes.yaml        (registry root, mode 0600)
//!   routes.lock        (advisory lock held across read-modify-write)
//! ```
//!
//! # API pattern
//!
//! Every function takes an explicit `home: &Path` (`TempDir` in tests).
//! Binaries resolve the real one once with [`home`].

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;

use crate::error::RegistryError;
use crate::types::RouteRegistry;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.rotas/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn rotas_dir_at(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = home.join(".rotas");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.rotas/routes.yaml`, pure, no I/O.
pub fn registry_path_at(home: &Path) -> PathBuf {
    home.join(".rotas").join("routes.yaml")
}

/// `<home>/.rotas/routes.lock`, pure, no I/O.
pub fn lock_path_at(home: &Path) -> PathBuf {
    home.join(".rotas").join("routes.lock")
}

// ---------------------------------------------------------------------------
// 2. Lock
// ---------------------------------------------------------------------------

/// Exclusive hold on the registry. Released on drop.
///
/// The lock is an `flock` on `routes.lock`, so it serializes separate
/// processes as well as separate handles inside one process.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
}

impl RegistryLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Block until this caller owns the registry.
pub fn lock_at(home: &Path) -> Result<RegistryLock, RegistryError> {
    rotas_dir_at(home)?;
    let path = lock_path_at(home);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;
    file.lock_exclusive()?;
    Ok(RegistryLock { file, path })
}

/// Run `apply` on the registry under [`lock_at`] and save the result if it
/// returns `Ok`. Nothing is written when `apply` fails.
pub fn update_at<T, E>(
    home: &Path,
    apply: impl FnOnce(&mut RouteRegistry) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<RegistryError>,
{
    let _lock = lock_at(home)?;
    let mut registry = load_at(home)?;
    let value = apply(&mut registry)?;
    save_at(home, &registry)?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load the registry, or an empty one if nothing has been saved yet.
///
/// Returns `RegistryError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<RouteRegistry, RegistryError> {
    let path = registry_path_at(home);
    if !path.exists() {
        return Ok(RouteRegistry::new(Utc::now()));
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save the registry to `<home>/.rotas/routes.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, registry: &RouteRegistry) -> Result<(), RegistryError> {
    rotas_dir_at(home)?;
    let path = registry_path_at(home);
    let tmp_path = path.with_file_name("routes.yaml.tmp");

    let mut registry = registry.clone();
    registry.updated_at = Utc::now().max(registry.created_at);

    let yaml = serde_yaml::to_string(&registry)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// The user's home directory, the root every `_at` function expects.
pub fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn registry_path_is_correct() {
        let home = make_home();
        assert!(registry_path_at(home.path()).ends_with(".rotas/routes.yaml"));
    }

    #[test]
    fn rotas_dir_created_with_perms() {
        let home = make_home();
        let dir = rotas_dir_at(home.path()).expect("rotas_dir_at");
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn load_missing_registry_is_empty() {
        let home = make_home();
        let reg = load_at(home.path()).expect("load");
        assert!(reg.routes.is_empty());
        assert_eq!(reg.next_id, 1);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        save_at(home.path(), &RouteRegistry::new(Utc::now())).expect("save");
        let tmp = registry_path_at(home.path()).with_file_name("routes.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let home = make_home();
        let held = lock_at(home.path()).expect("lock");
        assert!(held.path().ends_with(".rotas/routes.lock"));

        let second = std::fs::OpenOptions::new()
            .write(true)
            .open(lock_path_at(home.path()))
            .expect("open lock file");
        assert!(second.try_lock_exclusive().is_err());

        drop(held);
        second.try_lock_exclusive().expect("free after drop");
    }

    #[test]
    fn update_skips_save_when_apply_fails() {
        let home = make_home();
        let result: Result<(), RegistryError> = update_at(home.path(), |reg| {
            reg.allocate_id();
            Err(RegistryError::HomeNotFound)
        });
        assert!(result.is_err());
        assert!(!registry_path_at(home.path()).exists());

        update_at::<_, RegistryError>(home.path(), |reg| {
            reg.allocate_id();
            Ok(())
        })
        .expect("update");
        assert_eq!(load_at(home.path()).expect("load").next_id, 2);
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(RegistryError::HomeNotFound.to_string().contains("home directory"));
    }
}
