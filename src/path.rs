//! Path resolution for database locations.
//!
//! Absolute paths are used as given. A path that is lexically explicit about
//! being relative (`./x`, `../x`, `.\x`, `..\x`) always resolves against the
//! working directory. Any other relative path resolves against the directory
//! of the running executable when requested, and the working directory
//! otherwise.

use std::path::{Component, Path, PathBuf};

use crate::config::Config;
use crate::error::{ContainerError, ContainerResult};

/// File name used inside the directory when `no_subdir` is false.
pub const DATA_FILE_NAME: &str = "data.redb";

/// True for paths written as `./…`, `../…`, `.\…` or `..\…`.
pub fn is_explicitly_relative(pathname: &str) -> bool {
    ["./", "../", ".\\", "..\\"]
        .iter()
        .any(|prefix| pathname.starts_with(prefix))
}

/// Directory containing the running executable.
pub fn executable_dir() -> ContainerResult<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ContainerError::InvalidConfig(format!("{} has no parent directory", exe.display()))
    })
}

/// Resolves `pathname` to an absolute, lexically normalised path.
pub fn resolve_path(pathname: &str, relative_to_exe: bool) -> ContainerResult<PathBuf> {
    if pathname.is_empty() {
        return Err(ContainerError::InvalidConfig(
            "pathname must not be empty".into(),
        ));
    }

    let path = Path::new(pathname);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else if is_explicitly_relative(pathname) || !relative_to_exe {
        std::env::current_dir()?.join(path)
    } else {
        executable_dir()?.join(path)
    };
    Ok(normalize(&resolved))
}

/// Location of the redb file for `config`.
///
/// With `no_subdir` the resolved path is the file; otherwise it is a
/// directory holding [`DATA_FILE_NAME`].
pub fn database_file(config: &Config) -> ContainerResult<PathBuf> {
    let resolved = resolve_path(&config.pathname, config.relative_to_exe)?;
    if config.no_subdir {
        Ok(resolved)
    } else {
        Ok(resolved.join(DATA_FILE_NAME))
    }
}

/// Creates every missing directory above `file`.
pub fn create_parent_dirs(file: &Path) -> ContainerResult<()> {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicitly_relative_prefixes() {
        assert!(is_explicitly_relative("./db"));
        assert!(is_explicitly_relative("../db"));
        assert!(is_explicitly_relative(".\\db"));
        assert!(is_explicitly_relative("..\\db"));
        assert!(!is_explicitly_relative("db"));
        assert!(!is_explicitly_relative(".db"));
        assert!(!is_explicitly_relative("/abs/db"));
    }

    #[test]
    fn test_normalize_removes_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("/a/b/./")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_empty_pathname_is_rejected() {
        assert!(matches!(
            resolve_path("", false),
            Err(ContainerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_subdir_layout() {
        let config = Config::builder()
            .pathname("/tmp/containers")
            .no_subdir(false)
            .build();
        assert_eq!(
            database_file(&config).unwrap(),
            PathBuf::from("/tmp/containers").join(DATA_FILE_NAME)
        );
    }
}
