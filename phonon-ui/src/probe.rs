use std::env;
use std::path::{Path, PathBuf};

use phonon_core::probe::CapabilityProbe;

/// A capability is available when an executable of that name is on `PATH`.
pub struct PathProbe {
    dirs: Vec<PathBuf>,
}

impl PathProbe {
    pub fn from_env() -> Self {
        let dirs = env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default();
        Self { dirs }
    }

    #[cfg(test)]
    fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }
}

impl CapabilityProbe for PathProbe {
    fn is_available(&self, capability: &str) -> bool {
        if capability.is_empty() || capability.contains(std::path::MAIN_SEPARATOR) {
            return false;
        }
        self.dirs.iter().any(|dir| is_executable(&dir.join(capability)))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_executables_in_listed_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("notify-send");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let probe = PathProbe::with_dirs(vec![dir.path().to_path_buf()]);
        assert!(probe.is_available("notify-send"));
        assert!(!probe.is_available("dbus-send"));
        assert!(!probe.is_available(""));
    }

    #[cfg(unix)]
    #[test]
    fn plain_files_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme"), "text").unwrap();
        let probe = PathProbe::with_dirs(vec![dir.path().to_path_buf()]);
        assert!(!probe.is_available("readme"));
    }

    #[test]
    fn paths_are_not_capabilities() {
        let probe = PathProbe::with_dirs(vec![PathBuf::from("/")]);
        let nested = format!("usr{}bin", std::path::MAIN_SEPARATOR);
        assert!(!probe.is_available(&nested));
    }
}
