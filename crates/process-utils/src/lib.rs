//! Helpers for launching and locating external tool binaries.
//!
//! The downloader and transcoder are plain executables found either at an
//! explicit path or on `PATH`. Commands created here never pop up a console
//! window on Windows.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[cfg(windows)]
const EXECUTABLE_SUFFIXES: &[&str] = &["", ".exe", ".cmd", ".bat"];

#[cfg(not(windows))]
const EXECUTABLE_SUFFIXES: &[&str] = &[""];

/// Suppress the console window for child processes (Windows only).
pub trait NoWindowExt {
    fn no_window(&mut self) -> &mut Self;
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

/// Create a `tokio::process::Command` for a tool binary.
///
/// The child is killed when its handle is dropped, so an abandoned job can
/// never leave an orphaned downloader behind.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window().kill_on_drop(true);
    cmd
}

/// Returns `true` if `path` points at a regular file that can be executed.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Locate `name` in the directories listed by the `PATH` environment variable.
///
/// A name containing a path separator is checked as-is instead.
pub fn find_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    find_executable_in(name, env::var_os("PATH")?)
}

/// Locate `name` in an explicit `PATH`-style search list.
pub fn find_executable_in(name: impl AsRef<OsStr>, search_path: OsString) -> Option<PathBuf> {
    let name = name.as_ref();
    if name.is_empty() {
        return None;
    }

    let direct = Path::new(name);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    env::split_paths(&search_path).find_map(|dir| {
        EXECUTABLE_SUFFIXES.iter().find_map(|suffix| {
            let mut file_name = name.to_os_string();
            file_name.push(suffix);
            let candidate = dir.join(file_name);
            is_executable(&candidate).then_some(candidate)
        })
    })
}
