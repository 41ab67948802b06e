//! Resolution of external resources needed before a job starts.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Locates the external transcoder binary.
#[async_trait]
pub trait TranscoderResolver: Send + Sync {
    /// Path to a usable transcoder, or `None` when unavailable.
    async fn resolve(&self) -> Option<PathBuf>;
}

/// Maps the configured cookie browser to the value handed to the downloader.
pub trait CookieResolver: Send + Sync {
    fn resolve(&self, browser: Option<&str>) -> Option<String>;
}

/// Transcoder lookup: explicit path, then `FFMPEG_PATH`, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct PathTranscoderResolver {
    explicit: Option<PathBuf>,
    env_path: Option<OsString>,
    search_path: Option<OsString>,
}

const TRANSCODER_NAME: &str = "ffmpeg";

impl PathTranscoderResolver {
    /// Resolver reading `FFMPEG_PATH` and `PATH` from the environment.
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env_path: std::env::var_os("FFMPEG_PATH"),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Resolver with fully explicit inputs.
    pub fn new(
        explicit: Option<PathBuf>,
        env_path: Option<OsString>,
        search_path: Option<OsString>,
    ) -> Self {
        Self {
            explicit,
            env_path,
            search_path,
        }
    }

    fn resolve_sync(&self) -> Option<PathBuf> {
        let configured = self
            .explicit
            .clone()
            .or_else(|| self.env_path.clone().map(PathBuf::from))
            .filter(|p| !p.as_os_str().is_empty());

        if let Some(path) = configured {
            if process_utils::is_executable(&path) {
                return Some(path);
            }
            debug!(path = %path.display(), "Configured transcoder is not executable");
        }

        let search_path = self.search_path.clone()?;
        process_utils::find_executable_in(TRANSCODER_NAME, search_path)
    }
}

#[async_trait]
impl TranscoderResolver for PathTranscoderResolver {
    async fn resolve(&self) -> Option<PathBuf> {
        let resolver = self.clone();
        // Filesystem probing may block on slow or network mounts.
        match tokio::task::spawn_blocking(move || resolver.resolve_sync()).await {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "Transcoder lookup task failed");
                None
            }
        }
    }
}

/// Fixed transcoder location, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticTranscoder(pub Option<PathBuf>);

#[async_trait]
impl TranscoderResolver for StaticTranscoder {
    async fn resolve(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

impl StaticTranscoder {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self(Some(path.as_ref().to_path_buf()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

/// Passes a non-blank browser name through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNameResolver;

impl CookieResolver for BrowserNameResolver {
    fn resolve(&self, browser: Option<&str>) -> Option<String> {
        browser
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| b.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_name_resolver() {
        let resolver = BrowserNameResolver;
        assert_eq!(resolver.resolve(Some(" Firefox ")).as_deref(), Some("firefox"));
        assert!(resolver.resolve(Some("  ")).is_none());
        assert!(resolver.resolve(None).is_none());
    }

    #[tokio::test]
    async fn test_static_transcoder() {
        assert!(StaticTranscoder::none().resolve().await.is_none());
        assert_eq!(
            StaticTranscoder::at("/opt/ffmpeg").resolve().await,
            Some(PathBuf::from("/opt/ffmpeg"))
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;

        fn write_tool(dir: &Path, name: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_explicit_path_wins() {
            let dir = tempfile::tempdir().unwrap();
            let explicit = write_tool(dir.path(), "my-ffmpeg");
            let on_path = tempfile::tempdir().unwrap();
            write_tool(on_path.path(), "ffmpeg");

            let resolver = PathTranscoderResolver::new(
                Some(explicit.clone()),
                None,
                Some(on_path.path().as_os_str().to_os_string()),
            );
            assert_eq!(resolver.resolve().await, Some(explicit));
        }

        #[tokio::test]
        async fn test_falls_back_to_search_path() {
            let on_path = tempfile::tempdir().unwrap();
            let tool = write_tool(on_path.path(), "ffmpeg");

            let resolver = PathTranscoderResolver::new(
                Some(PathBuf::from("/missing/ffmpeg")),
                None,
                Some(on_path.path().as_os_str().to_os_string()),
            );
            assert_eq!(resolver.resolve().await, Some(tool));
        }

        #[tokio::test]
        async fn test_env_path_used_without_explicit() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_tool(dir.path(), "ffmpeg-env");

            let resolver =
                PathTranscoderResolver::new(None, Some(tool.as_os_str().to_os_string()), None);
            assert_eq!(resolver.resolve().await, Some(tool));
        }

        #[tokio::test]
        async fn test_nothing_found() {
            let empty = tempfile::tempdir().unwrap();
            let resolver = PathTranscoderResolver::new(
                None,
                None,
                Some(empty.path().as_os_str().to_os_string()),
            );
            assert!(resolver.resolve().await.is_none());
        }
    }
}
