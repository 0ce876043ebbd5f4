//! Location and staging of the platform's FFmpeg executable

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{FramexError, FramexResult};

/// The closed set of platforms a tool binary can be bundled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows32,
    Windows64,
    MacOs32,
    MacOs64,
    Linux32,
    Linux64,
}

impl Platform {
    /// Detect the platform of the running process.
    ///
    /// Anything that is neither Windows nor macOS is treated as Linux,
    /// matching the bundled binary set.
    pub fn current() -> Self {
        let wide = cfg!(target_pointer_width = "64");
        if cfg!(target_os = "windows") {
            if wide {
                Platform::Windows64
            } else {
                Platform::Windows32
            }
        } else if cfg!(target_os = "macos") {
            if wide {
                Platform::MacOs64
            } else {
                Platform::MacOs32
            }
        } else if wide {
            Platform::Linux64
        } else {
            Platform::Linux32
        }
    }

    /// File name of the bundled tool binary for this platform
    pub fn resource_name(&self) -> &'static str {
        match self {
            Platform::Windows32 => "ffmpeg-win32.exe",
            Platform::Windows64 => "ffmpeg-win64.exe",
            Platform::MacOs32 => "ffmpeg-mac32",
            Platform::MacOs64 => "ffmpeg-mac64",
            Platform::Linux32 => "ffmpeg-linux32",
            Platform::Linux64 => "ffmpeg-linux64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows32 => "windows (32-bit)",
            Platform::Windows64 => "windows (64-bit)",
            Platform::MacOs32 => "macos (32-bit)",
            Platform::MacOs64 => "macos (64-bit)",
            Platform::Linux32 => "linux (32-bit)",
            Platform::Linux64 => "linux (64-bit)",
        };
        write!(f, "{}", name)
    }
}

/// Supplies the runnable path of the transcoding tool for a platform.
///
/// Implementations must be idempotent: repeated calls within one process
/// return the same path without re-staging while the target still exists.
pub trait ExecutableLocator: Send + Sync {
    /// Resolve an absolute path to a runnable tool executable
    fn locate(&self, platform: &Platform) -> FramexResult<PathBuf>;
}

impl<L: ExecutableLocator + ?Sized> ExecutableLocator for Box<L> {
    fn locate(&self, platform: &Platform) -> FramexResult<PathBuf> {
        (**self).locate(platform)
    }
}

/// A binary staged into a private scratch directory; the directory lives
/// as long as the staged entry
struct StagedTool {
    _dir: TempDir,
    path: PathBuf,
}

/// Locator that stages a bundled binary on first use.
///
/// Looks up the platform's binary in a resource directory shipped next to
/// the application, copies it to a scratch directory, and marks it
/// executable on Unix. The staged copy is reused for the rest of the
/// process lifetime.
pub struct BundledLocator {
    resource_dir: PathBuf,
    staged: Mutex<Option<StagedTool>>,
}

impl BundledLocator {
    /// Create a locator reading bundled binaries from `resource_dir`
    pub fn new<P: Into<PathBuf>>(resource_dir: P) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            staged: Mutex::new(None),
        }
    }

    fn stage(&self, platform: &Platform) -> FramexResult<StagedTool> {
        let source = self.resource_dir.join(platform.resource_name());
        if !source.is_file() {
            return Err(FramexError::ToolUnavailable {
                platform: platform.to_string(),
            });
        }

        let dir = tempfile::Builder::new().prefix("framex-tool-").tempdir()?;
        let path = dir.path().join(platform.resource_name());
        fs::copy(&source, &path)?;
        make_executable(&path)?;

        info!("Staged bundled FFmpeg at {}", path.display());
        Ok(StagedTool { _dir: dir, path })
    }
}

impl ExecutableLocator for BundledLocator {
    fn locate(&self, platform: &Platform) -> FramexResult<PathBuf> {
        // Single writer at a time; nothing panics while the lock is held
        let mut staged = self
            .staged
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(tool) = staged.as_ref() {
            if tool.path.is_file() {
                debug!("Reusing staged FFmpeg at {}", tool.path.display());
                return Ok(tool.path.clone());
            }
        }

        let tool = self.stage(platform)?;
        let path = tool.path.clone();
        *staged = Some(tool);
        Ok(path)
    }
}

/// Locator that uses a caller-supplied executable path unchanged
pub struct FixedLocator {
    path: PathBuf,
}

impl FixedLocator {
    /// Create a locator for an executable the caller already has
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ExecutableLocator for FixedLocator {
    fn locate(&self, _platform: &Platform) -> FramexResult<PathBuf> {
        if !self.path.is_file() {
            return Err(FramexError::Validation {
                message: format!("FFmpeg executable {} does not exist", self.path.display()),
            });
        }
        Ok(self.path.clone())
    }
}

/// Locator that searches the `PATH` environment for an installed tool.
///
/// A candidate is accepted only after a `-version` invocation proves it can
/// actually run; a file that merely shares the tool's name is skipped.
pub struct SystemLocator {
    tool_name: String,
    search_path: Option<OsString>,
}

impl SystemLocator {
    /// Create a locator searching for `tool_name` on `PATH`
    pub fn new<S: Into<String>>(tool_name: S) -> Self {
        Self {
            tool_name: tool_name.into(),
            search_path: None,
        }
    }

    /// Create a locator searching an explicit path list instead of `PATH`
    pub fn with_search_path<S: Into<String>, P: Into<OsString>>(
        tool_name: S,
        search_path: P,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            search_path: Some(search_path.into()),
        }
    }

    fn file_name(&self, platform: &Platform) -> String {
        match platform {
            Platform::Windows32 | Platform::Windows64 => format!("{}.exe", self.tool_name),
            _ => self.tool_name.clone(),
        }
    }

    /// Verify a candidate runs at all; every FFmpeg build answers
    /// `-version` quickly and with a zero exit status
    fn is_runnable(candidate: &Path) -> bool {
        Command::new(candidate)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl ExecutableLocator for SystemLocator {
    fn locate(&self, platform: &Platform) -> FramexResult<PathBuf> {
        let file_name = self.file_name(platform);
        let search_path = self
            .search_path
            .clone()
            .or_else(|| env::var_os("PATH"))
            .unwrap_or_default();

        for directory in env::split_paths(&search_path) {
            let candidate = directory.join(&file_name);
            if candidate.is_file() && Self::is_runnable(&candidate) {
                debug!("Found {} at {}", self.tool_name, candidate.display());
                return Ok(candidate);
            }
        }

        Err(FramexError::ToolUnavailable {
            platform: platform.to_string(),
        })
    }
}

/// Mark a staged binary as executable; no-op on non-Unix platforms
#[cfg(unix)]
fn make_executable(path: &Path) -> FramexResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> FramexResult<()> {
    Ok(())
}
