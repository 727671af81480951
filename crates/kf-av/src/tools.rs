//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the external
//! programs a conversion needs: ffmpeg for muxing, and the video and audio
//! renderer commands. Renderers carry argument templates; ffmpeg arguments
//! are fixed by the mux stage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kf_core::config::{RendererConfig, ToolsConfig};
use serde::{Deserialize, Serialize};

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};
use crate::template::TemplateContext;

/// Registry key of the muxer.
pub const FFMPEG: &str = "ffmpeg";
/// Registry key of the silent-video renderer.
pub const VIDEO_RENDERER: &str = "video-renderer";
/// Registry key of the audio-track renderer.
pub const AUDIO_RENDERER: &str = "audio-renderer";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, VIDEO_RENDERER, AUDIO_RENDERER];

/// Configuration for a single external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Registry name (e.g. "ffmpeg", "video-renderer").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Argument templates, substituted per invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory for the process, if it must not inherit ours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Maximum execution time before the tool's process tree is killed.
    #[serde(
        default = "default_timeout",
        with = "duration_secs",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn is_default_timeout(d: &Duration) -> bool {
    *d == DEFAULT_TIMEOUT
}

/// Serde helpers to (de)serialize `Duration` as whole seconds.
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools from the configuration.
    ///
    /// An explicit program path that exists is used directly; otherwise the
    /// program name is looked up with [`which::which`]. Tools that cannot be
    /// resolved are omitted, and [`require`](Self::require) reports them.
    /// Every tool gets `timeout` as its execution ceiling.
    pub fn discover(tools_config: &ToolsConfig, timeout: Duration) -> Self {
        let mut tools = HashMap::new();

        let ffmpeg = RendererConfig {
            program: tools_config
                .ffmpeg_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(FFMPEG)),
            args: Vec::new(),
            working_dir: None,
        };

        for (name, spec) in [
            (FFMPEG, &ffmpeg),
            (VIDEO_RENDERER, &tools_config.video_renderer),
            (AUDIO_RENDERER, &tools_config.audio_renderer),
        ] {
            match resolve(&spec.program) {
                Some(path) => {
                    tracing::debug!("{name} resolved to {}", path.display());
                    tools.insert(
                        name.to_string(),
                        ToolConfig {
                            name: name.to_string(),
                            path,
                            args: spec.args.clone(),
                            working_dir: spec.working_dir.clone(),
                            timeout,
                        },
                    );
                }
                None => tracing::debug!("{name} ({}) not found", spec.program.display()),
            }
        }

        Self { tools }
    }

    /// Build a registry from already-resolved tool configs.
    pub fn from_tools(configs: impl IntoIterator<Item = ToolConfig>) -> Self {
        Self {
            tools: configs
                .into_iter()
                .map(|cfg| (cfg.name.clone(), cfg))
                .collect(),
        }
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or a
    /// spawn error if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> kf_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            kf_core::Error::spawn(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Build a ready-to-run command for `name`, substituting its argument
    /// templates from `ctx`.
    pub fn command(&self, name: &str, ctx: &TemplateContext) -> kf_core::Result<ToolCommand> {
        let tool = self.require(name)?;
        let mut cmd = ToolCommand::new(tool.path.clone());
        cmd.args(ctx.substitute_all(&tool.args)).timeout(tool.timeout);
        if let Some(ref dir) = tool.working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }

    /// Check all known tools and return availability information.
    ///
    /// Each available tool is asked for its version, bounded by a short
    /// timeout.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(KNOWN_TOOLS.len());
        for &name in KNOWN_TOOLS {
            let info = match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(name, &cfg.path).await,
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            };
            infos.push(info);
        }
        infos
    }

    /// Iterate over all registered tool configs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.tools.iter()
    }
}

fn resolve(program: &Path) -> Option<PathBuf> {
    if program.as_os_str().is_empty() {
        return None;
    }
    if program.components().count() > 1 && program.is_file() {
        return Some(program.to_path_buf());
    }
    which::which(program).ok()
}

/// Ceiling for a `--version` check; a tool that ignores the flag and waits
/// is killed.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `<tool> -version` (ffmpeg) or `<tool> --version` and return the first
/// non-empty line of output.
async fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = match name {
        FFMPEG => "-version",
        _ => "--version",
    };

    let output = match ToolCommand::new(path.to_path_buf())
        .arg(version_arg)
        .timeout(VERSION_TIMEOUT)
        .execute()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("{name}: version check failed: {e}");
            return None;
        }
    };

    // Some interpreters print their version on stderr.
    let first = [&output.stdout, &output.stderr]
        .into_iter()
        .flat_map(|text| text.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string);
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_renderers() -> ToolsConfig {
        let mut cfg = ToolsConfig::default();
        cfg.video_renderer = RendererConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), "echo {input} > {output}".into()],
            working_dir: None,
        };
        cfg.audio_renderer = RendererConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), "true".into(), "{track}".into()],
            working_dir: Some(PathBuf::from("/")),
        };
        cfg
    }

    #[tokio::test]
    async fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default(), DEFAULT_TIMEOUT);
        // We cannot guarantee any tool is installed in CI,
        // but the call itself must not panic.
        let _ = registry.check_all().await;
    }

    #[test]
    fn require_missing_tool_returns_spawn_error() {
        let mut cfg = ToolsConfig::default();
        cfg.ffmpeg_path = Some(PathBuf::from("/nonexistent/dir/ffmpeg_xyz"));
        cfg.video_renderer.program = PathBuf::from("nonexistent_renderer_xyz");
        let registry = ToolRegistry::discover(&cfg, DEFAULT_TIMEOUT);

        let err = registry.require(VIDEO_RENDERER).unwrap_err();
        assert_eq!(err.kind(), kf_core::ErrorKind::SpawnFailure);
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn check_all_returns_known_tools() {
        let registry = ToolRegistry::discover(&ToolsConfig::default(), DEFAULT_TIMEOUT);
        let names: Vec<String> = registry
            .check_all()
            .await
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec![FFMPEG, VIDEO_RENDERER, AUDIO_RENDERER]);
    }

    #[cfg(unix)]
    fn script_tool(dir: &Path, name: &str, body: &str) -> ToolConfig {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ToolConfig {
            name: name.to_string(),
            path,
            args: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn version_is_first_nonempty_line_of_either_stream() {
        let dir = tempfile::tempdir().unwrap();
        let tool = script_tool(dir.path(), "renderer", "echo >&2; echo '  kwz 2.1  ' >&2");
        assert_eq!(
            detect_version(VIDEO_RENDERER, &tool.path).await.as_deref(),
            Some("kwz 2.1")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hanging_version_check_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut video = script_tool(dir.path(), "video", "exec sleep 60");
        video.name = VIDEO_RENDERER.to_string();
        let registry = ToolRegistry::from_tools([video]);

        let started = std::time::Instant::now();
        let infos = registry.check_all().await;
        assert!(started.elapsed() < Duration::from_secs(30));

        let video = infos.iter().find(|i| i.name == VIDEO_RENDERER).unwrap();
        assert!(video.available);
        assert!(video.version.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn command_substitutes_templates() {
        let registry = ToolRegistry::discover(&sh_renderers(), Duration::from_secs(7));
        let tool = registry.require(AUDIO_RENDERER).unwrap();
        assert_eq!(tool.timeout, Duration::from_secs(7));
        assert_eq!(tool.working_dir.as_deref(), Some(Path::new("/")));

        let ctx = TemplateContext::new()
            .with_paths(Path::new("/w/in.kwz"), Path::new("/w/out.mp4"), Path::new("/w"))
            .with_var("track", "0");
        let cmd = registry.command(VIDEO_RENDERER, &ctx).unwrap();
        assert_eq!(cmd.get_args(), &["-c", "echo /w/in.kwz > /w/out.mp4"]);

        let cmd = registry.command(AUDIO_RENDERER, &ctx).unwrap();
        assert_eq!(cmd.get_args(), &["-c", "true", "0"]);
    }

    #[test]
    fn tool_config_serialization() {
        let cfg = ToolConfig {
            name: FFMPEG.to_string(),
            path: PathBuf::from("/usr/bin/ffmpeg"),
            args: Vec::new(),
            working_dir: None,
            timeout: Duration::from_secs(30),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("ffmpeg"));
        assert!(!json.contains("args"));
        let back: ToolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "ffmpeg");
        assert_eq!(back.timeout, Duration::from_secs(30));
    }
}
