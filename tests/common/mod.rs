//! Shared test harness for integration tests.
//!
//! [`FakeTools`] writes `/bin/sh` stand-ins for the two renderers and ffmpeg
//! into a scratch directory and builds a [`Config`] pointing at them, with a
//! private workspace root and output directory.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use kwzforge::config::{Config, RendererConfig};
use tempfile::TempDir;

/// Renderer writing a small fake video to its output argument.
pub const VIDEO_OK: &str = r#"printf 'silent video' > "$2""#;
/// Renderer writing 64 bytes of "audio" to its output argument.
pub const AUDIO_OK: &str = r#"head -c 64 /dev/zero > "$3""#;
/// Renderer writing a bare 44-byte header.
pub const AUDIO_HEADER_ONLY: &str = r#"head -c 44 /dev/zero > "$3""#;
/// ffmpeg stand-in: concatenates its two inputs into its last argument.
pub const FFMPEG_OK: &str = r#"for last; do :; done; cat "$3" "$5" > "$last""#;

pub struct FakeTools {
    pub dir: TempDir,
    pub config: Config,
}

impl FakeTools {
    pub fn new(video: &str, audio: &str, ffmpeg: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let video = write_script(root, "video.sh", video);
        let audio = write_script(root, "audio.sh", audio);
        let ffmpeg = write_executable(root, "ffmpeg", ffmpeg);
        std::fs::create_dir(root.join("workspaces")).unwrap();

        let mut config = Config::default();
        config.conversion.workspace_root = Some(root.join("workspaces"));
        config.conversion.stage_timeout_secs = 10;
        config.tools.ffmpeg_path = Some(ffmpeg);
        // Renderers run as `sh <script> ...` so the scripts need no exec bit.
        config.tools.video_renderer = RendererConfig {
            program: PathBuf::from("sh"),
            args: vec![
                video.display().to_string(),
                "{input}".into(),
                "{output}".into(),
            ],
            working_dir: None,
        };
        config.tools.audio_renderer = RendererConfig {
            program: PathBuf::from("sh"),
            args: vec![
                audio.display().to_string(),
                "{input}".into(),
                "{track}".into(),
                "{output}".into(),
            ],
            working_dir: None,
        };
        config.delivery.output_dir = root.join("converted");

        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("workspaces")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("converted")
    }

    /// Write a source file named `name` and return its path.
    pub fn source(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Serialise the config to `kwzforge.toml` and return its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.dir.path().join("kwzforge.toml");
        std::fs::write(&path, toml::to_string(&self.config).unwrap()).unwrap();
        path
    }

    pub fn workspaces_left(&self) -> usize {
        std::fs::read_dir(self.workspace_root()).unwrap().count()
    }
}

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    path
}

pub fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = write_script(dir, name, body);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
