// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TranscodeError;
use crate::media::TempMedia;
use crate::model::Format;
use crate::sponsor::{KeepInterval, build_filter_graph, transcode_args};

const TRANSCODE_PREFIX: &str = "podtrim-ffmpeg-";

/// Cuts media down to a list of kept intervals
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produce a new file holding only `keeps` of `input`
    ///
    /// The returned media owns its scratch directory; on error nothing is left behind.
    async fn trim(
        &self,
        input: &Path,
        keeps: &[KeepInterval],
        format: Format,
        cancel: &CancellationToken,
    ) -> Result<TempMedia, TranscodeError>;
}

/// Transcoder running an external `ffmpeg` process
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: String,
    temp_root: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            temp_root: std::env::temp_dir(),
        }
    }

    /// Create scratch directories below `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn trim(
        &self,
        input: &Path,
        keeps: &[KeepInterval],
        format: Format,
        cancel: &CancellationToken,
    ) -> Result<TempMedia, TranscodeError> {
        let output = TempMedia::allocate_in(
            &self.temp_root,
            TRANSCODE_PREFIX,
            &format!("processed.{}", format.extension()),
        )
        .map_err(TranscodeError::TempDirFailed)?;

        let graph = build_filter_graph(keeps, format);
        let args = transcode_args(input, output.path(), &graph, format);
        debug!(program = %self.program, ?args, "running transcoder");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            })?;

        // Dropping the wait future drops the child, which kills it
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(program = %self.program, "transcoder cancelled");
                return Err(TranscodeError::Cancelled);
            }
            result = child.wait_with_output() => result,
        };

        let result = result.map_err(|e| TranscodeError::SpawnFailed {
            program: self.program.clone(),
            source: e,
        })?;

        if !result.status.success() {
            return Err(TranscodeError::Failed {
                program: self.program.clone(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}
