//! beets post-processor client. Wraps the external `beet` binary; we never
//! link against beets itself, only drive it as a subprocess and parse its
//! stdout.

use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

const IMPORT_TIMEOUT: Duration = Duration::from_secs(600);

pub struct BeetsClient {
    enabled: bool,
    config_path: Option<String>,
    library_path: Option<String>,
    binary: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub success: bool,
    pub final_path: Option<String>,
    pub albums_imported: i32,
    pub tracks_imported: i32,
    pub error: Option<String>,
}

impl BeetsClient {
    pub fn new(enabled: bool, config_path: Option<String>, library_path: Option<String>) -> Self {
        Self {
            enabled,
            config_path,
            library_path,
            binary: "beet".to_string(),
        }
    }

    /// `false` when beets is disabled in settings or the binary is missing;
    /// callers are expected to fall through to download-only completion.
    pub async fn is_available(&self) -> bool {
        if !self.enabled {
            return false;
        }
        Command::new(&self.binary)
            .arg("version")
            .output()
            .await
            .is_ok()
    }

    pub async fn import_directory(
        &self,
        path: &Path,
        artist_hint: Option<&str>,
        album_hint: Option<&str>,
        move_files: bool,
    ) -> ImportOutcome {
        if !self.enabled {
            return ImportOutcome {
                success: false,
                error: Some("beets is disabled".to_string()),
                ..Default::default()
            };
        }

        let mut command = Command::new(&self.binary);
        if let Some(config_path) = &self.config_path {
            command.arg("--config").arg(config_path);
        }
        command.arg("import").arg("--quiet");
        command.arg(if move_files { "--move" } else { "--copy" });
        if let Some(artist) = artist_hint {
            command.arg("--set").arg(format!("albumartist={artist}"));
        }
        if let Some(album) = album_hint {
            command.arg("--set").arg(format!("album={album}"));
        }
        command.arg(path);

        let output = match timeout(IMPORT_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "beets import process failed to spawn");
                return ImportOutcome {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
            Err(_) => {
                warn!(timeout_secs = IMPORT_TIMEOUT.as_secs(), "beets import timed out");
                return ImportOutcome {
                    success: false,
                    error: Some("beets import exceeded the 10 minute timeout".to_string()),
                    ..Default::default()
                };
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            warn!(stderr, "beets import exited non-zero");
            return ImportOutcome {
                success: false,
                error: Some(stderr),
                ..Default::default()
            };
        }

        parse_import_output(&String::from_utf8_lossy(&output.stdout))
    }

    pub async fn list_library(&self, query: Option<&str>, limit: u32) -> Vec<String> {
        let Some(library_path) = &self.library_path else {
            return vec![];
        };
        let _ = library_path;

        let mut command = Command::new(&self.binary);
        if let Some(config_path) = &self.config_path {
            command.arg("--config").arg(config_path);
        }
        command.arg("list");
        if let Some(query) = query {
            command.arg(query);
        }

        match command.output().await {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .take(limit as usize)
                .map(|line| line.to_string())
                .collect(),
            Ok(output) => {
                warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "beets library query exited non-zero"
                );
                vec![]
            }
            Err(e) => {
                warn!(error = %e, "beets library query failed to spawn");
                vec![]
            }
        }
    }
}

/// beets prints one "Imported ... N items" line per album on success and one
/// final library path; we only need the counts and the last path reported.
fn parse_import_output(stdout: &str) -> ImportOutcome {
    let mut albums_imported = 0;
    let mut tracks_imported = 0;
    let mut final_path = None;

    for line in stdout.lines() {
        if let Some(rest) = line.trim().strip_prefix("Imported ") {
            albums_imported += 1;
            if let Some(count) = rest
                .split_whitespace()
                .find_map(|token| token.parse::<i32>().ok())
            {
                tracks_imported += count;
            }
            if let Some(path) = rest.rsplit(" to ").next() {
                final_path = Some(path.trim_end_matches('.').to_string());
            }
        }
    }

    ImportOutcome {
        success: albums_imported > 0,
        final_path,
        albums_imported,
        tracks_imported,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_album_import() {
        let stdout = "Imported 1 items 10 tracks to /music/The Weeknd/Dawn FM.";
        let outcome = parse_import_output(stdout);
        assert!(outcome.success);
        assert_eq!(outcome.albums_imported, 1);
    }

    #[test]
    fn empty_output_is_not_a_success() {
        let outcome = parse_import_output("");
        assert!(!outcome.success);
        assert_eq!(outcome.albums_imported, 0);
    }
}
