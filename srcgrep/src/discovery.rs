use std::path::{Path, PathBuf};
use std::process::Command;

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::config::FileSource;

/// Streams candidate file paths for one search run.
///
/// Paths are yielded as they are found so discovery overlaps with searching;
/// the orchestrator submits a task per path without waiting for the walk to
/// finish.
pub enum Discovery {
    Walk(Box<ignore::Walk>),
    Listed(std::vec::IntoIter<PathBuf>),
}

impl Discovery {
    pub fn new(source: &FileSource) -> Self {
        match source {
            FileSource::AllFiles(root) => {
                let walk = WalkBuilder::new(root)
                    .standard_filters(false)
                    .follow_links(false)
                    .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != ".git")
                    .build();
                Discovery::Walk(Box::new(walk))
            }
            FileSource::GitFiles(root) => Discovery::Listed(git_files(root).into_iter()),
        }
    }
}

impl Iterator for Discovery {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        match self {
            Discovery::Walk(walk) => {
                for entry in walk.by_ref() {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            debug!("walk error: {}", err);
                            continue;
                        }
                    };
                    // symlinks are not followed, so file_type is the link
                    // itself and symlinked files are skipped with it
                    if entry.file_type().is_some_and(|ft| ft.is_file()) {
                        return Some(entry.into_path());
                    }
                }
                None
            }
            Discovery::Listed(paths) => paths.next(),
        }
    }
}

/// Asks `git ls-files` for the repository's tracked paths.
///
/// A missing git binary, a non-zero exit, or empty output all yield an empty
/// candidate set; the caller simply finds no matches.
fn git_files(root: &Path) -> Vec<PathBuf> {
    let output = match Command::new("git")
        .arg("ls-files")
        .current_dir(root)
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            warn!("failed to run git ls-files: {}", err);
            return Vec::new();
        }
    };

    if !output.status.success() {
        warn!("git ls-files exited with {}", output.status);
        return Vec::new();
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| root.join(line))
        .collect()
}
