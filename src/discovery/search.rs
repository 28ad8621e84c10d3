// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bounded filesystem search.
//!
//! Every walk in here is depth-first with a depth ceiling. Symbolic links are
//! never followed, which removes the main source of cycles; the ceiling is
//! what catches the rest.
//!
//! Plain listings go through [`ignore::WalkBuilder`] with its filters turned
//! off. The config search checks a directory's files before any of its
//! subdirectories and skips some directories by name, so it walks by hand.
//!
//! Entries are always visited in name-sorted order so that anything we hand
//! back to the user comes out in a stable, presentable order.

use ignore::WalkBuilder;
use std::{
    fs::read_dir,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Deepest directory level visited while enumerating service units.
pub const MAX_SERVICE_DEPTH: usize = 10;

/// Deepest directory level visited while looking for a Moonraker config.
pub const MAX_CONFIG_DEPTH: usize = 20;

/// Deepest directory level visited while printing diagnostic listings.
pub const MAX_DIAGNOSTIC_DEPTH: usize = 5;

/// Exact name of the Moonraker configuration file.
pub const CONFIG_FILE_NAME: &str = "moonraker.conf";

// RatOS ships a git checkout of its own project under "config/RatOS" that
// carries a moonraker.conf which is not the printer's active config.
const SKIPPED_DIRS: [&str; 2] = ["backup", "ratos"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    path: PathBuf,
    kind: EntryKind,
}

/// List directory entries sorted by name.
///
/// Entry kinds come from the directory entry itself, so symbolic links are
/// reported as [`EntryKind::Other`] rather than as whatever they point to.
fn read_sorted_dir(path: &Path) -> Result<Vec<Entry>> {
    let read_err = |err| SearchError::ReadDir {
        source: err,
        path: path.to_path_buf(),
    };

    let mut entries = Vec::new();
    for entry in read_dir(path).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_type = entry.file_type().map_err(read_err)?;
        let kind = if file_type.is_symlink() {
            EntryKind::Other
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            kind,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(entries)
}

/// Recursively collect plain files whose names start with `prefix` and end
/// with `suffix`.
///
/// Both affixes are compared case-insensitively. Results follow a depth-first
/// walk with each directory's entries sorted by name.
///
/// # Errors
///
/// - Return [`SearchError::Walk`] if `root` itself cannot be read.
///   Nested directories that cannot be read are logged and skipped.
pub fn find_files(root: &Path, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>> {
    let prefix = prefix.to_lowercase();
    let suffix = suffix.to_lowercase();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .max_depth(Some(MAX_SERVICE_DEPTH + 1))
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut found = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) if err.depth() == Some(0) => {
                return Err(SearchError::Walk {
                    source: err,
                    path: root.to_path_buf(),
                });
            }
            Err(err) => {
                warn!("skipping directory: {err}");
                continue;
            }
        };

        // INVARIANT: Symbolic links are reported as such, never as their target.
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.starts_with(&prefix) && name.ends_with(&suffix) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// Recursively look for `moonraker.conf` starting at `root`.
///
/// The name match is exact but case-insensitive, so near misses like
/// `moonraker.conf.backup` never match. Each directory has all of its plain
/// files checked before any of its subdirectories are entered, because some
/// images nest unrelated configs deeper in the tree and a shallow file must
/// win. Subdirectories named `backup` or `ratos` are never entered.
///
/// # Errors
///
/// - Return [`SearchError::ReadDir`] if any visited directory cannot be read.
pub fn find_moonraker_config(root: &Path) -> Result<Option<PathBuf>> {
    search_config(root, 0)
}

fn search_config(path: &Path, depth: usize) -> Result<Option<PathBuf>> {
    if depth > MAX_CONFIG_DEPTH {
        return Ok(None);
    }

    let entries = read_sorted_dir(path)?;
    let file = entries.iter().find(|entry| {
        entry.kind == EntryKind::File && entry.name.eq_ignore_ascii_case(CONFIG_FILE_NAME)
    });
    if let Some(file) = file {
        return Ok(Some(file.path.clone()));
    }

    for dir in entries.iter().filter(|entry| entry.kind == EntryKind::Dir) {
        if SKIPPED_DIRS
            .iter()
            .any(|skip| dir.name.eq_ignore_ascii_case(skip))
        {
            debug!("skip {:?} during config search", dir.path.display());
            continue;
        }

        if let Some(found) = search_config(&dir.path, depth + 1)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

/// Log every entry under `root` whose name ends with `suffix`.
///
/// Purely diagnostic output at debug level. Entries are indented by how deep
/// they sit below `root`. Nothing here can fail the caller; unreadable entries
/// are logged and skipped.
pub fn log_matching_paths(root: &Path, suffix: &str) {
    let suffix = suffix.to_lowercase();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .max_depth(Some(MAX_DIAGNOSTIC_DEPTH + 1))
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                debug!("cannot list entry: {err}");
                continue;
            }
        };

        // INVARIANT: The walk root itself is never listed.
        if entry.depth() == 0 {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(&suffix) {
            let indent = " ".to_string() + &"  ".repeat(entry.depth() - 1);
            debug!("{indent}{}", entry.path().display());
        }
    }
}

/// Filesystem search error types.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Directory cannot be listed.
    #[error("failed to read directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory tree cannot be walked from its root.
    #[error("failed to walk directory {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },
}

impl SearchError {
    /// Check if the error was caused by a missing directory.
    pub fn is_not_found(&self) -> bool {
        let source = match self {
            Self::ReadDir { source, .. } => Some(source),
            Self::Walk { source, .. } => source.io_error(),
        };

        source.is_some_and(|err| err.kind() == ErrorKind::NotFound)
    }
}

/// Friendly result alias :3
pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        create_dir_all(path.parent().unwrap()).unwrap();
        write(&path, "").unwrap();
        path
    }

    #[test]
    fn find_files_matches_affixes_case_insensitively() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        touch(root.path(), "moonraker.service");
        touch(root.path(), "Moonraker-2.SERVICE");
        touch(root.path(), "moonraker.service.bak");
        touch(root.path(), "klipper.service");
        touch(root.path(), "nested/moonraker-3.service");

        let result = find_files(root.path(), "moonraker", ".service")?;
        let expect = vec![
            root.path().join("Moonraker-2.SERVICE"),
            root.path().join("moonraker.service"),
            root.path().join("nested/moonraker-3.service"),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn find_files_ignores_symlinks() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let real = touch(root.path(), "moonraker.service");
        create_dir_all(root.path().join("multi-user.target.wants"))?;
        std::os::unix::fs::symlink(
            &real,
            root.path().join("multi-user.target.wants/moonraker.service"),
        )?;
        std::os::unix::fs::symlink(root.path(), root.path().join("loop"))?;

        let result = find_files(root.path(), "moonraker", ".service")?;
        assert_eq!(result, vec![real]);

        Ok(())
    }

    #[test]
    fn find_files_stops_at_depth_ceiling() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let mut shallow = String::new();
        for level in 0..MAX_SERVICE_DEPTH {
            shallow.push_str(&format!("d{level}/"));
        }
        let kept = touch(root.path(), &format!("{shallow}moonraker.service"));
        touch(root.path(), &format!("{shallow}deeper/moonraker.service"));

        let result = find_files(root.path(), "moonraker", ".service")?;
        assert_eq!(result, vec![kept]);

        Ok(())
    }

    #[test]
    fn find_files_reports_missing_root() {
        let root = TempDir::new().unwrap();
        let result = find_files(&root.path().join("nope"), "moonraker", ".service");
        assert!(matches!(
            result,
            Err(ref err @ SearchError::Walk { .. }) if err.is_not_found()
        ));
    }

    #[test]
    fn config_search_prefers_shallow_file() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        touch(root.path(), "a/moonraker.conf");
        let shallow = touch(root.path(), "moonraker.conf");

        assert_eq!(find_moonraker_config(root.path())?, Some(shallow));

        Ok(())
    }

    #[test]
    fn config_search_walks_subdirectories_in_name_order() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        touch(root.path(), "b/moonraker.conf");
        let first = touch(root.path(), "a/deep/moonraker.conf");

        assert_eq!(find_moonraker_config(root.path())?, Some(first));

        Ok(())
    }

    #[test_case("backup/moonraker.conf"; "backup directory")]
    #[test_case("Backup/moonraker.conf"; "capitalized backup directory")]
    #[test_case("RatOS/moonraker.conf"; "ratos directory")]
    #[test_case("nested/ratos/moonraker.conf"; "nested ratos directory")]
    #[test]
    fn config_search_skips_decoy_directories(decoy: &str) {
        let root = TempDir::new().unwrap();
        touch(root.path(), decoy);

        pretty_assertions::assert_eq!(find_moonraker_config(root.path()).unwrap(), None);
    }

    #[test_case("moonraker.conf.backup", false; "backup suffix")]
    #[test_case("old-moonraker.conf", false; "prefixed name")]
    #[test_case("MOONRAKER.CONF", true; "upper case")]
    #[test_case("Moonraker.conf", true; "mixed case")]
    #[test]
    fn config_search_matches_exact_name(name: &str, matches: bool) {
        let root = TempDir::new().unwrap();
        let path = touch(root.path(), name);

        let expect = if matches { Some(path) } else { None };
        pretty_assertions::assert_eq!(find_moonraker_config(root.path()).unwrap(), expect);
    }

    #[cfg(unix)]
    #[test]
    fn config_search_ignores_symlinked_config() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let real = touch(root.path(), "elsewhere/printer.cfg");
        std::os::unix::fs::symlink(&real, root.path().join("moonraker.conf"))?;

        assert_eq!(find_moonraker_config(root.path())?, None);

        Ok(())
    }

    #[test]
    fn config_search_stops_at_depth_ceiling() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let mut deep = String::new();
        for level in 0..=MAX_CONFIG_DEPTH {
            deep.push_str(&format!("d{level}/"));
        }
        touch(root.path(), &format!("{deep}moonraker.conf"));

        assert_eq!(find_moonraker_config(root.path())?, None);

        Ok(())
    }
}
