//! Locating randomly named profile directories (Firefox-style installs).

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::models::app_spec::ProfileLayout;

/// Name of the active profile directory below `app_root`.
///
/// Pointer files are consulted first, in order; a named directory is only
/// accepted if it exists. Without a usable pointer, the first directory whose
/// name matches the layout pattern wins (`-release` profiles preferred).
/// Fixed layouts have no profile directory and yield `None`.
pub fn resolve_local(app_root: &Path, layout: &ProfileLayout) -> Option<String> {
    let ProfileLayout::Discovered {
        dir_pattern,
        pointer_files,
    } = layout
    else {
        return None;
    };

    for pointer in pointer_files {
        let Ok(content) = fs::read_to_string(app_root.join(pointer)) else {
            continue;
        };
        for candidate in pointer_candidates(&content) {
            if app_root.join(&candidate).is_dir() {
                return Some(candidate);
            }
        }
    }

    let mut matches = matching_dirs(app_root, dir_pattern);
    matches.sort_by_key(|name| (!name.contains("-release"), name.clone()));
    matches.into_iter().next()
}

/// Name of the profile directory stored in an extracted backup.
pub fn resolve_backup(extracted: &Path, layout: &ProfileLayout) -> Option<String> {
    let ProfileLayout::Discovered { dir_pattern, .. } = layout else {
        return None;
    };
    let mut matches = matching_dirs(extracted, dir_pattern);
    matches.sort();
    matches.into_iter().next()
}

fn matching_dirs(root: &Path, pattern: &Regex) -> Vec<String> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| pattern.is_match(name))
        .collect()
}

/// Relative profile paths named by an ini pointer file, in file order.
///
/// `installs.ini` sections carry `Default=<path>`; `profiles.ini` marks the
/// default `[ProfileN]` with `Default=1` next to its `Path=`. Absolute
/// paths (`IsRelative=0`) are ignored.
fn pointer_candidates(content: &str) -> Vec<String> {
    #[derive(Default)]
    struct Section {
        path: Option<String>,
        default: Option<String>,
        relative: bool,
    }

    let mut sections: Vec<Section> = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.starts_with('[') {
            sections.push(Section {
                relative: true,
                ..Section::default()
            });
            continue;
        }
        let (Some(section), Some((key, value))) = (sections.last_mut(), line.split_once('=')) else {
            continue;
        };
        match key.trim() {
            "Path" => section.path = Some(value.trim().to_string()),
            "Default" => section.default = Some(value.trim().to_string()),
            "IsRelative" => section.relative = value.trim() != "0",
            _ => {}
        }
    }

    sections
        .into_iter()
        .filter_map(|s| match s.default.as_deref() {
            Some("1") if s.relative => s.path,
            Some("1") | Some("0") | None => None,
            Some(path) => Some(path.to_string()),
        })
        .filter(|p| !p.is_empty() && !Path::new(p).is_absolute())
        .collect()
}

/// Where the merge for a discovered layout lands.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    /// Directory inside the extracted archive to merge from.
    pub source: PathBuf,
    /// Live directory to merge into.
    pub target: PathBuf,
}

/// Pair the backup's profile directory with the local one.
///
/// With a local profile, only the backup's profile contents are merged into
/// it and the backup's root files (`profiles.ini`, ...) are left out. With no
/// local profile, the whole extracted tree lands under the application root,
/// pointer files included, so the restored profile is the one that gets used.
pub fn plan_merge(extracted: &Path, app_root: &Path, layout: &ProfileLayout) -> MergePlan {
    let backup = resolve_backup(extracted, layout);
    let local = resolve_local(app_root, layout);

    match (backup, local) {
        (Some(backup), Some(local)) => {
            if backup != local {
                tracing::info!("merging backup profile {backup} into local profile {local}");
            }
            MergePlan {
                source: extracted.join(backup),
                target: app_root.join(local),
            }
        }
        _ => MergePlan {
            source: extracted.to_path_buf(),
            target: app_root.to_path_buf(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firefox_layout() -> ProfileLayout {
        ProfileLayout::Discovered {
            dir_pattern: Regex::new(r"^[A-Za-z0-9]+\.default(-[A-Za-z0-9-]+)?$").unwrap(),
            pointer_files: vec!["installs.ini", "profiles.ini"],
        }
    }

    #[test]
    fn installs_ini_pointer_wins() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("aaa111.default")).unwrap();
        fs::create_dir(root.path().join("zzz999.default-release")).unwrap();
        fs::write(
            root.path().join("installs.ini"),
            "[4F96D1932A9F858E]\nDefault=aaa111.default\nLocked=1\n",
        )
        .unwrap();

        assert_eq!(
            resolve_local(root.path(), &firefox_layout()).as_deref(),
            Some("aaa111.default")
        );
    }

    #[test]
    fn profiles_ini_default_flag() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("abc.default")).unwrap();
        fs::create_dir(root.path().join("def.default-esr")).unwrap();
        fs::write(
            root.path().join("profiles.ini"),
            "[General]\nStartWithLastProfile=1\n\n\
             [Profile0]\nName=default\nIsRelative=1\nPath=abc.default\n\n\
             [Profile1]\nName=esr\nIsRelative=1\nPath=def.default-esr\nDefault=1\n",
        )
        .unwrap();

        assert_eq!(
            resolve_local(root.path(), &firefox_layout()).as_deref(),
            Some("def.default-esr")
        );
    }

    #[test]
    fn stale_pointer_falls_back_to_pattern() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("b2.default")).unwrap();
        fs::create_dir(root.path().join("a1.default-release")).unwrap();
        fs::create_dir(root.path().join("Crash Reports")).unwrap();
        fs::write(root.path().join("installs.ini"), "[X]\nDefault=gone.default\n").unwrap();

        assert_eq!(
            resolve_local(root.path(), &firefox_layout()).as_deref(),
            Some("a1.default-release")
        );
    }

    #[test]
    fn fixed_layout_has_no_profile_dir() {
        let root = tempfile::tempdir().unwrap();
        assert!(resolve_local(root.path(), &ProfileLayout::Fixed).is_none());
    }

    #[test]
    fn absolute_pointer_paths_are_ignored() {
        let candidates =
            pointer_candidates("[Profile0]\nIsRelative=0\nPath=/elsewhere/x.default\nDefault=1\n");
        assert!(candidates.is_empty());
    }

    #[test]
    fn plan_maps_backup_name_onto_local_name() {
        let extracted = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(extracted.path().join("abc123.default")).unwrap();
        fs::create_dir(root.path().join("xyz789.default")).unwrap();

        let plan = plan_merge(extracted.path(), root.path(), &firefox_layout());
        assert_eq!(plan.source, extracted.path().join("abc123.default"));
        assert_eq!(plan.target, root.path().join("xyz789.default"));
    }

    #[test]
    fn plan_without_local_profile_restores_whole_tree() {
        let extracted = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(extracted.path().join("abc123.default")).unwrap();

        let plan = plan_merge(extracted.path(), root.path(), &firefox_layout());
        assert_eq!(plan.source, extracted.path());
        assert_eq!(plan.target, root.path());
    }
}
