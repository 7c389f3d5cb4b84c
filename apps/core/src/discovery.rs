use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::action_executor::launch_command_line;
use crate::config::Config;
use crate::model::{ResultItem, TAG_APP};
use crate::provider::{Provider, ProviderError};
use crate::search::rank_by_score;

pub const DEFAULT_APP_RESULT_LIMIT: usize = 8;
const DESKTOP_ENTRY_GROUP: &str = "[Desktop Entry]";
const DEFAULT_APP_ICON: &str = "application-x-executable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEntry {
    pub name: String,
    pub exec: String,
    pub icon: String,
    pub comment: String,
}

impl ApplicationEntry {
    fn to_item(&self) -> ResultItem {
        let icon = if self.icon.is_empty() {
            DEFAULT_APP_ICON
        } else {
            &self.icon
        };
        ResultItem::new(&self.name, &self.comment, icon, &self.exec, TAG_APP)
    }
}

/// Every readable `.desktop` descriptor under a set of directories, sorted by name.
pub struct ApplicationIndex {
    dirs: Vec<PathBuf>,
    entries: Vec<ApplicationEntry>,
    limit: usize,
}

impl ApplicationIndex {
    pub fn from_config(cfg: &Config) -> Self {
        let mut dirs = default_application_dirs();
        dirs.extend(cfg.extra_application_dirs.iter().cloned());
        let mut index = Self::with_dirs(dirs);
        index.limit = cfg.app_result_limit;
        index
    }

    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        let mut seen = HashSet::new();
        let dirs = dirs
            .into_iter()
            .filter(|dir| seen.insert(dir.clone()))
            .collect();
        let mut index = Self {
            dirs,
            entries: Vec::new(),
            limit: DEFAULT_APP_RESULT_LIMIT,
        };
        index.rebuild();
        index
    }

    pub fn entries(&self) -> &[ApplicationEntry] {
        &self.entries
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Rescans every directory and swaps the new catalog in whole.
    pub fn rebuild(&mut self) -> usize {
        let mut seen_names = HashSet::new();
        let mut fresh = Vec::new();

        for dir in self.dirs.iter().filter(|dir| dir.is_dir()) {
            for path in descriptor_files(dir) {
                let Ok(raw) = std::fs::read_to_string(&path) else {
                    debug!(path = %path.display(), "unreadable descriptor");
                    continue;
                };
                let Some(entry) = parse_desktop_entry(&raw) else {
                    continue;
                };
                if seen_names.insert(entry.name.clone()) {
                    fresh.push(entry);
                }
            }
        }

        fresh.sort_by_cached_key(|entry| entry.name.to_lowercase());
        self.entries = fresh;
        info!(count = self.entries.len(), "application index rebuilt");
        self.entries.len()
    }

    pub fn lookup(&self, query: &str) -> Vec<ApplicationEntry> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.entries.iter().take(self.limit).cloned().collect();
        }
        rank_by_score(&self.entries, &query, self.limit, |entry| entry.name.as_str())
    }
}

impl Provider for ApplicationIndex {
    fn name(&self) -> &str {
        "Applications"
    }

    fn icon(&self) -> &str {
        "applications-system"
    }

    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError> {
        Ok(self.lookup(query).iter().map(ApplicationEntry::to_item).collect())
    }

    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError> {
        launch_command_line(&item.payload)?;
        Ok(())
    }

    fn refresh(&mut self) -> usize {
        self.rebuild()
    }
}

/// User-local, system, and sandboxed-package export locations. Missing
/// directories are kept here and skipped at scan time.
pub fn default_application_dirs() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let mut out = Vec::new();

    match std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        Some(data_home) => out.push(PathBuf::from(data_home).join("applications")),
        None => {
            if let Some(home) = &home {
                out.push(home.join(".local/share/applications"));
            }
        }
    }

    let data_dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    out.extend(
        data_dirs
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| Path::new(dir).join("applications")),
    );

    out.push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
    if let Some(home) = &home {
        out.push(home.join(".local/share/flatpak/exports/share/applications"));
    }
    out.push(PathBuf::from("/var/lib/snapd/desktop/applications"));
    out
}

fn descriptor_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() || entry.file_type().is_symlink())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "desktop"))
        .collect()
}

/// Reads the `[Desktop Entry]` group. Returns `None` for anything that should
/// not appear in the launcher.
pub fn parse_desktop_entry(raw: &str) -> Option<ApplicationEntry> {
    let mut in_group = false;
    let mut kind = None;
    let mut name = None;
    let mut exec = None;
    let mut icon = None;
    let mut comment = None;
    let mut hidden = false;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_group = line == DESKTOP_ENTRY_GROUP;
            continue;
        }
        if !in_group {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.contains('[') {
            continue;
        }
        let value = value.trim().to_string();
        match key {
            "Type" => kind = Some(value),
            "Name" => name = Some(value),
            "Exec" => exec = Some(value),
            "Icon" => icon = Some(value),
            "Comment" => comment = Some(value),
            "NoDisplay" | "Hidden" => hidden |= value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    if hidden || kind.as_deref().is_some_and(|k| k != "Application") {
        return None;
    }
    let name = name.filter(|n| !n.is_empty())?;
    let exec = sanitize_exec(&exec?);
    if exec.is_empty() {
        return None;
    }

    Some(ApplicationEntry {
        name,
        exec,
        icon: icon.unwrap_or_default(),
        comment: comment.unwrap_or_default(),
    })
}

/// Drops field codes like `%f` and `%U`, unescapes `%%`, collapses whitespace.
pub fn sanitize_exec(exec: &str) -> String {
    static FIELD_CODE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = FIELD_CODE.get_or_init(|| Regex::new(r"%%|%[fFuUdDnNickvm]").ok()) else {
        return exec.split_whitespace().collect::<Vec<_>>().join(" ");
    };
    let stripped = pattern.replace_all(exec, |caps: &regex::Captures<'_>| {
        if &caps[0] == "%%" {
            "%".to_string()
        } else {
            String::new()
        }
    });
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{parse_desktop_entry, sanitize_exec};

    #[test]
    fn field_codes_are_removed_without_whitespace_runs() {
        assert_eq!(sanitize_exec("foo %f --opt %U"), "foo --opt");
        assert_eq!(sanitize_exec("  bar   %i %c %k  "), "bar");
        assert_eq!(sanitize_exec("printf 100%% %u"), "printf 100%");
    }

    #[test]
    fn localized_keys_do_not_override_base_keys() {
        let entry = parse_desktop_entry(
            "[Desktop Entry]\nName=Files\nName[de]=Dateien\nExec=nautilus %U\n",
        )
        .unwrap();
        assert_eq!(entry.name, "Files");
        assert_eq!(entry.exec, "nautilus");
    }

    #[test]
    fn keys_outside_the_entry_group_are_ignored() {
        let raw = "[Desktop Entry]\nName=Editor\nExec=edit\n\n[Desktop Action new]\nName=New Window\nExec=edit --new\n";
        let entry = parse_desktop_entry(raw).unwrap();
        assert_eq!(entry.name, "Editor");
        assert_eq!(entry.exec, "edit");
    }

    #[test]
    fn non_applications_and_hidden_entries_are_rejected() {
        assert!(parse_desktop_entry("[Desktop Entry]\nType=Link\nName=x\nExec=y\n").is_none());
        assert!(parse_desktop_entry("[Desktop Entry]\nName=x\nExec=y\nNoDisplay=true\n").is_none());
        assert!(parse_desktop_entry("[Desktop Entry]\nName=x\nExec=y\nHidden=True\n").is_none());
        assert!(parse_desktop_entry("[Desktop Entry]\nName=\nExec=y\n").is_none());
        assert!(parse_desktop_entry("[Desktop Entry]\nName=x\nExec=%U\n").is_none());
    }
}
