//! Agent role definitions loaded from markdown files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleDoc {
    /// File stem.
    pub id: String,
    /// First `# ` heading, or the id when there is none.
    pub label: String,
    pub content: String,
}

fn first_heading(content: &str) -> Option<&str> {
    content
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("# "))
        .map(str::trim)
        .find(|h| !h.is_empty())
}

/// Read every `*.md` directly inside `dir`, sorted by file name.
///
/// A missing directory yields an empty list; unreadable files are skipped.
pub fn load_roles(dir: &Path) -> Result<Vec<RoleDoc>> {
    if !dir.exists() {
        tracing::debug!(dir = %dir.display(), "roles directory missing");
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read roles directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();

    let mut roles = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable role file");
                continue;
            }
        };
        let label = first_heading(&content).unwrap_or(&id).to_string();
        roles.push(RoleDoc { id, label, content });
    }

    tracing::debug!(count = roles.len(), dir = %dir.display(), "roles loaded");
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_becomes_label_and_files_sort() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-critic.md"), "intro\n# The Critic\nbody").unwrap();
        std::fs::write(dir.path().join("a-curator.md"), "no heading here").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "# ignored").unwrap();
        std::fs::create_dir(dir.path().join("nested.md")).unwrap();

        let roles = load_roles(dir.path()).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].id, "a-curator");
        assert_eq!(roles[0].label, "a-curator");
        assert_eq!(roles[1].label, "The Critic");
        assert!(roles[1].content.contains("body"));
    }

    #[test]
    fn subheadings_are_not_labels() {
        assert_eq!(first_heading("## Sub\n#NoSpace\n#   \n# Real"), Some("Real"));
        assert_eq!(first_heading("plain"), None);
    }

    #[test]
    fn missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let roles = load_roles(&dir.path().join("nope")).unwrap();
        assert!(roles.is_empty());
    }
}
