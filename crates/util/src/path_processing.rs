use std::path::{Path, PathBuf};

use dirs_next::home_dir;

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Make a path vault-relative when it starts with the vault root.
///
/// Remote scripts often report absolute paths; the host resolves documents
/// by their vault-relative path with `/` separators. Paths outside the vault
/// are returned unchanged.
pub fn strip_vault_prefix(path: &str, vault_root: &str) -> String {
    if vault_root.trim().is_empty() {
        return path.to_string();
    }
    match Path::new(path).strip_prefix(vault_root) {
        Ok(relative) => relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_absolute_vault_paths() {
        assert_eq!(strip_vault_prefix("/home/me/vault/notes/a.md", "/home/me/vault"), "notes/a.md");
        assert_eq!(strip_vault_prefix("/home/me/vault/notes/a.md", "/home/me/vault/"), "notes/a.md");
    }

    #[test]
    fn leaves_relative_and_foreign_paths_alone() {
        assert_eq!(strip_vault_prefix("notes/a.md", "/home/me/vault"), "notes/a.md");
        assert_eq!(strip_vault_prefix("/home/me/vaults/a.md", "/home/me/vault"), "/home/me/vaults/a.md");
        assert_eq!(strip_vault_prefix("/x/a.md", ""), "/x/a.md");
    }

    #[test]
    fn expands_home_directory() {
        temp_env::with_var("HOME", Some("/tmp/vaultlab-home"), || {
            assert_eq!(expand_tilde("~/settings.json"), PathBuf::from("/tmp/vaultlab-home/settings.json"));
        });
        assert_eq!(expand_tilde(" /etc/x "), PathBuf::from("/etc/x"));
    }
}
