use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Resolves `.` and `..` components without touching the filesystem.
/// `..` at the root is dropped, matching how the OS resolves `/..`.
pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                } else if out.as_str().is_empty() {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

/// Joins `relative` onto `base` and returns the absolute result only if it stays inside `base`.
/// Absolute inputs replace the base entirely, so they only pass when they already point inside it.
pub fn confine(base: &Utf8Path, relative: &str) -> Option<Utf8PathBuf> {
    let base = absolute(base);
    let full = normalize(&base.join(relative));
    full.starts_with(&base).then_some(full)
}

/// Same as [`confine`], but the join starts at `origin` while the bound is `base`.
pub fn confine_from(base: &Utf8Path, origin: &Utf8Path, relative: &str) -> Option<Utf8PathBuf> {
    let base = absolute(base);
    let full = normalize(&absolute(origin).join(relative));
    full.starts_with(&base).then_some(full)
}

fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    let cwd = std::env::current_dir()
        .ok()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        .unwrap_or_default();
    normalize(&cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize(Utf8Path::new("/a/./b/../c")), Utf8PathBuf::from("/a/c"));
        assert_eq!(normalize(Utf8Path::new("/../x")), Utf8PathBuf::from("/x"));
    }

    #[test]
    fn confine_rejects_escapes() {
        let base = Utf8Path::new("/srv/content");
        assert_eq!(confine(base, "cfg/a.cfg"), Some(Utf8PathBuf::from("/srv/content/cfg/a.cfg")));
        assert_eq!(confine(base, "x/../y"), Some(Utf8PathBuf::from("/srv/content/y")));
        assert_eq!(confine(base, "../other"), None);
        assert_eq!(confine(base, "a/../../other"), None);
        assert_eq!(confine(base, "/etc/passwd"), None);
    }

    #[test]
    fn confine_compares_components_not_prefix_strings() {
        assert_eq!(confine(Utf8Path::new("/srv/content"), "../content2/file"), None);
    }

    #[test]
    fn confine_from_allows_siblings_within_base() {
        let base = Utf8Path::new("/games/Portal 2");
        let origin = Utf8Path::new("/games/Portal 2/portal2_tempcontent");
        assert_eq!(
            confine_from(base, origin, "../portal2/cfg/config.cfg"),
            Some(Utf8PathBuf::from("/games/Portal 2/portal2/cfg/config.cfg"))
        );
        assert_eq!(confine_from(base, origin, "../../secret"), None);
    }
}
