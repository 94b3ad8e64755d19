use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// A Steam game the launcher knows how to inject content into.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GameTarget {
    pub name: String,
    pub app_id: u32,
    /// Content directory inside the game install, e.g. `portal2`.
    pub content_dir: String,
    /// Executable names to look for, native binary first.
    pub process_names: Vec<String>,
}

impl GameTarget {
    fn new(name: &str, app_id: u32, content_dir: &str, native: &str) -> Self {
        Self {
            name: name.into(),
            app_id,
            content_dir: content_dir.into(),
            process_names: vec![native.into(), "portal2.exe".into()],
        }
    }

    pub fn supported() -> Vec<GameTarget> {
        vec![
            Self::new("Portal 2", 620, "portal2", "portal2_linux"),
            Self::new("Aperture Tag", 280740, "aperturetag", "portal2_linux"),
            Self::new("Portal Stories: Mel", 317400, "portal_stories", "portal2_linux"),
            Self::new("Portal Reloaded", 1255980, "portalreloaded", "portal2_linux"),
        ]
    }

    pub fn by_index(index: usize) -> Option<GameTarget> {
        Self::supported().into_iter().nth(index)
    }

    pub fn process_name_refs(&self) -> Vec<&str> {
        self.process_names.iter().map(String::as_str).collect()
    }

    /// Where extracted content is linked inside the game directory.
    pub fn link_destination(&self, game_dir: &Utf8Path) -> Utf8PathBuf {
        game_dir.join(format!("{}_tempcontent", self.content_dir))
    }

    /// Directory holding the game's own content, e.g. `<game>/portal2`.
    pub fn content_root(&self, game_dir: &Utf8Path) -> Utf8PathBuf {
        game_dir.join(&self.content_dir)
    }
}
