use camino::{Utf8Path, Utf8PathBuf};

macro_rules! define_paths {
    ($name:ident { $($field:ident : $default:expr),* $(,)? }) => {
        #[derive(Clone, Debug)]
        pub struct $name {
            $(pub $field: Utf8PathBuf,)*
        }

        impl $name {
            pub fn to_absolute(mut self, base: &Utf8Path) -> Self {
                $(self.$field = base.join(self.$field);)*
                self
            }

            pub fn new(base: &Utf8Path) -> Self {
                Self::default().to_absolute(base)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default.into(),)*
                }
            }
        }
    };
}

define_paths!(CachePaths {
    tempcontent: "tempcontent",
    merge: "merge",
    session: "session.toml",
});

define_paths!(AppDirPaths {
    log: "log.txt",
});

define_paths!(ContentPaths {
    entry_point: "main.lua",
    // Older packages ship JavaScript automation, which this launcher cannot run.
    js_entry_point: "main.js",
    sound_cache_dir: "maps/soundcache",
    sound_cache: "maps/soundcache/_master.cache",
});

/// Name of the directory next to the link destination that receives displaced content.
pub const BACKUP_DIR_NAME: &str = "spplice_backup";

/// Number of numbered backup slots tried before giving up.
pub const BACKUP_SLOTS: u32 = 64;
