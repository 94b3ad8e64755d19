use serde::{Deserialize, Serialize};

/// Repository tag for packages that were dropped in from disk rather than fetched.
pub const LOCAL_ORIGIN: &str = "local";

const DEFAULT_VERSION: &str = "1.0.0";

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// A package as described by its manifest. Immutable once parsed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PackageDescriptor {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "file")]
    pub archive_reference: String,
    #[serde(rename = "icon", default)]
    pub icon_reference: String,
    #[serde(rename = "args", default)]
    pub launch_args: Vec<String>,
    #[serde(skip, default)]
    pub origin_repository: String,
}

impl PackageDescriptor {
    /// Parses a single manifest object and tags it with the repository it came from.
    pub fn from_manifest(json: &str, origin: &str) -> Result<Self, serde_json::Error> {
        let mut descriptor: PackageDescriptor = serde_json::from_str(json)?;
        descriptor.origin_repository = origin.to_string();
        Ok(descriptor)
    }

    /// Builds a descriptor for an archive that lives on the local disk.
    pub fn local(archive: &str) -> Self {
        let title = camino::Utf8Path::new(archive)
            .file_name()
            .map(|n| n.trim_end_matches(".tar.xz").to_string())
            .unwrap_or_else(|| archive.to_string());

        Self {
            title,
            author: "Unknown".into(),
            description: String::new(),
            version: default_version(),
            archive_reference: archive.to_string(),
            icon_reference: String::new(),
            launch_args: Vec::new(),
            origin_repository: LOCAL_ORIGIN.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin_repository == LOCAL_ORIGIN
    }

    /// Description with line breaks turned into markup breaks for the display layer.
    pub fn display_description(&self) -> String {
        self.description.replace("\r\n", "\n").replace('\n', "<br>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_defaults_fill_optional_fields() {
        let json = r#"{"title":"Demo","author":"me","description":"a","file":"https://x/y.tar.xz","icon":"https://x/y.png"}"#;
        let p = PackageDescriptor::from_manifest(json, "https://repo").unwrap();
        assert_eq!(p.version, DEFAULT_VERSION);
        assert!(p.launch_args.is_empty());
        assert_eq!(p.origin_repository, "https://repo");
        assert!(!p.is_local());
    }

    #[test]
    fn description_breaks_become_markup() {
        let mut p = PackageDescriptor::local("/tmp/pkg.tar.xz");
        p.description = "one\r\ntwo\nthree".into();
        assert_eq!(p.display_description(), "one<br>two<br>three");
        assert_eq!(p.title, "pkg");
        assert!(p.is_local());
    }
}
