//! Component discovery: component id → list of binary units.
//!
//! Discovery only lists names and byte sources. Nothing here reads or
//! decodes class bytes; that happens later, per unit, in `TypeRoot`.

use ignore::WalkBuilder;
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::config::{ComponentSpec, SessionConfig};
use crate::error::{ApiModelError, Result, UnitFault};
use crate::source::{ArchiveEntrySource, ByteSource, FileSource};

#[derive(Debug, Clone)]
pub struct DiscoveredUnit {
    pub qualified_name: String,
    pub source: Arc<dyn ByteSource>,
}

/// Everything found for one component. Entries that could not even be
/// listed show up in `faults` instead of being dropped.
#[derive(Debug, Default)]
pub struct Discovery {
    pub version: Option<String>,
    pub units: Vec<DiscoveredUnit>,
    pub faults: Vec<UnitFault>,
}

pub trait ComponentDiscovery: Send + Sync {
    /// Fails with `ComponentNotFound` when `id` has no content source.
    fn discover(&self, id: &str) -> Result<Discovery>;
}

/// Discovery over explicitly configured classpath roots. Each root is a
/// directory of class files (and jars), or a jar/zip archive.
#[derive(Debug, Clone, Default)]
pub struct PathDiscovery {
    components: BTreeMap<String, ComponentSpec>,
}

impl PathDiscovery {
    pub fn new(components: BTreeMap<String, ComponentSpec>) -> Self {
        Self { components }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.components.clone())
    }

    pub fn component_ids(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

impl ComponentDiscovery for PathDiscovery {
    fn discover(&self, id: &str) -> Result<Discovery> {
        let spec = self
            .components
            .get(id)
            .ok_or_else(|| ApiModelError::ComponentNotFound { id: id.to_string() })?;

        let existing: Vec<&PathBuf> = spec.roots.iter().filter(|r| r.exists()).collect();
        if existing.is_empty() {
            return Err(ApiModelError::ComponentNotFound { id: id.to_string() });
        }

        let mut discovery = Discovery {
            version: spec.version.clone(),
            ..Discovery::default()
        };
        for root in existing {
            if root.is_dir() {
                list_directory(root, &mut discovery);
            } else if is_archive(root) {
                list_archive(root, &mut discovery);
            } else {
                warn!(root = %root.display(), "ignoring classpath root that is neither directory nor archive");
            }
        }
        debug!(
            component = id,
            units = discovery.units.len(),
            faults = discovery.faults.len(),
            "component content listed"
        );
        Ok(discovery)
    }
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}

/// Maps a `.class` path inside a root (`a/b/C$D.class`) to `a.b.C$D`.
/// Returns `None` for entries that are not types.
pub fn class_entry_to_qualified_name(entry: &str) -> Option<Result<String>> {
    let stem = entry.strip_suffix(".class")?;
    let stem = stem.trim_start_matches('/');
    let file_name = stem.rsplit('/').next().unwrap_or(stem);
    if file_name == "module-info" || file_name == "package-info" {
        return None;
    }
    // Multi-release overlays shadow the base entries; the base wins.
    if stem.starts_with("META-INF/") {
        return None;
    }
    if stem.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Some(Err(ApiModelError::malformed(format!(
            "invalid class entry name {entry:?}"
        ))));
    }
    Some(Ok(stem.replace('/', ".")))
}

fn push_entry(
    discovery: &mut Discovery,
    entry: &str,
    location: String,
    source: Arc<dyn ByteSource>,
) {
    match class_entry_to_qualified_name(entry) {
        None => {}
        Some(Ok(qualified_name)) => discovery.units.push(DiscoveredUnit {
            qualified_name,
            source,
        }),
        Some(Err(err)) => {
            warn!(location = %location, error = %err, "skipping unlistable entry");
            discovery.faults.push(UnitFault::new(entry, location, &err));
        }
    }
}

fn list_directory(root: &Path, discovery: &mut Discovery) {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if !entry.file_type().is_some_and(|t| t.is_file()) {
                        return ignore::WalkState::Continue;
                    }
                    if path.extension().is_some_and(|e| e == "class") || is_archive(path) {
                        let _ = tx.send(Ok(path.to_path_buf()));
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err.to_string()));
                }
            }
            ignore::WalkState::Continue
        })
    });
    drop(tx);

    // The parallel walk has no stable order; sort so "first wins" on
    // duplicates is reproducible.
    let mut found: Vec<std::result::Result<PathBuf, String>> = rx.iter().collect();
    found.sort();

    let mut archives = Vec::new();
    for item in found {
        let path = match item {
            Ok(path) => path,
            Err(message) => {
                let err = ApiModelError::source_unavailable(
                    root.display().to_string(),
                    std::io::Error::other(message),
                );
                warn!(root = %root.display(), error = %err, "directory walk error");
                discovery
                    .faults
                    .push(UnitFault::new("", root.display().to_string(), &err));
                continue;
            }
        };
        if is_archive(&path) {
            archives.push(path);
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let entry = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let location = path.display().to_string();
        push_entry(discovery, &entry, location, Arc::new(FileSource::new(&path)));
    }

    // Loose classes come first on a merged classpath, then nested archives.
    for archive in archives {
        list_archive(&archive, discovery);
    }
}

fn list_archive(archive_path: &Path, discovery: &mut Discovery) {
    let names = match archive_entry_names(archive_path) {
        Ok(names) => names,
        Err(err) => {
            warn!(archive = %archive_path.display(), error = %err, "unreadable archive");
            discovery.faults.push(UnitFault::new(
                "",
                archive_path.display().to_string(),
                &err,
            ));
            return;
        }
    };

    for (index, name) in names {
        let name = match name {
            Ok(name) => name,
            Err(err) => {
                let location = format!("{}!/#{index}", archive_path.display());
                warn!(location = %location, error = %err, "unreadable archive member");
                discovery
                    .faults
                    .push(UnitFault::new(format!("#{index}"), location, &err));
                continue;
            }
        };
        let location = format!("{}!/{}", archive_path.display(), name);
        let source = Arc::new(ArchiveEntrySource::new(archive_path, name.as_str()));
        push_entry(discovery, &name, location, source);
    }
}

type EntryNames = Vec<(usize, Result<String>)>;

fn archive_entry_names(archive_path: &Path) -> Result<EntryNames> {
    let location = archive_path.display().to_string();
    let file =
        File::open(archive_path).map_err(|e| ApiModelError::source_unavailable(&location, e))?;
    // SAFETY: The file is opened read-only and remains valid for the lifetime of the mmap.
    // The mmap is dropped before the file, ensuring memory safety.
    let mmap = unsafe { Mmap::map(&file) }
        .map_err(|e| ApiModelError::source_unavailable(&location, e))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .map_err(|e| ApiModelError::source_unavailable(&location, e))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        match archive.by_index(i) {
            Ok(entry) if entry.is_dir() => {}
            Ok(entry) => names.push((i, Ok(entry.name().to_string()))),
            Err(e) => names.push((
                i,
                Err(ApiModelError::source_unavailable(format!("{location}!/#{i}"), e)),
            )),
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    fn spec(roots: Vec<PathBuf>) -> ComponentSpec {
        ComponentSpec {
            roots,
            version: Some("1.0".to_string()),
        }
    }

    fn names(discovery: &Discovery) -> Vec<&str> {
        discovery
            .units
            .iter()
            .map(|u| u.qualified_name.as_str())
            .collect()
    }

    #[test]
    fn entry_names_map_to_qualified_names() {
        assert_eq!(
            class_entry_to_qualified_name("org/example/A$B.class")
                .unwrap()
                .unwrap(),
            "org.example.A$B"
        );
        assert!(class_entry_to_qualified_name("org/example/package-info.class").is_none());
        assert!(class_entry_to_qualified_name("module-info.class").is_none());
        assert!(class_entry_to_qualified_name("META-INF/versions/11/a/A.class").is_none());
        assert!(class_entry_to_qualified_name("META-INF/MANIFEST.MF").is_none());
        assert!(matches!(
            class_entry_to_qualified_name("a//B.class"),
            Some(Err(_))
        ));
    }

    #[test]
    fn lists_archive_without_reading_members() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("demo-1.0.jar");
        write_jar(
            &jar,
            &[
                ("org/example/A.class", &b"not even a class file"[..]),
                ("org/example/A$Inner.class", &b""[..]),
                ("META-INF/MANIFEST.MF", &b""[..]),
            ],
        );

        let discovery = PathDiscovery::new(BTreeMap::from([("demo".to_string(), spec(vec![jar]))]));
        let found = discovery.discover("demo").unwrap();
        let mut listed = names(&found);
        listed.sort();
        assert_eq!(listed, vec!["org.example.A", "org.example.A$Inner"]);
        assert!(found.faults.is_empty());
        assert_eq!(found.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn lists_directory_classes_and_nested_jars() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("classes");
        std::fs::create_dir_all(classes.join("a/b")).unwrap();
        std::fs::write(classes.join("a/b/C.class"), b"").unwrap();
        std::fs::write(classes.join("a/readme.txt"), b"").unwrap();
        write_jar(&classes.join("lib.jar"), &[("z/Z.class", &b""[..])]);

        let discovery =
            PathDiscovery::new(BTreeMap::from([("demo".to_string(), spec(vec![classes]))]));
        let found = discovery.discover("demo").unwrap();
        assert_eq!(names(&found), vec!["a.b.C", "z.Z"]);
    }

    #[test]
    fn corrupt_archive_is_a_fault_not_an_abort() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jar");
        let bad = dir.path().join("bad.jar");
        write_jar(&good, &[("g/G.class", &b""[..])]);
        std::fs::write(&bad, b"this is not a zip").unwrap();

        let discovery = PathDiscovery::new(BTreeMap::from([(
            "demo".to_string(),
            spec(vec![bad, good]),
        )]));
        let found = discovery.discover("demo").unwrap();
        assert_eq!(names(&found), vec!["g.G"]);
        assert_eq!(found.faults.len(), 1);
        assert!(found.faults[0].location.ends_with("bad.jar"));
    }

    #[test]
    fn unknown_or_missing_component_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = PathDiscovery::new(BTreeMap::from([(
            "ghost".to_string(),
            spec(vec![dir.path().join("missing.jar")]),
        )]));
        assert!(matches!(
            discovery.discover("ghost"),
            Err(ApiModelError::ComponentNotFound { .. })
        ));
        assert!(matches!(
            discovery.discover("nobody"),
            Err(ApiModelError::ComponentNotFound { .. })
        ));
    }
}
