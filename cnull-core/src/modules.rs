//! Resolving module names to source streams.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::diagnostic::SourceError;

pub const SOURCE_EXTENSION: &str = "cnull";

/// An opened module, ready to be attached to a `CodeSource`.
pub struct ModuleStream {
    pub module_name: String,
    pub path: Option<PathBuf>,
    pub reader: Box<dyn BufRead>,
}

impl std::fmt::Debug for ModuleStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleStream")
            .field("module_name", &self.module_name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

pub trait ModuleProvider {
    /// Open the module called `name`. `Ok(None)` means no such module
    /// exists; `Err` means it exists but could not be opened.
    fn open_module(&self, name: &str) -> Result<Option<ModuleStream>, SourceError>;
}

/// Module name of a source file: its stem in PascalCase with everything
/// but ASCII letters and digits removed.
///
/// `src/my-module_1.cnull` becomes `MyModule1`.
pub fn module_name_from_path(path: impl AsRef<Path>) -> String {
    let stem = path
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = String::with_capacity(stem.len());
    for word in stem.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.extend(chars);
        }
    }
    name
}

/// Modules stored as `*.cnull` files anywhere below `root`.
///
/// The directory is scanned once, on the first lookup. Files added
/// afterwards are not seen by the same provider.
#[derive(Debug, Clone)]
pub struct FileSystemModules {
    root: PathBuf,
    index: OnceCell<BTreeMap<String, Vec<PathBuf>>>,
}

impl FileSystemModules {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSystemModules {
            root: root.into(),
            index: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a concrete source file.
    pub fn open_path(path: impl AsRef<Path>) -> Result<ModuleStream, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SourceError::FileNotFound(path.to_path_buf()),
            _ => SourceError::FileInaccessible {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;
        Ok(ModuleStream {
            module_name: module_name_from_path(path),
            path: Some(path.to_path_buf()),
            reader: Box::new(BufReader::new(file)),
        })
    }

    /// Module name -> every source file below `root` that carries it.
    fn index(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        self.index.get_or_init(|| {
            let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
            let entries = WalkDir::new(&self.root).sort_by_file_name().into_iter();
            for entry in entries {
                let path = match entry {
                    Ok(entry) => entry.into_path(),
                    Err(err) => {
                        debug!("skipping unreadable entry: {err}");
                        continue;
                    }
                };
                if path.is_file() && path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION) {
                    index.entry(module_name_from_path(&path)).or_default().push(path);
                }
            }
            debug!("indexed {} module(s) below {}", index.len(), self.root.display());
            index
        })
    }
}

impl ModuleProvider for FileSystemModules {
    fn open_module(&self, name: &str) -> Result<Option<ModuleStream>, SourceError> {
        match self.index().get(name).map(Vec::as_slice) {
            None | Some([]) => {
                debug!("module {name} not found below {}", self.root.display());
                Ok(None)
            }
            Some([path]) => {
                debug!("module {name} resolved to {}", path.display());
                Self::open_path(path).map(Some)
            }
            Some(paths) => Err(SourceError::AmbiguousModule {
                name: name.to_string(),
                paths: paths.to_vec(),
            }),
        }
    }
}

/// Modules held as text, keyed by module name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryModules {
    modules: HashMap<String, String>,
}

impl InMemoryModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.modules.insert(name.into(), text.into());
    }

    pub fn with_module(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }
}

impl ModuleProvider for InMemoryModules {
    fn open_module(&self, name: &str) -> Result<Option<ModuleStream>, SourceError> {
        Ok(self.modules.get(name).map(|text| ModuleStream {
            module_name: name.to_string(),
            path: None,
            reader: Box::new(Cursor::new(text.clone().into_bytes())),
        }))
    }
}
