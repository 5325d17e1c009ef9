use std::{
    fmt::Debug,
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::warn;
use zip::{ZipArchive, result::ZipError};

use crate::error::LoadError;

mod bootstrap;
pub use bootstrap::BootstrapClassLoader;

/// One element of the class path.
pub trait ClassPathEntry: Debug + Send + Sync {
    fn name(&self) -> &str;
    /// `file_name` is the binary class name followed by `.class`.
    /// A missing file is `Ok(None)`, not an error.
    fn find_class(&self, file_name: &str) -> Result<Option<Vec<u8>>, LoadError>;
}

/// Opens `path` as a directory or jar entry. Anything else is skipped.
pub fn open_class_path_entry(path: &Path) -> Result<Option<Box<dyn ClassPathEntry>>, LoadError> {
    if path.is_dir() {
        return Ok(Some(Box::new(DirectoryEntry::new(path))));
    }
    let is_archive = path
        .extension()
        .is_some_and(|ext| ext == "jar" || ext == "zip");
    if is_archive && path.is_file() {
        return Ok(Some(Box::new(JarEntry::open(path)?)));
    }
    warn!(path = %path.display(), "ignoring class path entry");
    Ok(None)
}

#[derive(Debug)]
pub struct DirectoryEntry {
    name: String,
    base_path: PathBuf,
}

impl DirectoryEntry {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            name: base_path.display().to_string(),
            base_path,
        }
    }
}

impl ClassPathEntry for DirectoryEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_class(&self, file_name: &str) -> Result<Option<Vec<u8>>, LoadError> {
        match fs::read(self.base_path.join(file_name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug)]
pub struct JarEntry {
    name: String,
    archive: Mutex<ZipArchive<File>>,
}

impl JarEntry {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let archive = ZipArchive::new(File::open(path)?)?;
        Ok(Self {
            name: path.display().to_string(),
            archive: Mutex::new(archive),
        })
    }
}

impl ClassPathEntry for JarEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_class(&self, file_name: &str) -> Result<Option<Vec<u8>>, LoadError> {
        let mut archive = self.archive.lock();
        let mut class_file = match archive.by_name(file_name) {
            Ok(class_file) => class_file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut content = Vec::with_capacity(class_file.size() as usize);
        class_file.read_to_end(&mut content)?;
        Ok(Some(content))
    }
}
