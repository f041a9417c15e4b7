use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use zip::ZipArchive;

/// Something that holds named text entries: an archive or a single file.
pub trait ResourceSource {
    fn entry_names(&self) -> Vec<&str>;
    fn read_text(&mut self, name: &str) -> anyhow::Result<String>;
}

/// Zip-based container (`.jar`, `.zip`). Entries are read on demand.
pub struct ArchiveSource<R> {
    zip: ZipArchive<R>,
    names: Vec<String>,
}

impl ArchiveSource<File> {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open archive: {}", path.display()))?;
        Self::from_reader(f).with_context(|| format!("read archive: {}", path.display()))
    }
}

impl<R: Read + Seek> ArchiveSource<R> {
    pub fn from_reader(reader: R) -> anyhow::Result<Self> {
        let zip = ZipArchive::new(reader).context("read zip")?;
        let names = zip
            .file_names()
            .filter(|n| !n.ends_with('/'))
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut source = Self { zip, names };
        // file_names() follows the central directory hash order; keep archive order.
        source.sort_by_index();
        Ok(source)
    }

    fn sort_by_index(&mut self) {
        let zip = &self.zip;
        self.names
            .sort_by_key(|n| zip.index_for_name(n).unwrap_or(usize::MAX));
    }
}

impl<R: Read + Seek> ResourceSource for ArchiveSource<R> {
    fn entry_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    fn read_text(&mut self, name: &str) -> anyhow::Result<String> {
        let mut file = self
            .zip
            .by_name(name)
            .with_context(|| format!("zip entry: {name}"))?;
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data)
            .with_context(|| format!("read zip entry: {name}"))?;
        Ok(decode_text(&data))
    }
}

/// A lone resource file on disk, exposed as a one-entry source.
pub struct FlatFileSource {
    path: PathBuf,
    name: String,
}

impl FlatFileSource {
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResourceSource for FlatFileSource {
    fn entry_names(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn read_text(&mut self, name: &str) -> anyhow::Result<String> {
        if name != self.name {
            return Err(anyhow!("no entry {name} in {}", self.path.display()));
        }
        let data =
            std::fs::read(&self.path).with_context(|| format!("read: {}", self.path.display()))?;
        Ok(decode_text(&data))
    }
}

/// Decodes resource bytes, honouring a UTF-8 or UTF-16 BOM and dropping it.
pub fn decode_text(data: &[u8]) -> String {
    let (text, _, _) = encoding_rs::UTF_8.decode(data);
    text.into_owned()
}
