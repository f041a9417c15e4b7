use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::pipeline::session::RequestPayload;

/// Writes request payloads to disk, one file per part.
pub struct RequestWriter {
    dir: PathBuf,
}

impl RequestWriter {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create request dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_part(&self, identifier: &str, payload: &RequestPayload) -> anyhow::Result<PathBuf> {
        let name = part_file_name(identifier, payload.ordinal, payload.total);
        let path = self.dir.join(sanitize_filename(&name));
        std::fs::write(&path, &payload.text)
            .with_context(|| format!("write request: {}", path.display()))?;
        Ok(path)
    }
}

/// `<identifier>.part_<i>_of_<n>.txt`, zero-padded so files sort in part order.
pub fn part_file_name(identifier: &str, ordinal: usize, total: usize) -> String {
    let width = total.to_string().len().max(2);
    format!("{identifier}.part_{ordinal:0width$}_of_{total:0width$}.txt")
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}
