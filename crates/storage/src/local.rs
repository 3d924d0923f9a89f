//! Local filesystem adapter over `std::fs`.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ember_common::{EmberError, Result};

use crate::{FileInfo, FileSystem};

/// Adapter for plain filesystem paths.
pub struct LocalFileSystem;

fn mtime_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn file_info(path: &Path, meta: &fs::Metadata) -> FileInfo {
    FileInfo {
        is_dir: meta.is_dir(),
        timestamp: mtime_secs(meta),
        size: meta.len(),
        name: path.to_string_lossy().into_owned(),
        domain: String::new(),
    }
}

impl FileSystem for LocalFileSystem {
    fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let p = Path::new(path);
        let meta = fs::metadata(p)?;
        if !meta.is_dir() {
            return Ok(vec![file_info(p, &meta)]);
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(p)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            out.push(file_info(&entry.path(), &meta));
        }
        Ok(out)
    }

    fn read(&self, path: &str, offset: u64, len: usize, buf: &mut [u8]) -> Result<usize> {
        let mut file = fs::File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let cap = len.min(buf.len());
        let mut read = 0;
        while read < cap {
            let n = file.read(&mut buf[read..cap])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }

    fn info(&self, path: &str) -> Result<FileInfo> {
        let p = Path::new(path);
        let meta = fs::metadata(p)?;
        Ok(file_info(p, &meta))
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        if let Some(parent) = Path::new(to).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)?;
        Ok(())
    }

    fn sync(&self, from: &str, to: &str, recursive: bool) -> Result<()> {
        let src = Path::new(from);
        if !fs::metadata(src)?.is_dir() {
            return self.copy(from, to);
        }
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let target = Path::new(to).join(entry.file_name());
            if meta.is_dir() {
                if recursive {
                    self.sync(
                        &entry.path().to_string_lossy(),
                        &target.to_string_lossy(),
                        true,
                    )?;
                }
            } else {
                fs::copy(entry.path(), target)?;
            }
        }
        Ok(())
    }

    fn temp(&self, is_dir: bool) -> Result<String> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| EmberError::InvalidConfig(format!("clock before epoch: {e}")))?
            .as_nanos();
        let path = std::env::temp_dir().join(format!("ember_{nanos}"));
        if is_dir {
            fs::create_dir_all(&path)?;
        } else {
            fs::File::create(&path)?;
        }
        Ok(path.to_string_lossy().into_owned())
    }

    fn rm(&self, path: &str) -> Result<()> {
        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn list_info_read_and_rm_cover_a_file_lifecycle() {
        let fs_impl = LocalFileSystem;
        let dir = fs_impl.temp(true).expect("temp dir");
        let file = Path::new(&dir).join("part-0");
        let mut f = fs::File::create(&file).expect("create");
        f.write_all(b"hello blocks").expect("write");
        drop(f);

        let listed = fs_impl.list(&dir).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 12);
        assert!(!listed[0].is_dir);

        let info = fs_impl.info(&file.to_string_lossy()).expect("info");
        assert_eq!(info.size, 12);
        assert!(info.signature().contains("_12_"));

        let mut buf = [0_u8; 5];
        let n = fs_impl
            .read(&file.to_string_lossy(), 6, 5, &mut buf)
            .expect("read");
        assert_eq!(&buf[..n], b"block");

        fs_impl.rm(&dir).expect("rm");
        assert!(fs::metadata(&dir).is_err());
    }

    #[test]
    fn listing_a_plain_file_returns_its_own_info() {
        let fs_impl = LocalFileSystem;
        let file = fs_impl.temp(false).expect("temp file");
        let listed = fs_impl.list(&file).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, file);
        fs_impl.rm(&file).expect("rm");
    }
}
