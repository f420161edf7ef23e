//! Multipart uploads and their confinement to the upload directory

use std::convert::Infallible;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use multer::{Constraints, Multipart, SizeLimit};
use uuid::Uuid;

use crate::error::Error;

/// Name of the form field carrying the file
const FILE_FIELD: &str = "file";

/// A file extracted from an upload form
#[derive(Debug)]
pub struct UploadedFile {
    /// File name as sent by the client
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Extract the `file` field from a `multipart/form-data` body.
///
/// Fields named `file` that do not carry a file name are skipped, like any
/// other field.
pub fn parse_form(
    content_type: Option<&str>,
    body: Vec<u8>,
    limit: u64,
) -> Result<UploadedFile, Error> {
    let boundary = multer::parse_boundary(content_type.unwrap_or_default())?;
    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    futures::executor::block_on(async move {
        while let Some(field) = multipart.next_field().await? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }
            let Some(file_name) = field.file_name().map(str::to_owned) else {
                continue;
            };
            let data = field.bytes().await?;
            return Ok(UploadedFile {
                file_name,
                data: data.to_vec(),
            });
        }
        Err(Error::MissingFile)
    })
}

/// Reduce a client supplied file name to a single path component.
pub fn normalize_file_name(name: &str) -> Result<String, Error> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." || base.chars().any(char::is_control) {
        return Err(Error::InvalidFileName(name.to_owned()));
    }
    Ok(base.to_owned())
}

/// Directory holding uploaded files
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Open the store, creating `dir` if necessary.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Get the directory files are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `data` under the normalized `file_name`, replacing any file of
    /// that name.
    ///
    /// The content goes to a uniquely named temporary file first and is then
    /// renamed into place, so concurrent uploads of the same name never mix
    /// their contents. Returns the name the file was stored under.
    pub fn store(&self, file_name: &str, data: &[u8]) -> Result<String, Error> {
        let name = normalize_file_name(file_name)?;
        let dest = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{}.part", Uuid::new_v4()));

        if let Err(err) = write_then_rename(&tmp, &dest, data) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(name)
    }
}

fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            write!(body, "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"").unwrap();
            if let Some(file_name) = file_name {
                write!(body, "; filename=\"{file_name}\"").unwrap();
            }
            body.extend_from_slice(b"\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        write!(body, "--{boundary}--\r\n").unwrap();
        body
    }

    const CONTENT_TYPE: &str = "multipart/form-data; boundary=X-BOUNDARY";

    fn temp_store() -> UploadStore {
        let dir = std::env::temp_dir().join(format!("vending-upload-{}", Uuid::new_v4()));
        UploadStore::open(dir).unwrap()
    }

    #[test]
    fn parses_file_field() {
        let body = form(
            "X-BOUNDARY",
            &[
                ("comment", None, &b"hello"[..]),
                ("file", Some("notes.txt"), &b"\x00binary\r\ncontent"[..]),
            ],
        );
        let file = parse_form(Some(CONTENT_TYPE), body, 1 << 20).unwrap();
        assert_eq!(file.file_name, "notes.txt");
        assert_eq!(file.data, b"\x00binary\r\ncontent");
    }

    #[test]
    fn missing_file_field() {
        let body = form(
            "X-BOUNDARY",
            &[
                ("file", None, &b"not a file"[..]),
                ("other", Some("a.txt"), &b"x"[..]),
            ],
        );
        assert!(matches!(
            parse_form(Some(CONTENT_TYPE), body, 1 << 20),
            Err(Error::MissingFile)
        ));
    }

    #[test]
    fn rejects_non_multipart_bodies() {
        let err = parse_form(Some("application/json"), b"{}".to_vec(), 1 << 20).unwrap_err();
        assert!(err.is_internal());
        let err = parse_form(None, Vec::new(), 1 << 20).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn normalizes_names() {
        assert_eq!(normalize_file_name("report.pdf").unwrap(), "report.pdf");
        assert_eq!(normalize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(normalize_file_name("C:\\Users\\me\\a.txt").unwrap(), "a.txt");
        for bad in ["", "..", "dir/", "/", "a\nb", "  "] {
            assert!(normalize_file_name(bad).is_err(), "{bad:?} must be rejected");
        }
    }

    #[test]
    fn store_overwrites_and_leaves_no_temporaries() {
        let store = temp_store();
        assert_eq!(store.store("a.bin", b"first").unwrap(), "a.bin");
        assert_eq!(store.store("sub/a.bin", b"second").unwrap(), "a.bin");
        assert_eq!(fs::read(store.dir().join("a.bin")).unwrap(), b"second");
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
        fs::remove_dir_all(store.dir()).unwrap();
    }
}
