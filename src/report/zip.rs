use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// In-memory file placed next to the document inside the bundle.
pub struct BundleEntry {
    pub name: &'static str,
    pub contents: Vec<u8>,
}

/// Writes `<stem>.zip` beside `document` with the document and `extra`
/// under a `<stem>/` directory. Returns the archive path.
pub fn write_bundle(document: &Path, extra: &[BundleEntry]) -> Result<PathBuf> {
    let stem = document
        .file_stem()
        .and_then(|s| s.to_str())
        .context("document path has no file name")?;
    let doc_name = document
        .file_name()
        .and_then(|s| s.to_str())
        .context("document path has no file name")?;
    let zip_path = document.with_extension("zip");
    let tmp_path = document.with_extension("zip.tmp");

    let file = File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let result = write_bundle_entries(&mut zip, document, stem, doc_name, extra);

    match result.and_then(|_| zip.finish().with_context(|| "failed to finalize zip")) {
        Ok(_) => {
            fs::rename(&tmp_path, &zip_path)
                .with_context(|| format!("failed to move zip to {}", zip_path.display()))?;
            Ok(zip_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn write_bundle_entries(
    zip: &mut ZipWriter<File>,
    document: &Path,
    root: &str,
    doc_name: &str,
    extra: &[BundleEntry],
) -> Result<()> {
    let stamp = zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
        .map_err(|_| anyhow!("invalid zip timestamp"))?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(stamp);

    zip.add_directory(format!("{}/", root), options)
        .with_context(|| "failed to add directory entry to zip")?;

    add_file(zip, document, &format!("{}/{}", root, doc_name), options)
        .with_context(|| format!("failed to add {} to zip", doc_name))?;

    for entry in extra {
        zip.start_file(format!("{}/{}", root, entry.name), options)
            .with_context(|| format!("failed to add {} to zip", entry.name))?;
        zip.write_all(&entry.contents)?;
    }
    Ok(())
}

fn add_file(
    zip: &mut ZipWriter<File>,
    src_path: &Path,
    zip_path: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    let mut file =
        File::open(src_path).with_context(|| format!("failed to open {}", src_path.display()))?;
    zip.start_file(zip_path, options)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        zip.write_all(&buf[..n])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::ZipArchive;

    #[test]
    fn bundle_contains_document_and_extras() {
        let dir = std::env::temp_dir().join(format!("carbon-report-zip-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let doc = dir.join("index.html");
        fs::write(&doc, "<html></html>").unwrap();

        let path = write_bundle(
            &doc,
            &[BundleEntry {
                name: "data.json",
                contents: b"{}".to_vec(),
            }],
        )
        .unwrap();
        assert_eq!(path, dir.join("index.zip"));
        assert!(!dir.join("index.zip.tmp").exists());

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut html = String::new();
        archive
            .by_name("index/index.html")
            .unwrap()
            .read_to_string(&mut html)
            .unwrap();
        assert_eq!(html, "<html></html>");
        assert!(archive.by_name("index/data.json").is_ok());
        let _ = fs::remove_dir_all(&dir);
    }
}
