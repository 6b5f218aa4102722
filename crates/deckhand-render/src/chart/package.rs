//! Chart archives
//!
//! Packs rendered chart files into `{name}-{version}.tgz` with every entry
//! under a `{name}/` prefix, the layout `helm install` expects.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

use crate::error::{RenderError, Result};

/// Write `files` (chart-relative path, content) into an archive at `output`
pub(super) fn create_archive(
    chart_name: &str,
    files: &[(String, String)],
    output: &Path,
) -> Result<PathBuf> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| RenderError::write(parent, e))?;
    }
    let file = File::create(output).map_err(|e| RenderError::write(output, e))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for (path, content) in files {
        add_bytes_to_archive(
            &mut builder,
            &format!("{chart_name}/{path}"),
            content.as_bytes(),
        )?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()?;

    tracing::info!(archive = %output.display(), files = files.len(), "packaged chart");
    Ok(output.to_path_buf())
}

fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    // Fixed mtime keeps archives reproducible
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;
    use tempfile::TempDir;

    #[test]
    fn test_archive_entries_are_prefixed() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("web-0.1.0.tgz");
        let files = vec![
            ("Chart.yaml".to_string(), "name: web\n".to_string()),
            ("templates/service.yaml".to_string(), "kind: Service\n".to_string()),
        ];
        create_archive("web", &files, &output).unwrap();

        let mut archive = Archive::new(GzDecoder::new(File::open(&output).unwrap()));
        let mut seen = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().to_string();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            seen.push((path, content));
        }
        assert_eq!(seen[0], ("web/Chart.yaml".to_string(), "name: web\n".to_string()));
        assert_eq!(seen[1].0, "web/templates/service.yaml");
    }

    #[test]
    fn test_archives_are_reproducible() {
        let dir = TempDir::new().unwrap();
        let files = vec![("values.yaml".to_string(), "replicaCount: 1\n".to_string())];
        let a = create_archive("web", &files, &dir.path().join("a.tgz")).unwrap();
        let b = create_archive("web", &files, &dir.path().join("b.tgz")).unwrap();
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}
