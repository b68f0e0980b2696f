//! File discovery and reading for document ingestion.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use glob::Pattern;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Stable document id derived from a path: 32 hex chars of its SHA-256.
pub fn document_id(path: &Path) -> String {
    let hash = Sha256::digest(path.to_string_lossy().as_bytes());
    hex::encode(&hash[..16])
}

/// SHA-256 checksum of content, hex encoded.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Collect text files under `root` (or `root` itself when it is a file),
/// skipping anything matching one of the glob `exclude` patterns.
/// The result is sorted so ingestion order is reproducible.
pub fn collect_files(root: &Path, exclude: &[String]) -> Result<Vec<PathBuf>, glob::PatternError> {
    let patterns = exclude
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<Result<Vec<_>, _>>()?;

    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| !patterns.iter().any(|p| p.matches_path(path)))
        .filter(|path| is_text_file(path))
        .collect();

    files.sort();
    Ok(files)
}

/// Check if a file is likely a text file.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    // Sniff the first bytes for NULs
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut buffer = [0u8; 512];
    match std::io::BufReader::new(file).read(&mut buffer) {
        Ok(n) => !buffer[..n].contains(&0),
        Err(_) => false,
    }
}

/// Read a file as raw bytes, refusing files larger than `max_size`.
pub fn read_bytes(path: &Path, max_size: u64) -> std::io::Result<Vec<u8>> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }
    fs::read(path)
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "exe" | "dll" | "so" | "dylib" | "a" | "o" | "obj"
            | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "webp"
            | "mp3" | "mp4" | "avi" | "mkv" | "mov" | "wav" | "flac"
            | "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar"
            | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
            | "woff" | "woff2" | "ttf" | "otf"
            | "class" | "jar" | "pyc" | "db" | "sqlite" | "bin" | "onnx"
    )
}

fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "md" | "markdown" | "rst" | "txt" | "adoc" | "org" | "html" | "htm"
            | "json" | "yaml" | "yml" | "toml" | "xml" | "csv"
            | "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "h" | "cpp" | "rb" | "sh"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_stable() {
        let a = document_id(Path::new("/docs/a.md"));
        assert_eq!(a.len(), 32);
        assert_eq!(a, document_id(Path::new("/docs/a.md")));
        assert_ne!(a, document_id(Path::new("/docs/b.md")));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum("hello world").len(), 64);
    }

    #[test]
    fn test_collect_files_respects_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("notes.md");
        let skip_dir = dir.path().join("target");
        fs::create_dir_all(&skip_dir).unwrap();
        fs::write(&keep, "hello").unwrap();
        fs::write(skip_dir.join("out.md"), "ignored").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let files = collect_files(dir.path(), &["**/target/**".to_string()]).unwrap();
        assert_eq!(files, vec![keep]);
    }

    #[test]
    fn test_read_bytes_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, "0123456789").unwrap();

        assert!(read_bytes(&path, 100).is_ok());
        assert!(read_bytes(&path, 5).is_err());
    }

    #[test]
    fn test_binary_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("README");
        let binary = dir.path().join("blob");
        fs::write(&text, "plain text").unwrap();
        fs::write(&binary, [b'a', 0, b'b']).unwrap();

        assert!(is_text_file(&text));
        assert!(!is_text_file(&binary));
    }
}
