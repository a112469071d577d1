//! Static extension table: category and MIME type for every extension the
//! service knows about, plus the per-kind upload allow-lists.
//!
//! Extensions are stored lowercase with a leading dot. Compound archive
//! suffixes (`.tar.gz` and friends) are matched as whole units before the
//! last-dot rule, otherwise `backup.tar.gz` would be read as a bare `.gz`.

use crate::models::{FileCategory, UploadKind};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Multi-part suffixes, checked before single extensions.
pub const COMPOUND_EXTENSIONS: [&str; 3] = [".tar.gz", ".tar.bz2", ".tar.xz"];

#[derive(Debug, Clone, Copy)]
struct Entry {
    ext: &'static str,
    category: FileCategory,
    mime: &'static str,
}

const fn entry(ext: &'static str, category: FileCategory, mime: &'static str) -> Entry {
    Entry {
        ext,
        category,
        mime,
    }
}

use FileCategory::{Archive, Document, Image, Table, Unknown, Video};

const CATALOG: &[Entry] = &[
    // documents
    entry(".md", Document, "text/markdown"),
    entry(".txt", Document, "text/plain"),
    entry(".pdf", Document, "application/pdf"),
    entry(".html", Document, "text/html"),
    entry(".htm", Document, "text/html"),
    entry(".css", Document, "text/css"),
    entry(".js", Document, "text/javascript"),
    entry(".json", Document, "application/json"),
    entry(".map", Document, "application/json"),
    // images
    entry(".jpg", Image, "image/jpeg"),
    entry(".jpeg", Image, "image/jpeg"),
    entry(".png", Image, "image/png"),
    entry(".gif", Image, "image/gif"),
    entry(".svg", Image, "image/svg+xml"),
    entry(".ico", Image, "image/x-icon"),
    // videos
    entry(".mp4", Video, "video/mp4"),
    entry(".webm", Video, "video/webm"),
    entry(".ogg", Video, "video/ogg"),
    entry(".mov", Video, "video/quicktime"),
    // archives
    entry(".tar.gz", Archive, "application/gzip"),
    entry(".tar.bz2", Archive, "application/x-bzip2"),
    entry(".tar.xz", Archive, "application/x-xz"),
    entry(".zip", Archive, "application/zip"),
    entry(".rar", Archive, "application/x-rar-compressed"),
    entry(".7z", Archive, "application/x-7z-compressed"),
    entry(".tar", Archive, "application/x-tar"),
    entry(".gz", Archive, "application/gzip"),
    entry(".bz2", Archive, "application/x-bzip2"),
    entry(".xz", Archive, "application/x-xz"),
    entry(".tgz", Archive, "application/gzip"),
    entry(".tbz", Archive, "application/x-bzip2"),
    entry(".tbz2", Archive, "application/x-bzip2"),
    entry(".txz", Archive, "application/x-xz"),
    // tables
    entry(".xls", Table, "application/vnd.ms-excel"),
    entry(
        ".xlsx",
        Table,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    entry(
        ".xlsm",
        Table,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    entry(".ods", Table, "application/vnd.oasis.opendocument.spreadsheet"),
    entry(".csv", Table, "text/csv"),
    entry(".tsv", Table, "text/tab-separated-values"),
    entry(
        ".xlsb",
        Table,
        "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
    ),
    entry(".xlt", Table, "application/vnd.ms-excel"),
    entry(
        ".xltx",
        Table,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
    ),
    entry(
        ".xltm",
        Table,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.template",
    ),
    entry(".numbers", Table, "application/x-iwork-numbers-sffnumbers"),
    entry(".prn", Table, OCTET_STREAM),
    entry(".slk", Table, "application/vnd.slink"),
    entry(".parquet", Table, "application/parquet"),
    entry(".feather", Table, "application/feather"),
    entry(".orc", Table, "application/orc"),
    // files without an extension
    entry("", Unknown, OCTET_STREAM),
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".svg", ".ico"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".ogg", ".mov"];

/// Lowercase an extension and make sure it carries a leading dot.
/// The empty extension stays empty.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Extract the normalized extension of a file name, compound suffixes first.
///
/// Returns an empty string when the name has no extension. A leading dot on
/// the final path component (`.env`) does not count as an extension.
pub fn extension_of(file_name: &str) -> String {
    let lower = file_name.trim().to_ascii_lowercase();
    let base = lower.rsplit(['/', '\\']).next().unwrap_or(&lower);

    if let Some(compound) = COMPOUND_EXTENSIONS
        .iter()
        .find(|c| base.len() > c.len() && base.ends_with(**c))
    {
        return (*compound).to_string();
    }

    match base.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < base.len() => base[pos..].to_string(),
        _ => String::new(),
    }
}

/// Category and MIME type for an extension. Unknown extensions never fail;
/// they classify as `Unknown` / `application/octet-stream`.
pub fn classify(ext: &str) -> (FileCategory, &'static str) {
    let ext = normalize_extension(ext);
    CATALOG
        .iter()
        .find(|e| e.ext == ext)
        .map(|e| (e.category, e.mime))
        .unwrap_or((FileCategory::Unknown, OCTET_STREAM))
}

/// Whether the catalog has an entry for this extension.
pub fn is_known(ext: &str) -> bool {
    let ext = normalize_extension(ext);
    CATALOG.iter().any(|e| e.ext == ext)
}

/// Every catalogued extension, compound suffixes first.
pub fn all_extensions() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|e| e.ext)
}

/// Upload allow-list for a kind. `File` and `Media` accept every catalogued
/// extension, including files with no extension at all.
pub fn allowed_extensions(kind: UploadKind) -> Vec<&'static str> {
    match kind {
        UploadKind::Image => IMAGE_EXTENSIONS.to_vec(),
        UploadKind::Video => VIDEO_EXTENSIONS.to_vec(),
        UploadKind::File | UploadKind::Media => all_extensions().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_case_insensitive_and_accepts_bare_extensions() {
        assert_eq!(classify("PNG"), (FileCategory::Image, "image/png"));
        assert_eq!(classify(".Png"), (FileCategory::Image, "image/png"));
        assert_eq!(classify("xlsx").0, FileCategory::Table);
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(classify(".xyz123"), (FileCategory::Unknown, OCTET_STREAM));
    }

    #[test]
    fn compound_extension_wins_over_last_dot() {
        assert_eq!(extension_of("Backup.TAR.GZ"), ".tar.gz");
        assert_eq!(extension_of("logs.tar.xz"), ".tar.xz");
        assert_eq!(extension_of("plain.gz"), ".gz");
        assert_eq!(classify(".tar.bz2"), (FileCategory::Archive, "application/x-bzip2"));
    }

    #[test]
    fn extension_of_handles_missing_and_hidden_suffixes() {
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".env"), "");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of("dir.v2/photo.JPG"), ".jpg");
    }

    #[test]
    fn allow_lists_follow_upload_kind() {
        assert!(allowed_extensions(UploadKind::Image).contains(&".svg"));
        assert!(!allowed_extensions(UploadKind::Image).contains(&".mp4"));
        assert!(allowed_extensions(UploadKind::Video).contains(&".mov"));
        let files = allowed_extensions(UploadKind::File);
        assert!(files.contains(&".parquet"));
        assert!(files.contains(&".tar.gz"));
        assert!(files.contains(&""));
    }
}
