//! MIME types by file extension.

const FALLBACK: &str = "application/octet-stream";
const EPUB: &str = "application/epub+zip";

static TYPES: &[(&str, &str)] = &[
    ("azw3", "application/vnd.amazon.ebook"),
    ("chm", "application/vnd.ms-htmlhelp"),
    ("djvu", "image/vnd.djvu"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("epub", EPUB),
    ("fb2", "application/x-fictionbook+xml"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("mobi", "application/x-mobipocket-ebook"),
    ("pdf", "application/pdf"),
    ("prc", "application/x-mobipocket-ebook"),
    ("rtf", "text/rtf"),
    ("tcr", "application/x-tcr-ebook"),
    ("txt", "text/plain"),
];

/// MIME type of a book, guessed from its path.
///
/// Kobo-style `kepub` files are plain EPUBs as far as the reader is concerned.
///
/// ```
/// use pbsync_library::mime_type;
/// assert_eq!(mime_type("Books/a.epub"), "application/epub+zip");
/// assert_eq!(mime_type("Books/b.kepub.epub"), "application/epub+zip");
/// assert_eq!(mime_type("Books/c.FB2"), "application/x-fictionbook+xml");
/// ```
pub fn mime_type(path: &str) -> &'static str {
    if path.contains("kepub") {
        return EPUB;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return FALLBACK;
    };
    let extension = extension.to_ascii_lowercase();
    TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK)
}
