//! Media type to file extension lookup

/// Resolves the file extension to use for a claimed media type
pub trait MimeResolver {
    /// Returns the extension (without the leading dot) for `media_type`, if one is known
    fn extension_for_media_type(&self, media_type: &str) -> Option<String>;
}

impl<F> MimeResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn extension_for_media_type(&self, media_type: &str) -> Option<String> {
        self(media_type)
    }
}

/// Extensions preferred over the first entry of the `mime_guess` table
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/svg+xml", "svg"),
    ("image/tiff", "tif"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/markdown", "md"),
    ("audio/mpeg", "mp3"),
    ("video/mpeg", "mpg"),
    ("application/octet-stream", "bin"),
    ("application/xml", "xml"),
];

/// [`MimeResolver`] backed by the `mime_guess` table
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeGuessResolver;

impl MimeResolver for MimeGuessResolver {
    fn extension_for_media_type(&self, media_type: &str) -> Option<String> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence.is_empty() {
            return None;
        }

        if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(mt, _)| *mt == essence) {
            return Some((*ext).to_owned());
        }

        mime_guess::get_mime_extensions_str(&essence)
            .and_then(|exts| exts.first())
            .map(|ext| (*ext).to_owned())
    }
}
