//! HTML fragments for the flashcard definition field.
//!
//! The export writer pastes the definition verbatim into the card, so the
//! text is escaped here and any selected images are appended as thumbnail
//! tags.  Image sources are reduced to the bare file name; the flashcard
//! application resolves media relative to its own collection folder.

use std::path::Path;

use crate::provider::ImageCandidate;

/// Escape the five HTML-significant characters.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// File-name component of `path`, or an empty string.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render one image as a thumbnail `<img>` tag.
pub fn thumbnail_tag(image: &ImageCandidate) -> String {
    let src = escape(&file_name(&image.local_path));
    let alt = escape(image.label.as_deref().unwrap_or(""));
    format!("<img src=\"{src}\" alt=\"{alt}\" class=\"thumb\">")
}

/// Escaped definition text followed by one thumbnail per image.
///
/// ```
/// use hanzi_cards::text::compose_definition;
///
/// assert_eq!(compose_definition("to study & learn", &[]), "to study &amp; learn");
/// ```
pub fn compose_definition(text: &str, images: &[ImageCandidate]) -> String {
    let mut html = escape(text);
    if images.is_empty() {
        return html;
    }

    html.push_str("<div class=\"images\">");
    for image in images {
        html.push_str(&thumbnail_tag(image));
    }
    html.push_str("</div>");
    html
}
