//! `data:` URL handling for reference and generated images.

use base64::Engine as _;
use std::path::Path;
use yonkoma_schema::InlineData;

/// Split `data:image/<type>;base64,<payload>` into inline data.
///
/// Remote URLs, non-image media and malformed input yield `None`; callers
/// skip those references.
pub fn parse_image_data_url(url: &str) -> Option<InlineData> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    if !mime_type.starts_with("image/") || data.is_empty() {
        return None;
    }
    Some(InlineData {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

pub fn to_data_url(inline: &InlineData) -> String {
    format!("data:{};base64,{}", inline.mime_type, inline.data)
}

pub fn inline_from_bytes(mime_type: &str, bytes: &[u8]) -> InlineData {
    InlineData {
        mime_type: mime_type.to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
    }
}

/// Guess an image MIME type from the file extension, JPEG when unknown.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
