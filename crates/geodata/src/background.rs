use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

/// Decoder as forgiving as a browser's `atob`: padding is optional and
/// unused trailing bits are ignored.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".svg",
];

/// Decoded payloads at most this long are not treated as image data.
const RAW_MIN_DECODED_LEN: usize = 100;

/// How a background image's `url` field encodes the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// URL or path ending in a known image extension
    Url,
    /// `data:image/<subtype>;base64,...`
    DataUri,
    /// Bare base64 of binary image bytes
    RawBase64,
    Invalid,
}

pub fn classify_image_source(raw: &str) -> ImageSource {
    if is_image_url_or_path(raw) {
        ImageSource::Url
    } else if is_base64_data_uri(raw) {
        ImageSource::DataUri
    } else if is_raw_base64_image(raw) {
        ImageSource::RawBase64
    } else {
        ImageSource::Invalid
    }
}

/// Source usable by an image layer, or `None` when the payload matches no
/// recognized encoding.
pub fn resolve_image_src(raw: &str) -> Option<String> {
    match classify_image_source(raw) {
        ImageSource::Url | ImageSource::DataUri => Some(raw.to_string()),
        ImageSource::RawBase64 => {
            Some(format!("data:image/png;base64,{}", strip_whitespace(raw)))
        }
        ImageSource::Invalid => {
            tracing::warn!(
                len = raw.len(),
                "invalid background image data: expected an image URL, \
                 a base64 data URI or raw base64; rendering without background"
            );
            None
        }
    }
}

fn is_image_url_or_path(raw: &str) -> bool {
    let path = match raw.split_once("://") {
        Some((_, rest)) => {
            let without_query = rest
                .split(['?', '#'])
                .next()
                .unwrap_or_default();
            match without_query.find('/') {
                Some(slash) => &without_query[slash..],
                None => "",
            }
        }
        None => raw,
    };
    let lower = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_base64_data_uri(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix("data:image/") else {
        return false;
    };
    let subtype_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    subtype_len > 0 && rest[subtype_len..].starts_with(";base64,")
}

/// Line-wrapped (MIME) payloads decode once whitespace is gone.
fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

fn is_raw_base64_image(raw: &str) -> bool {
    let Ok(decoded) = FORGIVING.decode(strip_whitespace(raw)) else {
        return false;
    };
    decoded.len() > RAW_MIN_DECODED_LEN
        && decoded[..RAW_MIN_DECODED_LEN]
            .iter()
            .any(|&b| b <= 0x08 || (0x0E..=0x1F).contains(&b))
}
