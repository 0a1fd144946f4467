use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::colors::TypeColorMap;
use crate::layout::LayoutItem;

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const STATE_PARAM: &str = "state";

/// Written into every token; tokens without it are read as version 1.
pub const PERMALINK_VERSION: u32 = 1;

/// Dashboard configuration carried by a shareable link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Permalink {
    pub layout: Vec<LayoutItem>,
    pub source_url: String,
    /// Refresh interval; 0 disables auto-refresh.
    pub interval_seconds: u64,
    pub type_colors: TypeColorMap,
}

#[derive(thiserror::Error, Debug)]
pub enum PermalinkFormatError {
    #[error("state token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("state token does not decode to text")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid JSON in `{param}`: {source}")]
    Json {
        param: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("`interval` must be a whole number of seconds, got `{0}`")]
    Interval(String),
    #[error("missing `{0}` parameter")]
    Missing(&'static str),
    #[error("unsupported permalink version `{0}`")]
    Version(String),
    #[error("link has no `state` parameter")]
    NoState,
}

// ------------------------------------------------------------------
// Token encoding
// ------------------------------------------------------------------

pub fn encode(link: &Permalink) -> Result<String, PermalinkFormatError> {
    let layout = to_json("layout", &link.layout)?;
    let type_colors = to_json("typeColors", &link.type_colors)?;

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("layout", &layout)
        .append_pair("url", &link.source_url)
        .append_pair("interval", &link.interval_seconds.to_string())
        .append_pair("typeColors", &type_colors)
        .append_pair("v", &PERMALINK_VERSION.to_string())
        .finish();

    Ok(STANDARD.encode(query))
}

pub fn decode(token: &str) -> Result<Permalink, PermalinkFormatError> {
    // A bare `+` in an unescaped query comes back as a space.
    let token = token.trim().replace(' ', "+");
    let query = String::from_utf8(STANDARD.decode(token)?)?;

    let mut layout = None;
    let mut source_url = None;
    let mut interval = None;
    let mut type_colors = None;
    let mut version = None;

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let value = value.into_owned();
        match &*key {
            "layout" => layout = Some(value),
            "url" => source_url = Some(value),
            "interval" => interval = Some(value),
            "typeColors" => type_colors = Some(value),
            "v" => version = Some(value),
            other => tracing::debug!(param = other, "ignoring permalink parameter"),
        }
    }

    if let Some(v) = version
        && v != PERMALINK_VERSION.to_string()
    {
        return Err(PermalinkFormatError::Version(v));
    }

    let layout: Option<Vec<LayoutItem>> = match layout {
        Some(raw) => from_json("layout", &raw)?,
        None => None,
    };
    let type_colors: Option<TypeColorMap> = match type_colors {
        Some(raw) => from_json("typeColors", &raw)?,
        None => None,
    };

    Ok(Permalink {
        layout: layout.unwrap_or_default(),
        source_url: source_url.ok_or(PermalinkFormatError::Missing("url"))?,
        interval_seconds: parse_interval(interval.as_deref())?,
        type_colors: type_colors.unwrap_or_default(),
    })
}

fn parse_interval(raw: Option<&str>) -> Result<u64, PermalinkFormatError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0),
        Some(s) => s
            .parse()
            .map_err(|_| PermalinkFormatError::Interval(s.to_string())),
    }
}

fn to_json<T: Serialize>(
    param: &'static str,
    value: &T,
) -> Result<String, PermalinkFormatError> {
    serde_json::to_string(value)
        .map_err(|source| PermalinkFormatError::Json { param, source })
}

fn from_json<T: DeserializeOwned>(
    param: &'static str,
    raw: &str,
) -> Result<T, PermalinkFormatError> {
    serde_json::from_str(raw)
        .map_err(|source| PermalinkFormatError::Json { param, source })
}

// ------------------------------------------------------------------
// Links
// ------------------------------------------------------------------

/// Full shareable link: `<base>/dashboard?state=<token>`.
pub fn href(
    base_url: &str,
    link: &Permalink,
) -> Result<String, PermalinkFormatError> {
    let token = encode(link)?;
    let escaped: String =
        form_urlencoded::byte_serialize(token.as_bytes()).collect();
    Ok(format!(
        "{}{}?{}={}",
        base_url.trim_end_matches('/'),
        DASHBOARD_PATH,
        STATE_PARAM,
        escaped
    ))
}

/// Extract the `state` token from a link or a bare query string.
pub fn token_from_href(href: &str) -> Result<String, PermalinkFormatError> {
    let query = href.split_once('?').map_or(href, |(_, q)| q);
    let query = query.split('#').next().unwrap_or_default();

    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == STATE_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or(PermalinkFormatError::NoState)
}

/// Decode a full link, a `state=...` query or a bare token.
pub fn decode_link(input: &str) -> Result<Permalink, PermalinkFormatError> {
    match token_from_href(input) {
        Ok(token) => decode(&token),
        Err(PermalinkFormatError::NoState) => decode(input),
        Err(e) => Err(e),
    }
}
