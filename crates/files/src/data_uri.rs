//! Data URI decoding
//!
//! Parses `data:[<media type>][;<parameter>]*[;base64],<payload>` into a media type and
//! the decoded bytes. The payload is percent-decoded first; when the `base64` marker is
//! present the result is then base64-decoded (padding optional, ASCII whitespace ignored).

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

const SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64";
const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// Errors raised while decoding a data URI
#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error("missing `data:` scheme")]
    MissingScheme,

    #[error("missing `,` between header and payload")]
    MissingComma,

    #[error("invalid media type `{0}`")]
    InvalidMediaType(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// A decoded data URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    media_type: String,
    parameters: Vec<(String, String)>,
    data: Vec<u8>,
}

impl DataUri {
    /// Decodes a data URI
    ///
    /// An empty media type defaults to `text/plain`. Media types are lowercased.
    ///
    /// # Errors
    ///
    /// Returns `DataUriError` if the scheme or the comma separator is missing, the media
    /// type is not of the form `type/subtype`, or a base64 payload does not decode.
    pub fn parse(input: &str) -> Result<Self, DataUriError> {
        let input = input.trim_matches(|c: char| c.is_ascii_whitespace());

        let rest = match input.get(..SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &input[SCHEME.len()..],
            _ => return Err(DataUriError::MissingScheme),
        };

        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingComma)?;

        let mut segments: Vec<&str> = header.split(';').map(str::trim).collect();
        let is_base64 = segments.len() > 1
            && segments
                .last()
                .is_some_and(|s| s.eq_ignore_ascii_case(BASE64_MARKER));
        if is_base64 {
            segments.pop();
        }

        let media_type = parse_media_type(segments.first().copied().unwrap_or_default())?;
        let parameters = segments
            .iter()
            .skip(1)
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_owned()))
            .collect();

        let bytes = percent_decode(payload.as_bytes());
        let data = if is_base64 {
            let compact: Vec<u8> = bytes
                .into_iter()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64_engine().decode(compact)?
        } else {
            bytes
        };

        Ok(Self {
            media_type,
            parameters,
            data,
        })
    }

    /// The media type essence, e.g. `image/png`
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Looks up a media type parameter such as `charset`
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

fn base64_engine() -> GeneralPurpose {
    GeneralPurpose::new(
        &alphabet::STANDARD,
        GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
}

fn parse_media_type(raw: &str) -> Result<String, DataUriError> {
    if raw.is_empty() {
        return Ok(DEFAULT_MEDIA_TYPE.to_owned());
    }

    let is_token = |s: &str| {
        !s.is_empty()
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
    };

    match raw.split_once('/') {
        Some((kind, subtype)) if is_token(kind) && is_token(subtype) => {
            Ok(raw.to_ascii_lowercase())
        }
        _ => Err(DataUriError::InvalidMediaType(raw.to_owned())),
    }
}

/// Decodes `%XX` escapes; malformed escapes are kept verbatim
fn percent_decode(input: &[u8]) -> Vec<u8> {
    fn hex(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' && i + 2 < input.len() {
            if let (Some(hi), Some(lo)) = (hex(input[i + 1]), hex(input[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}
