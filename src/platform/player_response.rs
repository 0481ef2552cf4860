//! Player response payload embedded in the watch page

use crate::error::MediaError;
use crate::platform::extractor::find_balanced_end;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker identifying the script tag that carries the payload
const STREAMING_DATA_MARKER: &str = "streamingData";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResponse {
    #[serde(rename = "videoDetails")]
    pub video_details: VideoDetails,
    #[serde(rename = "streamingData")]
    pub streaming_data: StreamingData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingData {
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
    #[serde(rename = "adaptiveFormats", default)]
    pub adaptive_formats: Vec<FormatEntry>,
}

/// One stream entry as declared by the page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatEntry {
    pub itag: u32,
    #[serde(rename = "contentLength")]
    pub content_length: Option<String>,
    #[serde(rename = "signatureCipher")]
    pub signature_cipher: Option<String>,
    pub url: Option<String>,
}

/// Slice the player response JSON out of the page markup.
///
/// Takes the first inline script whose body mentions the streaming data
/// marker and returns the balanced object starting at its first `{`.
pub fn extract_player_response_json(html: &str) -> Result<&str, MediaError> {
    let script_re = Regex::new(r"(?is)<script[^>]*>(.*?)</script>")?;

    let body = script_re
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|body| body.contains(STREAMING_DATA_MARKER))
        .ok_or_else(|| MediaError::Parse("no script with streaming data".to_string()))?;

    body.find('{')
        .and_then(|start| find_balanced_end(body, start, '{', '}').map(|end| &body[start..=end]))
        .ok_or_else(|| MediaError::Parse("player response is not an object".to_string()))
}

/// Find the player script path, e.g. `/s/player/1f2e3d4c/player_ias.vflset/en_US/base.js`
pub fn extract_player_js_path(html: &str) -> Result<String, MediaError> {
    let path_re = Regex::new(r#"/s/player/[^"]+?\.js"#)?;
    path_re
        .find(html)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| MediaError::Parse("no player script reference".to_string()))
}

/// Version id of a player script: the path segment following `/player/`
pub fn player_version(path: &str) -> Result<String, MediaError> {
    path.split("/player/")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .map(|v| v.trim_end_matches(".js"))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MediaError::Parse(format!("no version in player path {}", path)))
}

/// Deserialize the payload, optionally rejecting keys the model does not know
pub fn decode_payload<T>(json: &str, ignore_unknown_fields: bool) -> Result<T, MediaError>
where
    T: DeserializeOwned + Serialize,
{
    let raw: Value = serde_json::from_str(json)
        .map_err(|e| MediaError::Parse(format!("player response is not JSON: {}", e)))?;
    let typed: T = serde_json::from_value(raw.clone())
        .map_err(|e| MediaError::Parse(format!("unexpected player response shape: {}", e)))?;

    if !ignore_unknown_fields {
        let known = serde_json::to_value(&typed)?;
        if let Some(path) = first_unknown_field(&raw, &known, "") {
            return Err(MediaError::Parse(format!("unknown field {}", path)));
        }
    }

    Ok(typed)
}

fn first_unknown_field(raw: &Value, known: &Value, path: &str) -> Option<String> {
    match (raw, known) {
        (Value::Object(raw), Value::Object(known)) => raw.iter().find_map(|(key, value)| {
            let child = format!("{}.{}", path, key);
            match known.get(key) {
                Some(known_value) => first_unknown_field(value, known_value, &child),
                None => Some(child.trim_start_matches('.').to_string()),
            }
        }),
        (Value::Array(raw), Value::Array(known)) => raw
            .iter()
            .zip(known.iter())
            .enumerate()
            .find_map(|(i, (r, k))| first_unknown_field(r, k, &format!("{}[{}]", path, i))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<script src="/s/player/1f2e3d4c/player_ias.vflset/en_US/base.js" nonce="x"></script>
<script>var ytcfg = {"a": 1};</script>
</head><body>
<script nonce="y">var ytInitialPlayerResponse = {"videoDetails":{"videoId":"abc","title":"T"},"streamingData":{"adaptiveFormats":[{"itag":140,"url":"https://m.test/a"}]}};var meta = {};</script>
</body></html>"#;

    #[test]
    fn test_extract_player_response_json() {
        let json = extract_player_response_json(PAGE).unwrap();
        assert!(json.starts_with(r#"{"videoDetails""#));
        assert!(json.ends_with(r#""url":"https://m.test/a"}]}}"#));
        assert!(serde_json::from_str::<Value>(json).is_ok());
    }

    #[test]
    fn test_missing_player_response() {
        let err = extract_player_response_json("<script>var x = {};</script>").unwrap_err();
        assert!(matches!(err, MediaError::Parse(_)));
    }

    #[test]
    fn test_extract_player_js_path_and_version() {
        let path = extract_player_js_path(PAGE).unwrap();
        assert_eq!(path, "/s/player/1f2e3d4c/player_ias.vflset/en_US/base.js");
        assert_eq!(player_version(&path).unwrap(), "1f2e3d4c");
        assert_eq!(player_version("/s/player/abcd.js").unwrap(), "abcd");
        assert!(extract_player_js_path("<html></html>").is_err());
    }

    #[test]
    fn test_decode_payload_ignores_unknown_fields() {
        let json = r#"{"responseContext":{},"videoDetails":{"videoId":"abc","title":"T","author":"A"},
            "streamingData":{"expiresInSeconds":"21540","adaptiveFormats":[{"itag":140,"url":"https://m.test/a","bitrate":1}]}}"#;
        let response: PlayerResponse = decode_payload(json, true).unwrap();
        assert_eq!(response.video_details.video_id, "abc");
        assert_eq!(response.streaming_data.adaptive_formats[0].itag, 140);
        assert!(response.streaming_data.formats.is_empty());
    }

    #[test]
    fn test_decode_payload_strict_names_unknown_field() {
        let json = r#"{"videoDetails":{"videoId":"abc","title":"T"},
            "streamingData":{"adaptiveFormats":[{"itag":140,"bitrate":1}]}}"#;
        let err = decode_payload::<PlayerResponse>(json, false).unwrap_err();
        match err {
            MediaError::Parse(msg) => assert!(msg.contains("streamingData.adaptiveFormats[0].bitrate")),
            other => panic!("unexpected error: {other}"),
        }

        let clean = r#"{"videoDetails":{"videoId":"abc","title":"T"},"streamingData":{"adaptiveFormats":[{"itag":140}]}}"#;
        assert!(decode_payload::<PlayerResponse>(clean, false).is_ok());
    }

    #[test]
    fn test_decode_payload_wrong_shape() {
        let err = decode_payload::<PlayerResponse>(r#"{"videoDetails":{}}"#, true).unwrap_err();
        assert!(matches!(err, MediaError::Parse(_)));
    }
}
