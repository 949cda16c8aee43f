use regex::Regex;
use std::sync::OnceLock;

pub const VIDEO_ID_LEN: usize = 11;

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})")
            .expect("video id pattern is valid")
    })
}

/// Pulls the 11 character video identifier out of a watch URL
/// (`?v=<id>`) or a path style URL (`youtu.be/<id>`, `/embed/<id>`,
/// `/live/<id>`). Returns `None` when no such token is present.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_regex()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
