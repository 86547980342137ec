use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::blocks::{VideoContent, VideoSource};

const ANIMATED_MARKERS: [&str; 3] = [".gif", "giphy", "tenor"];
const DIRECT_VIDEO_EXTENSIONS: [&str; 3] = [".mp4", ".webm", ".ogg"];
// Resolves site paths so they can be inspected like absolute URLs.
const SITE_BASE: &str = "http://site.invalid/";

/// Syntactically well-formed absolute URL.
pub fn is_well_formed_url(candidate: &str) -> bool {
    Url::parse(candidate.trim()).is_ok()
}

/// Path on this site, such as `/uploads/camera.png`. Protocol-relative
/// `//host/...` references are not site paths.
pub fn is_site_path(candidate: &str) -> bool {
    let candidate = candidate.trim();
    candidate.starts_with('/')
        && !candidate.starts_with("//")
        && !candidate.chars().any(char::is_whitespace)
}

fn parse_media_url(candidate: &str) -> Option<Url> {
    let candidate = candidate.trim();
    if is_site_path(candidate) {
        return Url::parse(SITE_BASE).ok()?.join(candidate).ok();
    }
    Url::parse(candidate).ok()
}

/// Image sources are absolute URLs, site paths or inline `data:` URIs.
pub fn is_acceptable_image_src(src: &str) -> bool {
    let src = src.trim();
    src.starts_with("data:") || is_site_path(src) || is_well_formed_url(src)
}

pub fn is_animated_image(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    ANIMATED_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Hosted players by absolute URL, or a direct file by URL or site path.
pub fn is_supported_video_url(candidate: &str) -> bool {
    let Some(parsed) = parse_media_url(candidate) else {
        return false;
    };
    let host = if is_site_path(candidate) {
        String::new()
    } else {
        parsed.host_str().unwrap_or_default().to_ascii_lowercase()
    };
    if host.contains("youtube.com") || host.contains("youtu.be") || host.contains("vimeo.com") {
        return true;
    }

    let path = parsed.path().to_ascii_lowercase();
    DIRECT_VIDEO_EXTENSIONS.iter().any(|extension| path.ends_with(extension))
}

pub fn detect_video_source(url: &str) -> VideoSource {
    if url.contains("youtube.com") || url.contains("youtu.be") {
        VideoSource::Youtube
    } else if url.contains("vimeo.com") {
        VideoSource::Vimeo
    } else {
        VideoSource::Url
    }
}

fn youtube_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
            )
            .ok()
        })
        .as_ref()
}

fn vimeo_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"vimeo\.com/([0-9]+)").ok()).as_ref()
}

/// Player URL for hosted videos; `None` for direct files or unparseable ids.
pub fn embed_url(video: &VideoContent) -> Option<String> {
    match video.source {
        VideoSource::Youtube => {
            let id = youtube_pattern()?.captures(&video.src)?.get(1)?.as_str();
            let mut params = Vec::new();
            if video.autoplay == Some(true) {
                params.push("autoplay=1");
            }
            if video.looped == Some(true) {
                params.push("loop=1");
            }
            if video.muted == Some(true) {
                params.push("mute=1");
            }
            if video.controls == Some(false) {
                params.push("controls=0");
            }
            Some(format!("https://www.youtube.com/embed/{id}?{}", params.join("&")))
        }
        VideoSource::Vimeo => {
            let id = vimeo_pattern()?.captures(&video.src)?.get(1)?.as_str();
            let mut params = Vec::new();
            if video.autoplay == Some(true) {
                params.push("autoplay=1");
            }
            if video.looped == Some(true) {
                params.push("loop=1");
            }
            if video.muted == Some(true) {
                params.push("muted=1");
            }
            Some(format!("https://player.vimeo.com/video/{id}?{}", params.join("&")))
        }
        VideoSource::Url => None,
    }
}
