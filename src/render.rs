//! Plain-text rendering of listings for the terminal.

use crate::model::{Resolution, ShowSummary, VideoSummary};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display columns reserved for names.
pub const NAME_WIDTH: usize = 48;

/// One line per show: id, name, site URL.
pub fn shows_table(shows: &[ShowSummary]) -> String {
    let id_width = id_column_width(shows.iter().map(|s| s.id));
    let mut out = String::new();
    for show in shows {
        out.push_str(&format!(
            "{:>id_width$}  {}  {}\n",
            show.id,
            fit_width(&show.name, NAME_WIDTH),
            show.site_url,
            id_width = id_width
        ));
    }
    out
}

/// One line per video: id, duration, publish date, name, media URL for
/// `resolution` (falling back to the nearest rendition).
pub fn videos_table(videos: &[VideoSummary], resolution: Resolution) -> String {
    let id_width = id_column_width(videos.iter().map(|v| v.id));
    let mut out = String::new();
    for video in videos {
        let date = video
            .published_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let media = video
            .best_media_url(resolution)
            .map(|url| url.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:>id_width$}  {:>8}  {:<10}  {}  {}\n",
            video.id,
            format_duration(video.length_seconds),
            date,
            fit_width(&video.name, NAME_WIDTH),
            media,
            id_width = id_width
        ));
    }
    out
}

/// `m:ss` below an hour, `h:mm:ss` above.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Pads or truncates `text` to exactly `width` display columns.
pub fn fit_width(text: &str, width: usize) -> String {
    let text: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let text_width = text.width();
    if text_width <= width {
        return format!("{}{}", text, " ".repeat(width - text_width));
    }
    if width == 0 {
        return String::new();
    }

    // Leave one column for the ellipsis.
    let budget = width - 1;
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width - used));
    out
}

fn id_column_width(ids: impl Iterator<Item = u64>) -> usize {
    ids.map(|id| id.to_string().len()).max().unwrap_or(1)
}
