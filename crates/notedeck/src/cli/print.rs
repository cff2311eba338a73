use chrono::{DateTime, Utc};
use colored::Colorize;
use notedeckapp::model::{Note, NoteContent};
use timeago::Formatter;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;
const FOLDER_MARKER: &str = "▸";

pub(super) fn print_success(message: &str) {
    println!("{}", message.green());
}

pub(super) fn print_info(message: &str) {
    println!("{}", message.dimmed());
}

pub(super) fn print_full_note(key: &str, content: &NoteContent) {
    println!("{} {}", key.yellow(), content.title.bold());
    println!("--------------------------------");
    println!("{}", content.content);
}

/// One line per note: key, title (indented under its parent), age.
pub(super) fn print_notes(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes found.");
        return;
    }

    let key_width = key_column_width(notes);
    for note in notes {
        let key_str = format!("{} ", pad_to_width(&note.key, key_width));

        let is_folder = note.user_metadata.note_type() == Some("folder");
        let left_prefix = match (note.parent_id().is_empty(), is_folder) {
            (true, true) => format!("{} ", FOLDER_MARKER),
            (true, false) => "  ".to_string(),
            (false, true) => format!("  {} ", FOLDER_MARKER),
            (false, false) => "    ".to_string(),
        };

        let time_ago = note
            .last_modified
            .or(note.created_at)
            .map(format_time_ago)
            .unwrap_or_else(|| " ".repeat(TIME_WIDTH));

        let title = if note.title().is_empty() {
            "(untitled)".to_string()
        } else {
            note.title().to_string()
        };

        let fixed_width = key_str.width() + left_prefix.width() + TIME_WIDTH;
        let available = LINE_WIDTH.saturating_sub(fixed_width);
        let title_display = truncate_to_width(&title, available);
        let padding = available.saturating_sub(title_display.width());

        let title_colored = if is_folder {
            title_display.bold()
        } else {
            title_display.normal()
        };

        println!(
            "{}{}{}{}{}",
            key_str.dimmed(),
            left_prefix,
            title_colored,
            " ".repeat(padding),
            time_ago.dimmed()
        );
    }
}

/// Widest key in the listing, so every title starts in the same column.
fn key_column_width(notes: &[Note]) -> usize {
    notes.iter().map(|n| n.key.width()).max().unwrap_or(0)
}

fn pad_to_width(s: &str, width: usize) -> String {
    format!("{}{}", s, " ".repeat(width.saturating_sub(s.width())))
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }

    // Leave one column for the ellipsis.
    let budget = max_width.saturating_sub(1);
    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > budget {
            break;
        }
        result.push(c);
        current_width += char_width;
    }
    result.push('…');
    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let time_str = Formatter::new().convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_to_width("short", 20), "short");
    }

    #[test]
    fn truncate_keeps_exact_fit() {
        assert_eq!(truncate_to_width("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_to_width("exactly11!!", 10), "exactly11…");
    }

    #[test]
    fn key_column_fits_the_longest_key() {
        let notes: Vec<Note> = ["abcdefghijklm.md", "1735689600000-a1b2c3.md"]
            .iter()
            .map(|key| serde_json::from_value(serde_json::json!({ "key": key })).unwrap())
            .collect();

        let width = key_column_width(&notes);
        assert_eq!(width, 23);
        assert_eq!(pad_to_width(&notes[0].key, width).width(), 23);
        assert_eq!(pad_to_width(&notes[1].key, width), notes[1].key);
        assert_eq!(key_column_width(&[]), 0);
    }

    #[test]
    fn truncate_counts_display_width() {
        // Each CJK glyph is two columns wide.
        let out = truncate_to_width("日本語のノート", 7);
        assert_eq!(out, "日本語…");
        assert!(out.width() <= 7);
    }

    #[test]
    fn time_ago_is_right_aligned() {
        let s = format_time_ago(Utc::now() - chrono::Duration::hours(3));
        assert_eq!(s.width(), TIME_WIDTH);
        assert!(s.trim_start().starts_with("3 hours"));
    }
}
