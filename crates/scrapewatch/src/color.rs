//! Terminal color helpers.
//!
//! Every helper respects `NO_COLOR`, `FORCE_COLOR` and TTY detection through
//! `owo-colors`' `if_supports_color()`. `--no-color` sets an in-process flag
//! that skips styling entirely.

use std::sync::atomic::{AtomicBool, Ordering};

use owo_colors::OwoColorize;
use owo_colors::Stream::{self, Stderr, Stdout};
use scrapewatch_core::{ItemStatus, NotificationKind, SessionStatus};

static NO_COLOR_FLAG: AtomicBool = AtomicBool::new(false);

/// Call once from main.rs when `--no-color` is passed.
pub fn set_no_color() {
    NO_COLOR_FLAG.store(true, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl Rgb {
    const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }
}

const ACCENT: Rgb = Rgb::from_hex(0x5FA8D3); // ids, names
const GOOD: Rgb = Rgb::from_hex(0x6BAF6B); // running, scraped
const CAUTION: Rgb = Rgb::from_hex(0xD6A24E); // paused, pending
const BAD: Rgb = Rgb::from_hex(0xC8604F); // failed, errors
const MUTED: Rgb = Rgb::from_hex(0x6A707C); // borders, hints

fn no_color() -> bool {
    NO_COLOR_FLAG.load(Ordering::Relaxed)
}

fn paint(text: &str, stream: Stream, rgb: Rgb) -> String {
    if no_color() {
        return text.to_string();
    }
    text.if_supports_color(stream, |t| t.truecolor(rgb.r, rgb.g, rgb.b))
        .to_string()
}

/// Session ids and names.
pub fn accent(text: &str) -> String {
    paint(text, Stdout, ACCENT)
}

pub fn good(text: &str) -> String {
    paint(text, Stdout, GOOD)
}

pub fn caution(text: &str) -> String {
    paint(text, Stdout, CAUTION)
}

pub fn bad(text: &str) -> String {
    paint(text, Stdout, BAD)
}

/// Secondary info, borders and hints on stdout.
pub fn muted(text: &str) -> String {
    paint(text, Stdout, MUTED)
}

pub fn bold(text: &str) -> String {
    if no_color() {
        return text.to_string();
    }
    text.if_supports_color(Stdout, |t| t.bold()).to_string()
}

/// Error styling for stderr messages.
pub fn error(text: &str) -> String {
    paint(text, Stderr, BAD)
}

/// Warning styling for stderr messages.
pub fn warning(text: &str) -> String {
    paint(text, Stderr, CAUTION)
}

/// Hint styling for secondary info on stderr.
pub fn hint(text: &str) -> String {
    paint(text, Stderr, MUTED)
}

/// Color a padded cell according to the session status it shows.
pub fn session_status(status: SessionStatus, cell: &str) -> String {
    match status {
        SessionStatus::Running => good(cell),
        SessionStatus::Paused | SessionStatus::Pending => caution(cell),
        SessionStatus::Failed => bad(cell),
        SessionStatus::Completed => accent(cell),
        _ => muted(cell),
    }
}

/// Color a padded cell according to the profile status it shows.
pub fn item_status(status: ItemStatus, cell: &str) -> String {
    match status {
        ItemStatus::Succeeded => good(cell),
        ItemStatus::Processing => accent(cell),
        ItemStatus::Pending => caution(cell),
        ItemStatus::Failed => bad(cell),
        _ => muted(cell),
    }
}

pub fn notification(kind: NotificationKind, text: &str) -> String {
    match kind {
        NotificationKind::Success => good(text),
        NotificationKind::Error => bad(text),
        NotificationKind::Warning => caution(text),
        NotificationKind::Info => accent(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_from_hex() {
        let c = Rgb::from_hex(0x5FA8D3);
        assert_eq!(c.r, 0x5F);
        assert_eq!(c.g, 0xA8);
        assert_eq!(c.b, 0xD3);
    }

    #[test]
    fn test_rgb_from_hex_extremes() {
        let black = Rgb::from_hex(0x000000);
        assert_eq!((black.r, black.g, black.b), (0, 0, 0));
        let white = Rgb::from_hex(0xFFFFFF);
        assert_eq!((white.r, white.g, white.b), (255, 255, 255));
    }

    #[test]
    fn test_no_color_flag_disables_all_formatting() {
        // Left set: rendering tests elsewhere in the crate compare plain text.
        set_no_color();

        assert_eq!(accent("test"), "test");
        assert_eq!(good("test"), "test");
        assert_eq!(caution("test"), "test");
        assert_eq!(bad("test"), "test");
        assert_eq!(muted("test"), "test");
        assert_eq!(bold("test"), "test");
        assert_eq!(error("test"), "test");
        assert_eq!(warning("test"), "test");
        assert_eq!(hint("test"), "test");
        assert_eq!(session_status(SessionStatus::Running, "running"), "running");
    }

    #[test]
    fn test_status_helpers_keep_text() {
        assert!(session_status(SessionStatus::Failed, "failed").contains("failed"));
        assert!(item_status(ItemStatus::Succeeded, "scraped").contains("scraped"));
        assert!(notification(NotificationKind::Warning, "Paused").contains("Paused"));
    }
}
