//! Small rendering helpers shared by the main draw code.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Centered popup area, sized as a percentage of the parent rect.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Mask a credential for display: a short prefix stays readable so the
/// operator can tell entries apart, the rest is hidden.
pub fn mask_secret(value: &str, reveal: bool) -> String {
    if reveal {
        return value.to_string();
    }
    if value.len() <= 8 {
        return "•".repeat(value.len().max(4));
    }
    format!("{}…{}", &value[..6], "•".repeat(6))
}

/// Truncate to a maximum width, appending `…` when cut.
pub fn truncate_with_ellipsis(s: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if s.chars().count() <= max_width {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", cut)
}
