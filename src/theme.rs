//! UI palette: semantic colors used across the panel.

use ratatui::style::Color;

use crate::stream::ConnectionState;

#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,      // Active borders, highlights
    pub danger: Color,      // Errors, stopped tasks, disconnected
    pub success: Color,     // Running tasks, connected
    pub warning: Color,     // Reconnecting, warnings
    pub text: Color,        // Primary text
    pub text_dim: Color,    // System log lines, hints
    pub bg_selected: Color, // Selection background
    pub inactive: Color,    // Inactive borders
    pub header: Color,      // Box titles
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(250, 179, 135),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(249, 226, 175),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(243, 139, 168),
        }
    }
}

impl Theme {
    /// Color of the connection indicator, one per visual state.
    pub fn connection_color(&self, state: ConnectionState) -> Color {
        match state {
            ConnectionState::Connected => self.success,
            ConnectionState::Connecting => self.warning,
            ConnectionState::Disconnected => self.danger,
        }
    }
}
