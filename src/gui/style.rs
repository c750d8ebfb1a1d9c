use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::container::{StyleSheet, Appearance};

pub const BACKGROUND_COLOR: Color = Color::from_rgb(0.106, 0.153, 0.212);

// rgba(251, 151, 92, 0.5)
pub const PANEL_COLOR: Color = Color::from_rgba(0.984, 0.592, 0.361, 0.5);

pub struct BackgroundStyleSheet;

impl StyleSheet for BackgroundStyleSheet {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            text_color: Some(Color::WHITE),
            background: Some(Background::Color(BACKGROUND_COLOR)),
            border: Border::default(),
            shadow: Shadow::default(),
        }
    }
}

/// Rounded translucent panel behind the title and the connection status.
pub struct PanelStyleSheet {
    pub radius: f32,
}

impl StyleSheet for PanelStyleSheet {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> Appearance {
        Appearance {
            text_color: Some(Color::WHITE),
            background: Some(Background::Color(PANEL_COLOR)),
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: self.radius.into(),
            },
            shadow: Shadow::default(),
        }
    }
}
