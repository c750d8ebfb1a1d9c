use std::f32::consts::{FRAC_PI_2, TAU};
use iced::{alignment, mouse, Color, Font, Pixels, Point, Radians, Rectangle, Renderer, Theme};
use iced::font::Weight;
use iced::widget::canvas::{self, path::Arc, Frame, Geometry, LineCap, Path, Stroke, Text};

pub const RING_SIZE: f32 = 280.0;
pub const RING_WIDTH: f32 = 15.0;

const TRACK_COLOR: Color = Color::from_rgb(0.239, 0.345, 0.459); // #3d5875

pub fn tint_color(progress: f32) -> Color {
    if progress >= 100.0 {
        Color::from_rgb8(0xFB, 0x97, 0x5C)
    } else if progress >= 50.0 {
        Color::from_rgb8(0xEF, 0x66, 0x4C)
    } else {
        Color::from_rgb8(0xFF, 0xF3, 0x86)
    }
}

/// Circular progress indicator with the step count and percentage in its center.
pub struct ProgressRing {
    pub steps: String,
    pub percent: String,
    pub progress: f32,
}

impl<Message> canvas::Program<Message> for ProgressRing {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let center = frame.center();
        let radius = (frame.width().min(frame.height()) - RING_WIDTH) / 2.0;

        frame.stroke(
            &Path::circle(center, radius),
            Stroke::default().with_width(RING_WIDTH).with_color(TRACK_COLOR),
        );

        let fill = self.progress.clamp(0.0, 100.0);
        if fill > 0.0 {
            // starts at 12 o'clock, clockwise
            let start_angle = -FRAC_PI_2;
            let arc = Path::new(|builder| {
                builder.arc(Arc {
                    center,
                    radius,
                    start_angle: Radians(start_angle),
                    end_angle: Radians(start_angle + TAU * fill / 100.0),
                });
            });

            frame.stroke(
                &arc,
                Stroke::default()
                    .with_width(RING_WIDTH)
                    .with_color(tint_color(self.progress))
                    .with_line_cap(LineCap::Round),
            );
        }

        frame.fill_text(Text {
            content: self.steps.clone(),
            position: Point::new(center.x, center.y - 14.0),
            color: Color::WHITE,
            size: Pixels(48.0),
            font: Font { weight: Weight::Bold, ..Font::DEFAULT },
            horizontal_alignment: alignment::Horizontal::Center,
            vertical_alignment: alignment::Vertical::Center,
            ..Text::default()
        });

        frame.fill_text(Text {
            content: self.percent.clone(),
            position: Point::new(center.x, center.y + 34.0),
            color: Color::WHITE,
            size: Pixels(18.0),
            horizontal_alignment: alignment::Horizontal::Center,
            vertical_alignment: alignment::Vertical::Center,
            ..Text::default()
        });

        vec![frame.into_geometry()]
    }
}
