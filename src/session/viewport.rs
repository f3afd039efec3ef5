//! Mapping between the letterboxed preview and frame pixels

/// Uniform scale plus centering offset of a frame shown in a fixed display area.
///
/// Recompute with [`ViewportMapper::fit`] for every incoming frame; sources can
/// change resolution between frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportMapper {
    /// Frame pixels per screen pixel
    pub scale_factor: f32,
    /// Screen position of the frame's top-left corner
    pub offset: (f32, f32),
    /// Size of the scaled frame on screen
    pub displayed: (f32, f32),
}

impl Default for ViewportMapper {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            offset: (0.0, 0.0),
            displayed: (0.0, 0.0),
        }
    }
}

impl ViewportMapper {
    /// Fit a frame into the display area, preserving aspect ratio
    pub fn fit(frame_width: u32, frame_height: u32, display_width: u32, display_height: u32) -> Self {
        if frame_width == 0 || frame_height == 0 || display_width == 0 || display_height == 0 {
            return Self::default();
        }
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        let (dw, dh) = (display_width as f32, display_height as f32);

        // Wider than the display: full width, bars top and bottom
        let displayed = if fw / fh >= dw / dh {
            (dw, fh * dw / fw)
        } else {
            (fw * dh / fh, dh)
        };

        Self {
            scale_factor: fw / displayed.0,
            offset: ((dw - displayed.0) / 2.0, (dh - displayed.1) / 2.0),
            displayed,
        }
    }

    pub fn to_frame_space(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset.0) * self.scale_factor,
            (y - self.offset.1) * self.scale_factor,
        )
    }

    pub fn to_screen_space(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x / self.scale_factor + self.offset.0,
            y / self.scale_factor + self.offset.1,
        )
    }

    /// Whether a screen point lies on the frame rather than on the bars
    pub fn contains_screen(&self, x: f32, y: f32) -> bool {
        x >= self.offset.0
            && y >= self.offset.1
            && x < self.offset.0 + self.displayed.0
            && y < self.offset.1 + self.displayed.1
    }

    /// Scaled frame size in whole pixels
    pub fn displayed_size(&self) -> (u32, u32) {
        (
            self.displayed.0.round() as u32,
            self.displayed.1.round() as u32,
        )
    }
}
