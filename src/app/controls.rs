//! Visibility of the user controls driven by the state machine.
//!
//! The rendering layer reads this panel; it never decides visibility itself.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlPanel {
    /// "Use image" is enabled only while an acquired image is held.
    pub use_image_enabled: bool,
    /// "Fix position" is shown while the canvas is being placed.
    pub fix_visible: bool,
    /// Relocalize and end-drawing controls, shown once placement is fixed.
    pub drawing_controls_visible: bool,
}

impl ControlPanel {
    /// One-line summary for logs and the shell prompt.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut shown = Vec::new();
        if self.use_image_enabled {
            shown.push("use-image");
        }
        if self.fix_visible {
            shown.push("fix");
        }
        if self.drawing_controls_visible {
            shown.push("relocalize");
            shown.push("end");
        }
        if shown.is_empty() {
            "-".to_string()
        } else {
            shown.join(",")
        }
    }
}
