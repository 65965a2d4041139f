//! Application mode types.
//!
//! The application is always in exactly one top-level mode. Drawing carries a
//! phase describing how far registration has progressed:
//!
//! ```text
//! SelectingImage ──image confirmed──▶ Drawing(Localizing)
//!                                        │ marker localized
//!                                        ▼
//!                                     Drawing(Placing)
//!                                        │ fix position
//!                                        ▼
//!         relocalize ◀──────────────  Drawing(Fixed)
//! ```
//!
//! # Example
//!
//! ```rust
//! use arcanvas::app::modes::{AppMode, DrawingPhase};
//!
//! let mode = AppMode::Drawing(DrawingPhase::Localizing);
//! assert!(mode.is_drawing());
//! assert!(!AppMode::SelectingImage.is_drawing());
//! assert_eq!(mode.to_string(), "drawing/localizing");
//! ```

/// Sub-state of drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawingPhase {
    /// Waiting for a marker sighting; localization is running.
    Localizing,
    /// Canvas placed at the marker; the user may drag it until fixing.
    Placing,
    /// Placement locked; drawing controls are shown.
    Fixed,
}

/// Top-level application mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppMode {
    /// Choosing, capturing or fetching the image to project.
    SelectingImage,
    /// Projecting the chosen image onto the surface.
    Drawing(DrawingPhase),
}

impl AppMode {
    #[must_use]
    pub const fn is_drawing(self) -> bool {
        matches!(self, Self::Drawing(_))
    }
}

impl std::fmt::Display for AppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectingImage => f.write_str("selecting-image"),
            Self::Drawing(DrawingPhase::Localizing) => f.write_str("drawing/localizing"),
            Self::Drawing(DrawingPhase::Placing) => f.write_str("drawing/placing"),
            Self::Drawing(DrawingPhase::Fixed) => f.write_str("drawing/fixed"),
        }
    }
}
