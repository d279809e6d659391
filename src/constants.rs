//! Global constants for seglabel

/// Lowest zoom reachable with the wheel
pub const ZOOM_MIN: f64 = 0.25;

/// Highest zoom reachable with the wheel
pub const ZOOM_MAX: f64 = 5.0;

/// Zoom multiplier for one wheel notch away from the user (zoom out)
pub const ZOOM_OUT_FACTOR: f64 = 0.85;

/// Zoom multiplier for one wheel notch towards the user (zoom in)
pub const ZOOM_IN_FACTOR: f64 = 1.15;

/// Number of files sent per upload request
pub const DEFAULT_UPLOAD_BATCH_SIZE: usize = 50;

/// How long a notification stays visible
pub const NOTIFICATION_DURATION_MS: u64 = 4000;

/// Notifications kept before the oldest are dropped
pub const MAX_NOTIFICATIONS: usize = 16;

/// Default viewport size for the render binary
pub const DEFAULT_VIEWPORT_SIZE: (u32, u32) = (800, 600);

/// Overlay colors and marker sizes.
pub mod overlay {
    /// Fill for set mask cells (translucent green)
    pub const MASK_COLOR: [u8; 4] = [0, 255, 0, 128];

    /// Outline color for model polygons
    pub const POLYGON_COLOR: [u8; 4] = [255, 215, 0, 255];

    /// Polygon outline width in screen pixels
    pub const POLYGON_STROKE_WIDTH: f32 = 2.0;

    /// Crosshair arm length in screen pixels
    pub const CROSSHAIR_SIZE: f32 = 20.0;

    /// Crosshair arm thickness in screen pixels
    pub const CROSSHAIR_THICKNESS: f32 = 2.0;

    pub const CROSSHAIR_COLOR: [u8; 4] = [255, 0, 0, 255];

    /// Radius of a segmentation prompt dot in screen pixels
    pub const POINT_RADIUS: f32 = 5.0;

    /// White ring drawn around prompt dots
    pub const POINT_RING_WIDTH: f32 = 2.0;

    pub const POINT_RING_COLOR: [u8; 4] = [255, 255, 255, 255];

    pub const INCLUDE_COLOR: [u8; 4] = [0, 128, 0, 255];

    pub const EXCLUDE_COLOR: [u8; 4] = [255, 0, 0, 255];
}
