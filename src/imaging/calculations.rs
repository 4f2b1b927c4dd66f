//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions for a derivative at a breakpoint width.
///
/// The width is fixed to `target_width` and the height follows the source
/// aspect ratio. Sources already narrower than (or exactly) the target keep
/// their own dimensions: derivatives are never upscaled.
///
/// # Arguments
/// * `original` - Original image dimensions (width, height)
/// * `target_width` - Breakpoint width in pixels
///
/// # Returns
/// * `(width, height)` - Output dimensions, height at least 1
///
/// # Examples
/// ```
/// # use adaptive_images::imaging::calculate_fit_to_width;
/// // 2000x1000 landscape at 992 → 992x496
/// assert_eq!(calculate_fit_to_width((2000, 1000), 992), (992, 496));
///
/// // 640x480 at 992 → unchanged
/// assert_eq!(calculate_fit_to_width((640, 480), 992), (640, 480));
/// ```
pub fn calculate_fit_to_width(original: (u32, u32), target_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;

    if orig_w <= target_width || orig_w == 0 {
        return original;
    }

    let ratio = target_width as f64 / orig_w as f64;
    let height = (orig_h as f64 * ratio).round() as u32;
    (target_width, height.max(1))
}
