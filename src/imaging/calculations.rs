//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Scale and crop window for a cover-fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverFit {
    /// Dimensions the source is scaled to before cropping.
    pub scaled: (u32, u32),
    /// Top-left corner of the centred crop within the scaled image.
    pub offset: (u32, u32),
}

/// Calculate a cover-fit: scale `source` to fill `target`, then crop the
/// overflow equally from both sides.
///
/// Returns `None` when either box has a zero dimension.
pub fn calculate_cover_fit(source: (u32, u32), target: (u32, u32)) -> Option<CoverFit> {
    if source.0 == 0 || source.1 == 0 || target.0 == 0 || target.1 == 0 {
        return None;
    }
    let scaled = calculate_fill_dimensions(source, target);
    let offset = ((scaled.0 - target.0) / 2, (scaled.1 - target.1) / 2);
    Some(CoverFit { scaled, offset })
}

/// Height that keeps `aspect` (width, height) at the given width, rounded.
pub fn height_for_width(aspect: (u32, u32), width: f64) -> f64 {
    let (aspect_w, aspect_h) = aspect;
    if aspect_w == 0 {
        return 0.0;
    }
    (width * aspect_h as f64 / aspect_w as f64).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_fill_dimensions tests
    // =========================================================================

    #[test]
    fn fill_wider_source_to_portrait_target() {
        // 800x600 (4:3) → 400x500 target
        // Source is wider, so height matches: 500, width = 500 * (4/3) = 667
        assert_eq!(calculate_fill_dimensions((800, 600), (400, 500)), (667, 500));
    }

    #[test]
    fn fill_taller_source_to_landscape_target() {
        // 600x800 (3:4) → 500x400 target
        assert_eq!(calculate_fill_dimensions((600, 800), (500, 400)), (500, 667));
    }

    #[test]
    fn fill_same_aspect_ratio() {
        assert_eq!(calculate_fill_dimensions((800, 600), (400, 300)), (400, 300));
    }

    #[test]
    fn fill_never_undershoots_target() {
        // Rounding on near-equal aspects must not leave a 1px gap
        let (w, h) = calculate_fill_dimensions((1001, 1000), (333, 332));
        assert!(w >= 333 && h >= 332);
    }

    // =========================================================================
    // calculate_cover_fit tests
    // =========================================================================

    #[test]
    fn cover_fit_centres_horizontal_overflow() {
        // 200x100 into 100x100: scale to 200x100, crop 50px from each side
        let fit = calculate_cover_fit((200, 100), (100, 100)).unwrap();
        assert_eq!(fit.scaled, (200, 100));
        assert_eq!(fit.offset, (50, 0));
    }

    #[test]
    fn cover_fit_centres_vertical_overflow() {
        // 100x100 into 200x100: scale to 200x200, crop 50px top and bottom
        let fit = calculate_cover_fit((100, 100), (200, 100)).unwrap();
        assert_eq!(fit.scaled, (200, 200));
        assert_eq!(fit.offset, (0, 50));
    }

    #[test]
    fn cover_fit_rejects_empty_boxes() {
        assert_eq!(calculate_cover_fit((0, 10), (10, 10)), None);
        assert_eq!(calculate_cover_fit((10, 10), (10, 0)), None);
    }

    // =========================================================================
    // height_for_width tests
    // =========================================================================

    #[test]
    fn height_for_width_preserves_aspect() {
        assert_eq!(height_for_width((100, 100), 120.0), 120.0);
        assert_eq!(height_for_width((4, 5), 400.0), 500.0);
        assert_eq!(height_for_width((0, 5), 400.0), 0.0);
    }
}
