//! Tests for `.cube` parsing and LUT application.

use framepick::{FramePickError, Lut, LutParseMode};
use image::{Rgb, RgbImage};

/// A `.cube` file for a `size³` lattice whose rows are produced by `row`.
fn cube_text(size: usize, header: &str, row: impl Fn(f32, f32, f32) -> [f32; 3]) -> String {
    let step = (size - 1) as f32;
    let mut text = format!("{header}\nLUT_3D_SIZE {size}\n");
    for b in 0..size {
        for g in 0..size {
            for r in 0..size {
                let [ro, go, bo] = row(r as f32 / step, g as f32 / step, b as f32 / step);
                text.push_str(&format!("{ro:.6} {go:.6} {bo:.6}\n"));
            }
        }
    }
    text
}

fn gradient_image() -> RgbImage {
    RgbImage::from_fn(64, 16, |x, y| Rgb([(x * 4) as u8, (y * 16) as u8, ((x * 7 + y * 3) % 256) as u8]))
}

fn assert_malformed(text: &str) {
    let result = Lut::parse(text.as_bytes());
    assert!(
        matches!(result, Err(FramePickError::MalformedLut(_))),
        "expected MalformedLut for:\n{text}"
    );
}

// ── Parsing ────────────────────────────────────────────────────────

#[test]
fn test_parse_minimal_cube() {
    let text = "LUT_3D_SIZE 2\n0 0 0\n1 0 0\n0 1 0\n1 1 0\n0 0 1\n1 0 1\n0 1 1\n1 1 1\n";
    let lut = Lut::parse(text.as_bytes()).unwrap();
    assert_eq!(lut.size(), 2);
    assert_eq!(lut.title(), None);
    assert_eq!(lut, Lut::identity(2).unwrap());
}

#[test]
fn test_parse_reads_title_and_skips_comments() {
    let text = cube_text(3, "# Generated for tests\nTITLE \"Warm Film\"\n\n", |r, g, b| [r, g, b]);
    let lut = Lut::parse(text.as_bytes()).unwrap();
    assert_eq!(lut.title(), Some("Warm Film"));
    assert_eq!(lut.size(), 3);
}

#[test]
fn test_parse_ignores_unknown_keywords() {
    let text = cube_text(2, "LUT_IN_VIDEO_RANGE\nLUT_3D_INPUT_RANGE 0.0 1.0", |r, g, b| [r, g, b]);
    assert!(Lut::parse(text.as_bytes()).is_ok());
}

#[test]
fn test_parse_missing_size() {
    assert_malformed("0 0 0\n1 1 1\n");
}

#[test]
fn test_parse_rejects_1d_lut() {
    assert_malformed("LUT_1D_SIZE 2\n0 0 0\n1 1 1\n");
}

#[test]
fn test_parse_rejects_out_of_bounds_size() {
    assert_malformed("LUT_3D_SIZE 1\n0 0 0\n");
    assert_malformed("LUT_3D_SIZE 257\n");
    assert_malformed("LUT_3D_SIZE many\n");
}

#[test]
fn test_parse_rejects_duplicate_size() {
    let text = cube_text(2, "LUT_3D_SIZE 2", |r, g, b| [r, g, b]);
    assert_malformed(&text);
}

#[test]
fn test_parse_rejects_wrong_row_count() {
    let mut text = cube_text(2, "", |r, g, b| [r, g, b]);
    text.push_str("0.5 0.5 0.5\n");
    assert_malformed(&text);

    let truncated: String = cube_text(2, "", |r, g, b| [r, g, b]).lines().take(5).collect::<Vec<_>>().join("\n");
    assert_malformed(&truncated);
}

#[test]
fn test_parse_rejects_non_numeric_rows() {
    let text = cube_text(2, "", |r, g, b| [r, g, b]).replacen("1.000000 0.000000 0.000000", "1.0 zero 0.0", 1);
    assert_malformed(&text);

    let text = cube_text(2, "", |r, g, b| [r, g, b]).replacen("1.000000 0.000000 0.000000", "1.0 0.0", 1);
    assert_malformed(&text);

    let text = cube_text(2, "", |r, g, b| [r, g, b]).replacen("1.000000 0.000000 0.000000", "1.0 0.0 0.0 0.0", 1);
    assert_malformed(&text);
}

#[test]
fn test_parse_rejects_invalid_utf8() {
    assert!(matches!(
        Lut::parse(&[0x4C, 0x55, 0xFF, 0xFE]),
        Err(FramePickError::MalformedLut(_))
    ));
}

#[test]
fn test_out_of_range_values_strict_and_clamped() {
    let text = cube_text(2, "", |r, g, b| [r * 1.5, g, b - 0.25]);
    assert_malformed(&text);

    let lut = Lut::parse_with_mode(text.as_bytes(), LutParseMode::Clamp).unwrap();
    assert_eq!(lut.map_pixel([255, 0, 0]), [255, 0, 0]);
    assert_eq!(lut.map_pixel([0, 0, 0]), [0, 0, 0]);
}

#[test]
fn test_parse_rejects_inverted_domain() {
    let text = cube_text(2, "DOMAIN_MIN 0 0 0\nDOMAIN_MAX 1 0 1", |r, g, b| [r, g, b]);
    assert_malformed(&text);
}

// ── Application ────────────────────────────────────────────────────

#[test]
fn test_identity_lut_preserves_image() {
    let image = gradient_image();
    for size in [2, 17, 33] {
        let lut = Lut::identity(size).unwrap();
        assert_eq!(lut.apply(&image), image, "identity of size {size}");
    }
}

#[test]
fn test_parsed_identity_preserves_image() {
    let text = cube_text(17, "TITLE \"Identity\"", |r, g, b| [r, g, b]);
    let lut = Lut::parse(text.as_bytes()).unwrap();
    let image = gradient_image();
    assert_eq!(lut.apply(&image), image);
}

#[test]
fn test_apply_does_not_modify_input() {
    let image = gradient_image();
    let copy = image.clone();
    let text = cube_text(5, "", |r, g, b| [1.0 - r, 1.0 - g, 1.0 - b]);
    let graded = Lut::parse(text.as_bytes()).unwrap().apply(&image);
    assert_eq!(image, copy);
    assert_ne!(graded, image);
}

#[test]
fn test_red_varies_fastest() {
    // Row `i` outputs `0.12 · i` in the green channel.
    let rows: Vec<String> = (0..8).map(|index| format!("0 {:.2} 0", index as f32 * 0.12)).collect();
    let text = format!("LUT_3D_SIZE 2\n{}\n", rows.join("\n"));
    let lut = Lut::parse(text.as_bytes()).unwrap();

    let row_of = |pixel: [u8; 3]| (f32::from(lut.map_pixel(pixel)[1]) / 255.0 / 0.12).round() as usize;
    assert_eq!(row_of([0, 0, 0]), 0);
    assert_eq!(row_of([255, 0, 0]), 1);
    assert_eq!(row_of([0, 255, 0]), 2);
    assert_eq!(row_of([255, 255, 0]), 3);
    assert_eq!(row_of([0, 0, 255]), 4);
    assert_eq!(row_of([255, 255, 255]), 7);
}

#[test]
fn test_inversion_lut() {
    let text = cube_text(2, "", |r, g, b| [1.0 - r, 1.0 - g, 1.0 - b]);
    let lut = Lut::parse(text.as_bytes()).unwrap();
    for pixel in [[0, 0, 0], [255, 255, 255], [10, 128, 240], [77, 3, 199]] {
        assert_eq!(lut.map_pixel(pixel), pixel.map(|value| 255 - value));
    }
}

#[test]
fn test_interpolates_between_lattice_points() {
    // Output red follows input red squared on a 3-point lattice.
    let text = cube_text(3, "", |r, g, b| [r * r, g, b]);
    let lut = Lut::parse(text.as_bytes()).unwrap();

    // 0.5 lies exactly on the middle point: 0.25.
    let mid = lut.map_pixel([128, 0, 0])[0];
    assert!((i32::from(mid) - 64).abs() <= 1, "got {mid}");

    // Halfway between 0.5 and 1.0 interpolates linearly to 0.625.
    let quarter = lut.map_pixel([191, 0, 0])[0];
    assert!((i32::from(quarter) - 159).abs() <= 2, "got {quarter}");
}

#[test]
fn test_domain_rescales_input() {
    let text = cube_text(2, "DOMAIN_MIN 0 0 0\nDOMAIN_MAX 0.5 0.5 0.5", |r, g, b| [r, g, b]);
    let lut = Lut::parse(text.as_bytes()).unwrap();

    // Inputs at or above the domain maximum saturate.
    assert_eq!(lut.map_pixel([200, 255, 128]), [255, 255, 255]);
    let low = lut.map_pixel([64, 0, 0]);
    assert!((i32::from(low[0]) - 128).abs() <= 1, "got {low:?}");
}

#[test]
fn test_identity_rejects_bad_sizes() {
    assert!(Lut::identity(1).is_err());
    assert!(Lut::identity(257).is_err());
}

#[test]
fn test_apply_empty_image() {
    let lut = Lut::identity(2).unwrap();
    let empty = RgbImage::new(0, 0);
    assert_eq!(lut.apply(&empty).dimensions(), (0, 0));
}
