//! 3D color lookup tables in the `.cube` format.
//!
//! A [`Lut`] is an immutable `N×N×N` lattice of output colors stored as a
//! flat array indexed `r + g·N + b·N²` (red varies fastest, as `.cube` files
//! are laid out). [`Lut::apply`] maps every pixel through the lattice with
//! trilinear interpolation and never touches its input.
//!
//! # Example
//!
//! ```
//! use framepick::Lut;
//! use image::{Rgb, RgbImage};
//!
//! let lut = Lut::identity(17).unwrap();
//! let image = RgbImage::from_pixel(4, 4, Rgb([200, 40, 90]));
//! let graded = lut.apply(&image);
//! assert_eq!(graded.get_pixel(0, 0), &Rgb([200, 40, 90]));
//! ```

use image::RgbImage;

use crate::error::FramePickError;

/// Largest lattice accepted. Real grading LUTs use 17, 33 or 65 points.
pub const MAX_LUT_SIZE: usize = 256;

/// How out-of-range lattice values are treated while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LutParseMode {
    /// Reject values outside `[0, 1]` with [`FramePickError::MalformedLut`].
    #[default]
    Strict,
    /// Clamp values outside `[0, 1]` into range.
    Clamp,
}

/// A parsed 3D LUT.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut {
    size: usize,
    title: Option<String>,
    domain_min: [f32; 3],
    domain_max: [f32; 3],
    table: Vec<[f32; 3]>,
}

impl Lut {
    /// Parse `.cube` bytes, rejecting out-of-range values.
    ///
    /// # Errors
    ///
    /// [`FramePickError::MalformedLut`] when the text is not UTF-8, the
    /// `LUT_3D_SIZE` declaration is missing or below 2, the file is a 1D LUT,
    /// a data row is not three numbers, the row count is not `N³`, or a value
    /// lies outside `[0, 1]`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FramePickError> {
        Self::parse_with_mode(bytes, LutParseMode::Strict)
    }

    /// Parse `.cube` bytes with an explicit out-of-range policy.
    pub fn parse_with_mode(bytes: &[u8], mode: LutParseMode) -> Result<Self, FramePickError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| FramePickError::MalformedLut("file is not valid UTF-8 text".to_string()))?;

        let mut size: Option<usize> = None;
        let mut title = None;
        let mut domain_min = [0.0f32; 3];
        let mut domain_max = [1.0f32; 3];
        let mut table: Vec<[f32; 3]> = Vec::new();

        for (line_index, raw_line) in text.lines().enumerate() {
            let line_number = line_index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };

            match keyword {
                "TITLE" => {
                    let rest = line["TITLE".len()..].trim();
                    title = Some(rest.trim_matches('"').to_string());
                }
                "LUT_3D_SIZE" => {
                    let value = tokens.next().and_then(|token| token.parse::<usize>().ok()).ok_or_else(|| {
                        FramePickError::MalformedLut(format!("line {line_number}: invalid LUT_3D_SIZE"))
                    })?;
                    if !(2..=MAX_LUT_SIZE).contains(&value) {
                        return Err(FramePickError::MalformedLut(format!(
                            "LUT_3D_SIZE {value} is outside 2..={MAX_LUT_SIZE}"
                        )));
                    }
                    if size.replace(value).is_some() {
                        return Err(FramePickError::MalformedLut(format!(
                            "line {line_number}: duplicate LUT_3D_SIZE"
                        )));
                    }
                    table.reserve(value * value * value);
                }
                "LUT_1D_SIZE" => {
                    return Err(FramePickError::MalformedLut(
                        "1D LUTs are not supported".to_string(),
                    ));
                }
                "DOMAIN_MIN" => domain_min = parse_triple(tokens, line_number)?,
                "DOMAIN_MAX" => domain_max = parse_triple(tokens, line_number)?,
                _ if is_keyword(keyword) => {
                    log::debug!("Ignoring .cube keyword {keyword} on line {line_number}");
                }
                _ => {
                    let mut row = parse_triple(line.split_whitespace(), line_number)?;
                    for value in &mut row {
                        if !(0.0..=1.0).contains(value) {
                            match mode {
                                LutParseMode::Strict => {
                                    return Err(FramePickError::MalformedLut(format!(
                                        "line {line_number}: value {value} is outside [0, 1]"
                                    )));
                                }
                                LutParseMode::Clamp => *value = value.clamp(0.0, 1.0),
                            }
                        }
                    }
                    table.push(row);
                }
            }
        }

        let size = size.ok_or_else(|| FramePickError::MalformedLut("missing LUT_3D_SIZE".to_string()))?;
        let expected = size * size * size;
        if table.len() != expected {
            return Err(FramePickError::MalformedLut(format!(
                "expected {expected} rows for size {size}, found {}",
                table.len()
            )));
        }
        for channel in 0..3 {
            if domain_max[channel] <= domain_min[channel] {
                return Err(FramePickError::MalformedLut(format!(
                    "DOMAIN_MAX must exceed DOMAIN_MIN (channel {channel})"
                )));
            }
        }

        log::debug!("Parsed {size}³ LUT ({} points)", table.len());

        Ok(Self {
            size,
            title,
            domain_min,
            domain_max,
            table,
        })
    }

    /// The identity lattice with `size` points per axis.
    ///
    /// # Errors
    ///
    /// [`FramePickError::MalformedLut`] if `size` is outside `2..=MAX_LUT_SIZE`.
    pub fn identity(size: usize) -> Result<Self, FramePickError> {
        if !(2..=MAX_LUT_SIZE).contains(&size) {
            return Err(FramePickError::MalformedLut(format!(
                "LUT size {size} is outside 2..={MAX_LUT_SIZE}"
            )));
        }
        let step = (size - 1) as f32;
        let mut table = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    table.push([r as f32 / step, g as f32 / step, b as f32 / step]);
                }
            }
        }
        Ok(Self {
            size,
            title: None,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
            table,
        })
    }

    /// Number of lattice points per axis.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The `TITLE` declared in the file, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Output color at lattice coordinate `(r, g, b)`.
    fn point(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.table[r + g * self.size + b * self.size * self.size]
    }

    /// Map one 8-bit color through the lattice.
    pub fn map_pixel(&self, pixel: [u8; 3]) -> [u8; 3] {
        let max_index = (self.size - 1) as f32;
        let mut base = [0usize; 3];
        let mut frac = [0f32; 3];

        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            let span = self.domain_max[channel] - self.domain_min[channel];
            let normalized = ((value - self.domain_min[channel]) / span).clamp(0.0, 1.0);
            let position = normalized * max_index;
            let cell = (position.floor() as usize).min(self.size - 2);
            base[channel] = cell;
            frac[channel] = (position - cell as f32).clamp(0.0, 1.0);
        }

        let [r0, g0, b0] = base;
        let [rf, gf, bf] = frac;
        let lerp = |a: [f32; 3], b: [f32; 3], t: f32| {
            [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t, a[2] + (b[2] - a[2]) * t]
        };

        let c00 = lerp(self.point(r0, g0, b0), self.point(r0 + 1, g0, b0), rf);
        let c01 = lerp(self.point(r0, g0 + 1, b0), self.point(r0 + 1, g0 + 1, b0), rf);
        let c10 = lerp(self.point(r0, g0, b0 + 1), self.point(r0 + 1, g0, b0 + 1), rf);
        let c11 = lerp(self.point(r0, g0 + 1, b0 + 1), self.point(r0 + 1, g0 + 1, b0 + 1), rf);
        let c0 = lerp(c00, c01, gf);
        let c1 = lerp(c10, c11, gf);
        let out = lerp(c0, c1, bf);

        out.map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
    }

    /// Apply the LUT to every pixel of `image`, returning a new image.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let mut output = image.clone();
        let row_bytes = image.width() as usize * 3;
        let transform = |row: &mut [u8]| {
            for pixel in row.chunks_exact_mut(3) {
                let mapped = self.map_pixel([pixel[0], pixel[1], pixel[2]]);
                pixel.copy_from_slice(&mapped);
            }
        };

        #[cfg(feature = "rayon")]
        crate::rayon::for_each_row(&mut output, row_bytes, transform);

        #[cfg(not(feature = "rayon"))]
        {
            if row_bytes > 0 {
                output.chunks_mut(row_bytes).for_each(transform);
            }
        }

        output
    }
}

fn is_keyword(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_uppercase())
        && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn parse_triple<'a>(mut tokens: impl Iterator<Item = &'a str>, line_number: usize) -> Result<[f32; 3], FramePickError> {
    let mut values = [0.0f32; 3];
    for value in &mut values {
        let token = tokens.next().ok_or_else(|| {
            FramePickError::MalformedLut(format!("line {line_number}: expected three values"))
        })?;
        *value = token
            .parse::<f32>()
            .ok()
            .filter(|parsed| parsed.is_finite())
            .ok_or_else(|| FramePickError::MalformedLut(format!("line {line_number}: '{token}' is not a number")))?;
    }
    if tokens.next().is_some() {
        return Err(FramePickError::MalformedLut(format!(
            "line {line_number}: expected exactly three values"
        )));
    }
    Ok(values)
}
