/// Small text-encoded pixel sprites.
///
/// ```text
/// # comment
/// size 4 2
/// color r #ff0000
/// color g #00ff0080
/// pixels
/// r..r
/// .gg.
/// ```
///
/// `.` is always transparent. Comment and blank lines are only recognised
/// before `pixels`; after it every non-empty line is a row.
use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

use crate::core::geometry::Color;

const TRANSPARENT: char = '.';

#[derive(Debug, Error, PartialEq)]
pub enum SpriteError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("missing `size` header")]
    MissingSize,
    #[error("missing `pixels` section")]
    MissingPixels,
    #[error("expected {expected} pixel rows, found {found}")]
    RowCount { expected: usize, found: usize },
    #[error("row {row} has {found} pixels, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row}: undefined colour key `{key}`")]
    UnknownKey { row: usize, key: char },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    width: usize,
    height: usize,
    pixels: Vec<Option<Color>>,
}

impl Sprite {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `None` for transparent or out-of-range pixels.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[y * self.width + x]
    }

    pub fn parse(source: &str) -> Result<Self, SpriteError> {
        let mut size: Option<(usize, usize)> = None;
        let mut palette: HashMap<char, Color> = HashMap::new();
        let mut lines = source.lines().enumerate();

        let syntax = |line: usize, reason: &str| SpriteError::Syntax {
            line: line + 1,
            reason: reason.to_owned(),
        };

        let mut in_pixels = false;
        for (idx, raw) in lines.by_ref() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut words = line.split_whitespace();
            match words.next() {
                Some("size") => {
                    let mut dim = || -> Option<usize> { words.next()?.parse().ok() };
                    let (w, h) = match (dim(), dim()) {
                        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
                        _ => return Err(syntax(idx, "expected `size <width> <height>`")),
                    };
                    size = Some((w, h));
                }
                Some("color") => {
                    let key = words
                        .next()
                        .and_then(|k| {
                            let mut chars = k.chars();
                            match (chars.next(), chars.next()) {
                                (Some(c), None) => Some(c),
                                _ => None,
                            }
                        })
                        .ok_or_else(|| syntax(idx, "colour key must be a single character"))?;
                    if key == TRANSPARENT || key == '#' {
                        return Err(syntax(idx, "`.` and `#` cannot be colour keys"));
                    }
                    let color = words
                        .next()
                        .and_then(Color::parse_hex)
                        .ok_or_else(|| syntax(idx, "expected `#rrggbb` or `#rrggbbaa`"))?;
                    palette.insert(key, color);
                }
                Some("pixels") => {
                    in_pixels = true;
                    break;
                }
                Some(other) => {
                    return Err(syntax(idx, &format!("unknown directive `{other}`")));
                }
                None => {}
            }
        }

        let (width, height) = size.ok_or(SpriteError::MissingSize)?;
        if !in_pixels {
            return Err(SpriteError::MissingPixels);
        }

        let rows: Vec<&str> = lines
            .map(|(_, raw)| raw.trim_end())
            .filter(|row| !row.is_empty())
            .collect();
        if rows.len() != height {
            return Err(SpriteError::RowCount {
                expected: height,
                found: rows.len(),
            });
        }

        let mut pixels = Vec::with_capacity(width * height);
        for (row, text) in rows.iter().enumerate() {
            let found = text.chars().count();
            if found != width {
                return Err(SpriteError::RowWidth {
                    row,
                    expected: width,
                    found,
                });
            }
            for key in text.chars() {
                if key == TRANSPARENT {
                    pixels.push(None);
                } else {
                    let color = palette
                        .get(&key)
                        .copied()
                        .ok_or(SpriteError::UnknownKey { row, key })?;
                    pixels.push(Some(color));
                }
            }
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

impl FromStr for Sprite {
    type Err = SpriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
