//! Screen rectangle to monitor, normalized from two operator-chosen corners.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point in screen pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in screen pixels. Always satisfies
/// `min_x <= max_x` and `min_y <= max_y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegion")]
pub struct ScreenRegion {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

/// Unchecked form used when reading a region from config.json.
#[derive(Deserialize)]
struct RawRegion {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl TryFrom<RawRegion> for ScreenRegion {
    type Error = String;

    fn try_from(raw: RawRegion) -> Result<Self, Self::Error> {
        if raw.min_x > raw.max_x || raw.min_y > raw.max_y {
            return Err(format!(
                "region min ({}, {}) exceeds max ({}, {})",
                raw.min_x, raw.min_y, raw.max_x, raw.max_y
            ));
        }
        Ok(Self {
            min_x: raw.min_x,
            min_y: raw.min_y,
            max_x: raw.max_x,
            max_y: raw.max_y,
        })
    }
}

/// Builds the region spanned by two corners given in any order.
///
/// Identical corners give a zero-area region; it is not rejected here.
pub fn select(a: Point, b: Point) -> ScreenRegion {
    ScreenRegion {
        min_x: a.x.min(b.x),
        min_y: a.y.min(b.y),
        max_x: a.x.max(b.x),
        max_y: a.y.max(b.y),
    }
}

impl ScreenRegion {
    pub fn min_x(&self) -> i32 {
        self.min_x
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn max_x(&self) -> i32 {
        self.max_x
    }

    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    pub fn width(&self) -> u32 {
        self.max_x.abs_diff(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.abs_diff(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl fmt::Display for ScreenRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{} - {},{} ({}x{})",
            self.min_x,
            self.min_y,
            self.max_x,
            self.max_y,
            self.width(),
            self.height()
        )
    }
}

/// Parses `x1,y1,x2,y2` (two corners, any order) as given on the command line.
impl FromStr for ScreenRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<i32> = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid coordinate in '{}': {}", s, e))?;

        match values.as_slice() {
            [x1, y1, x2, y2] => Ok(select(Point::new(*x1, *y1), Point::new(*x2, *y2))),
            _ => Err(format!(
                "expected four comma-separated coordinates (x1,y1,x2,y2), got {}",
                values.len()
            )),
        }
    }
}
