//! One-time operator setup: reading the two table corners from the cursor.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, Write};

use super::{select, Point, ScreenRegion};

/// Gets the current cursor position in screen coordinates.
#[cfg(windows)]
pub fn get_cursor_position() -> Result<Point> {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    let mut pt = POINT::default();
    unsafe {
        GetCursorPos(&mut pt)?;
    }
    Ok(Point::new(pt.x, pt.y))
}

#[cfg(not(windows))]
pub fn get_cursor_position() -> Result<Point> {
    Err(anyhow!(
        "cursor readings are only available on Windows; pass --region x1,y1,x2,y2 instead"
    ))
}

/// Asks the operator to hover over each corner of the table and press Enter.
///
/// `read_point` is called once per corner after the operator confirms.
pub fn prompt_for_region<R, F>(input: &mut R, mut read_point: F) -> Result<ScreenRegion>
where
    R: BufRead,
    F: FnMut() -> Result<Point>,
{
    let prompts = [
        "Hover over the TOP-LEFT corner of the market table and press Enter",
        "Hover over the BOTTOM-RIGHT corner of the market table and press Enter",
    ];

    let mut corners = Vec::with_capacity(2);
    for prompt in prompts {
        println!("{}", prompt);
        std::io::stdout().flush().ok();

        let mut line = String::new();
        let read = input.read_line(&mut line).context("Failed to read operator input")?;
        if read == 0 {
            return Err(anyhow!("Input closed before both corners were given"));
        }

        let point = read_point()?;
        log::info!("Corner at {}, {}", point.x, point.y);
        corners.push(point);
    }

    Ok(select(corners[0], corners[1]))
}
