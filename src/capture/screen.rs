//! Screen region capture using GDI.
//!
//! Copies the configured rectangle from the desktop device context into a
//! 32-bit DIB and converts it to RGBA. Only Windows has a backend; elsewhere
//! every capture fails with `CaptureError::Unsupported` and frames have to
//! come from a `ReplaySource`.

use image::{ImageBuffer, Rgba, RgbaImage};

use super::{CapturedFrame, FrameSource, ScreenRegion};
use crate::error::CaptureError;

/// Bounds of the virtual desktop: (x, y, width, height).
#[cfg_attr(not(windows), allow(dead_code))]
type DesktopBounds = (i32, i32, i32, i32);

/// Live capturer for the desktop.
#[derive(Debug, Default)]
pub struct ScreenCapturer;

impl ScreenCapturer {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for ScreenCapturer {
    fn capture(&mut self, region: &ScreenRegion) -> Result<CapturedFrame, CaptureError> {
        let image = grab(region)?;
        log::trace!("Captured {}x{} frame", image.width(), image.height());
        Ok(CapturedFrame::new(image))
    }
}

/// Rejects regions that are empty or not fully inside the desktop.
#[cfg_attr(not(windows), allow(dead_code))]
fn check_bounds(region: &ScreenRegion, desktop: DesktopBounds) -> Result<(), CaptureError> {
    let (dx, dy, dw, dh) = desktop;
    let out_of_bounds = || CaptureError::OutOfBounds {
        x: region.min_x(),
        y: region.min_y(),
        width: region.width(),
        height: region.height(),
    };

    if region.is_empty() {
        return Err(out_of_bounds());
    }
    if dw <= 0 || dh <= 0 {
        return Err(CaptureError::Unavailable("desktop has no visible area".into()));
    }

    let inside = region.min_x() >= dx
        && region.min_y() >= dy
        && i64::from(region.max_x()) <= i64::from(dx) + i64::from(dw)
        && i64::from(region.max_y()) <= i64::from(dy) + i64::from(dh);

    if inside { Ok(()) } else { Err(out_of_bounds()) }
}

/// Converts a top-down BGRA buffer into an RGBA image.
#[cfg_attr(not(windows), allow(dead_code))]
fn bgra_to_rgba(width: u32, height: u32, src: &[u8]) -> Option<RgbaImage> {
    let row_pitch = width as usize * 4;
    if src.len() < row_pitch * height as usize {
        return None;
    }

    let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let offset = y as usize * row_pitch + x as usize * 4;
        // BGRA -> RGBA; GDI leaves alpha at 0 for screen copies
        let b = src[offset];
        let g = src[offset + 1];
        let r = src[offset + 2];
        *pixel = Rgba([r, g, b, 255]);
    }
    Some(img)
}

#[cfg(windows)]
fn grab(region: &ScreenRegion) -> Result<RgbaImage, CaptureError> {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
        DIB_RGB_COLORS, HGDIOBJ, SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    };

    let desktop = unsafe {
        (
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    };
    check_bounds(region, desktop)?;

    let width = region.width();
    let height = region.height();

    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(CaptureError::Unavailable("GetDC returned no desktop context".into()));
        }

        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width as i32, height as i32);
        let previous = SelectObject(mem_dc, HGDIOBJ(bitmap.0));

        let blit = BitBlt(
            mem_dc,
            0,
            0,
            width as i32,
            height as i32,
            screen_dc,
            region.min_x(),
            region.min_y(),
            SRCCOPY,
        );

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                // Negative height requests a top-down DIB
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut buffer = vec![0u8; width as usize * height as usize * 4];
        let lines = if blit.is_ok() {
            GetDIBits(
                mem_dc,
                bitmap,
                0,
                height,
                Some(buffer.as_mut_ptr() as *mut std::ffi::c_void),
                &mut info,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        // Release GDI objects on every path
        SelectObject(mem_dc, previous);
        let _ = DeleteObject(HGDIOBJ(bitmap.0));
        let _ = DeleteDC(mem_dc);
        ReleaseDC(HWND::default(), screen_dc);

        if let Err(e) = blit {
            return Err(CaptureError::Unavailable(format!("BitBlt failed: {}", e)));
        }
        if lines as u32 != height {
            return Err(CaptureError::Unavailable(format!(
                "GetDIBits copied {} of {} lines",
                lines, height
            )));
        }

        bgra_to_rgba(width, height, &buffer)
            .ok_or_else(|| CaptureError::Unavailable("short pixel buffer".into()))
    }
}

#[cfg(not(windows))]
fn grab(region: &ScreenRegion) -> Result<RgbaImage, CaptureError> {
    log::trace!("No screen backend for region {}", region);
    Err(CaptureError::Unsupported)
}
