//! Logo validation. Only baseline/progressive JPEG is embedded (DCTDecode passthrough).

use crate::render::RenderError;

pub const MAX_LOGO_BYTES: usize = 512 * 1024;
pub const MAX_LOGO_DIMENSION: u32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

impl JpegInfo {
    pub fn color_space(&self) -> &'static str {
        match self.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        }
    }
}

/// Checks size limits and reads dimensions from the first SOF marker.
pub fn inspect_logo(bytes: &[u8]) -> Result<JpegInfo, RenderError> {
    if bytes.len() > MAX_LOGO_BYTES {
        return Err(RenderError::LogoTooLarge(format!(
            "{} bytes exceeds {} byte limit",
            bytes.len(),
            MAX_LOGO_BYTES
        )));
    }
    let info = read_jpeg_header(bytes)?;
    if info.width == 0 || info.height == 0 {
        return Err(RenderError::UnsupportedLogo("zero-sized image".to_string()));
    }
    if info.width > MAX_LOGO_DIMENSION || info.height > MAX_LOGO_DIMENSION {
        return Err(RenderError::LogoTooLarge(format!(
            "{}x{} exceeds {}px",
            info.width, info.height, MAX_LOGO_DIMENSION
        )));
    }
    Ok(info)
}

fn read_jpeg_header(bytes: &[u8]) -> Result<JpegInfo, RenderError> {
    let unsupported = |msg: &str| RenderError::UnsupportedLogo(msg.to_string());
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err(unsupported("not a JPEG image"));
    }

    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return Err(unsupported("corrupt marker stream"));
        }
        let marker = bytes[pos + 1];
        // fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            break;
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > bytes.len() {
            return Err(unsupported("truncated segment"));
        }
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if len < 8 {
                return Err(unsupported("truncated frame header"));
            }
            let seg = &bytes[pos + 4..pos + 2 + len];
            return Ok(JpegInfo {
                height: u16::from_be_bytes([seg[1], seg[2]]) as u32,
                width: u16::from_be_bytes([seg[3], seg[4]]) as u32,
                components: seg[5],
            });
        }
        pos += 2 + len;
    }
    Err(unsupported("no frame header found"))
}

#[cfg(test)]
pub(crate) fn jpeg_fixture(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    // APP0 / JFIF
    out.extend_from_slice(&[
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00,
    ]);
    // SOF0, 8-bit, 3 components
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[
        0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01,
    ]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}
