//! Wire protocol spoken between a waterfall producer and a visualization endpoint.
//!
//! Two message shapes travel as compact JSON text frames:
//! - `init`: sent once per session, describes the receiver and the image geometry
//! - `line`: one image row, RGB bytes packed and base64 encoded into `colors`

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("row of {pixels} pixels exceeds the addressable buffer size")]
    RowTooLong { pixels: usize },
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 colors: {0}")]
    Colors(#[from] base64::DecodeError),
    #[error("expected a line message, got {0}")]
    UnexpectedMessage(&'static str),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A single pixel as red, green and blue channel bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Unpacks a `0xAARRGGBB` pixel, discarding alpha.
    pub const fn from_argb(pixel: u32) -> Self {
        Self {
            r: (pixel >> 16) as u8,
            g: (pixel >> 8) as u8,
            b: pixel as u8,
        }
    }
}

impl From<u32> for Rgb {
    fn from(pixel: u32) -> Self {
        Rgb::from_argb(pixel)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb { r, g, b }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Init {
        callsign: String,
        mode: String,
        width: u32,
        height: u32,
    },
    Line {
        y: u32,
        colors: String,
    },
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Init { .. } => "init",
            WireMessage::Line { .. } => "line",
        }
    }

    /// Decodes the packed RGB bytes carried by a `line` message.
    pub fn row_bytes(&self) -> CodecResult<Vec<u8>> {
        match self {
            WireMessage::Line { colors, .. } => Ok(BASE64.decode(colors)?),
            other => Err(CodecError::UnexpectedMessage(other.kind())),
        }
    }
}

pub fn encode_init(callsign: &str, mode: &str, width: u32, height: u32) -> CodecResult<String> {
    let message = WireMessage::Init {
        callsign: callsign.to_owned(),
        mode: mode.to_owned(),
        width,
        height,
    };
    Ok(serde_json::to_string(&message)?)
}

pub fn encode_row(y: u32, pixels: &[Rgb]) -> CodecResult<String> {
    let message = WireMessage::Line {
        y,
        colors: BASE64.encode(pack_rgb(pixels)?),
    };
    Ok(serde_json::to_string(&message)?)
}

pub fn decode(text: &str) -> CodecResult<WireMessage> {
    Ok(serde_json::from_str(text)?)
}

fn pack_rgb(pixels: &[Rgb]) -> CodecResult<Vec<u8>> {
    let len = pixels
        .len()
        .checked_mul(3)
        .ok_or(CodecError::RowTooLong {
            pixels: pixels.len(),
        })?;
    let mut packed = Vec::with_capacity(len);
    for pixel in pixels {
        packed.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn init_matches_wire_shape() {
        let text = encode_init("N0CALL", "USB", 1024, 400).expect("encode init");
        assert_eq!(
            text,
            r#"{"type":"init","callsign":"N0CALL","mode":"USB","width":1024,"height":400}"#
        );
    }

    #[test]
    fn init_passes_strings_through_verbatim() {
        let callsign = "DL1\"ABC\"/p ü";
        let text = encode_init(callsign, "", 0, u32::MAX).expect("encode init");
        let value: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["type"], "init");
        assert_eq!(value["callsign"], callsign);
        assert_eq!(value["mode"], "");
        assert_eq!(value["width"], 0);
        assert_eq!(value["height"], u64::from(u32::MAX));
    }

    #[test]
    fn row_packs_pixels_in_order() {
        let pixels = [Rgb::new(1, 2, 3), Rgb::new(250, 251, 252), Rgb::new(0, 0, 0)];
        let text = encode_row(7, &pixels).expect("encode row");
        let value: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["type"], "line");
        assert_eq!(value["y"], 7);

        let colors = value["colors"].as_str().expect("colors string");
        assert!(!colors.contains('\n'));
        let bytes = BASE64.decode(colors).expect("base64");
        assert_eq!(bytes.len(), 3 * pixels.len());
        for (i, pixel) in pixels.iter().enumerate() {
            assert_eq!(&bytes[3 * i..3 * i + 3], &[pixel.r, pixel.g, pixel.b]);
        }
    }

    #[test]
    fn empty_row_encodes_empty_colors() {
        let text = encode_row(0, &[]).expect("empty row is valid");
        assert_eq!(text, r#"{"type":"line","y":0,"colors":""}"#);
    }

    #[test]
    fn wide_row_has_no_line_breaks() {
        let pixels = vec![Rgb::new(0x12, 0x34, 0x56); 4096];
        let text = encode_row(399, &pixels).expect("encode row");
        assert!(!text.contains('\n'));
        let message = decode(&text).expect("decode");
        assert_eq!(message.row_bytes().expect("row bytes").len(), 3 * 4096);
    }

    #[test]
    fn argb_conversion_drops_alpha() {
        assert_eq!(Rgb::from(0xFF11_2233_u32), Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(Rgb::from_argb(0x00AB_CDEF), Rgb::new(0xAB, 0xCD, 0xEF));
    }

    #[test]
    fn row_bytes_rejects_init() {
        let message = decode(&encode_init("A", "B", 1, 1).unwrap()).unwrap();
        assert!(matches!(
            message.row_bytes(),
            Err(CodecError::UnexpectedMessage("init"))
        ));
    }
}
