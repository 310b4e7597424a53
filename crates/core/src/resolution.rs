//! `WIDTHxHEIGHT` resolution strings.

use crate::error::CoreError;

/// Resolution used when the caller names none.
pub const DEFAULT_RESOLUTION: &str = "1280x720";

/// Maximum dimension (width or height) allowed.
const MAX_DIMENSION: u32 = 7680;

/// A validated output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Parse a `WIDTHxHEIGHT` string (an upper-case `X` is accepted too).
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        let (w, h) = raw
            .split_once(['x', 'X'])
            .ok_or_else(|| invalid(raw, "expected WIDTHxHEIGHT"))?;

        let width: u32 = w.trim().parse().map_err(|_| invalid(raw, "width is not a number"))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| invalid(raw, "height is not a number"))?;

        validate_dimensions(width, height)?;
        Ok(Self { width, height })
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Validate that width and height are positive and within bounds.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::validation(
            "resolution",
            "Width and height must be greater than 0",
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CoreError::validation(
            "resolution",
            format!("Dimensions must not exceed {MAX_DIMENSION}px (got {width}x{height})"),
        ));
    }
    Ok(())
}

fn invalid(raw: &str, reason: &str) -> CoreError {
    CoreError::validation("resolution", format!("Invalid resolution '{raw}': {reason}"))
}
