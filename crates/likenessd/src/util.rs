use std::fmt::Write;

/// Lowercase hex rendering of a byte slice.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Clamp a score into [0, 1] for API responses.
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_renders_lowercase() {
        assert_eq!(hex_string(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(hex_string(&[]), "");
    }

    #[test]
    fn clamp_unit_bounds() {
        assert_eq!(clamp_unit(1.3), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }
}
