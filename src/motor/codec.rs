// Fixed-point codec shared by every motor on the bus
//
// Physical quantities are mapped affinely onto a 16-bit signed code and sent
// as a big-endian byte pair: [high, low].

use super::error::{DriveError, Result};

/// Map `value` from `[domain_min, domain_max]` onto `[code_min, code_max]`
///
/// The result is truncated toward zero. Values outside the source domain are
/// rejected with `RangeOverflow` instead of wrapping the 16-bit code.
pub fn encode(
    value: f64,
    domain_min: f64,
    domain_max: f64,
    code_min: i16,
    code_max: i16,
) -> Result<i16> {
    if domain_max == domain_min {
        return Err(DriveError::Domain {
            reason: format!("zero-width domain [{}, {}]", domain_min, domain_max),
        });
    }
    if !value.is_finite() {
        return Err(DriveError::Domain {
            reason: format!("non-finite value {}", value),
        });
    }

    let (lo, hi) = if domain_min < domain_max {
        (domain_min, domain_max)
    } else {
        (domain_max, domain_min)
    };
    if value < lo || value > hi {
        return Err(DriveError::RangeOverflow {
            value,
            min: lo,
            max: hi,
        });
    }

    let proportion = (value - domain_min) / (domain_max - domain_min);
    let span = code_max as f64 - code_min as f64;
    let code = code_min as f64 + span * proportion;

    // Inside the domain the code lies between code_min and code_max, so it fits
    Ok(code.trunc() as i16)
}

/// Inverse of `encode`: map a code from `[code_min, code_max]` back onto
/// `[domain_min, domain_max]`
pub fn decode(
    code: i16,
    code_min: i16,
    code_max: i16,
    domain_min: f64,
    domain_max: f64,
) -> Result<f64> {
    if code_max == code_min {
        return Err(DriveError::Domain {
            reason: format!("zero-width code range [{}, {}]", code_min, code_max),
        });
    }
    let proportion = (code as f64 - code_min as f64) / (code_max as f64 - code_min as f64);
    Ok(domain_min + (domain_max - domain_min) * proportion)
}

/// Split a code into its big-endian byte pair (high, low)
pub fn split(code: i16) -> (i8, i8) {
    let high = ((code >> 8) & 0xFF) as u8 as i8;
    let low = (code & 0xFF) as u8 as i8;
    (high, low)
}

/// Rebuild a code from its big-endian byte pair
pub fn join(high: i8, low: i8) -> i16 {
    ((high as i16) << 8) | (low as u8 as i16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_CURRENT, MAX_SEND_CODE, MIN_CURRENT, MIN_SEND_CODE};

    #[test]
    fn test_split_join_round_trip() {
        for v in i16::MIN..=i16::MAX {
            let (high, low) = split(v);
            assert_eq!(join(high, low), v, "round trip failed for {}", v);
        }
    }

    #[test]
    fn test_split_is_big_endian() {
        assert_eq!(split(0x1333), (0x13, 0x33));
        assert_eq!(split(-1), (-1, -1));
        assert_eq!(split(0x00FF), (0, -1));
        assert_eq!(split(-4915), (-20, -51)); // 0xECCD
    }

    #[test]
    fn test_encode_domain_endpoints() {
        let min = encode(MIN_CURRENT, MIN_CURRENT, MAX_CURRENT, MIN_SEND_CODE, MAX_SEND_CODE);
        let max = encode(MAX_CURRENT, MIN_CURRENT, MAX_CURRENT, MIN_SEND_CODE, MAX_SEND_CODE);
        assert_eq!(min.unwrap(), MIN_SEND_CODE);
        assert_eq!(max.unwrap(), MAX_SEND_CODE);

        // Percentage endpoints land on the same codes after the current stage
        assert_eq!(encode(-100.0, -100.0, 100.0, -16384, 16384).unwrap(), -16384);
        assert_eq!(encode(100.0, -100.0, 100.0, -16384, 16384).unwrap(), 16384);
    }

    #[test]
    fn test_encode_midpoint_and_truncation() {
        assert_eq!(encode(0.0, -20.0, 20.0, -16384, 16384).unwrap(), 0);
        // 6 A -> 4915.2 -> 4915, -6 A -> -4915.2 -> -4915 (toward zero)
        assert_eq!(encode(6.0, -20.0, 20.0, -16384, 16384).unwrap(), 4915);
        assert_eq!(encode(-6.0, -20.0, 20.0, -16384, 16384).unwrap(), -4915);
    }

    #[test]
    fn test_encode_is_order_preserving() {
        let mut last = i16::MIN;
        for step in 0..=400 {
            let value = (step - 200) as f64 / 10.0;
            let code = encode(value, -20.0, 20.0, -16384, 16384).unwrap();
            assert!(code >= last, "code decreased at {}", value);
            last = code;
        }
    }

    #[test]
    fn test_encode_zero_width_domain() {
        let err = encode(1.0, 5.0, 5.0, -16384, 16384).unwrap_err();
        assert!(matches!(err, DriveError::Domain { .. }));
    }

    #[test]
    fn test_encode_rejects_out_of_domain() {
        let err = encode(20.5, -20.0, 20.0, -16384, 16384).unwrap_err();
        assert!(matches!(err, DriveError::RangeOverflow { .. }));
        let err = encode(-40.0, -20.0, 20.0, -16384, 16384).unwrap_err();
        assert!(matches!(err, DriveError::RangeOverflow { .. }));
    }

    #[test]
    fn test_encode_rejects_nan() {
        let err = encode(f64::NAN, -20.0, 20.0, -16384, 16384).unwrap_err();
        assert!(matches!(err, DriveError::Domain { .. }));
    }

    #[test]
    fn test_decode_inverts_encode() {
        assert_eq!(decode(16384, -16384, 16384, -20.0, 20.0).unwrap(), 20.0);
        assert_eq!(decode(-16384, -16384, 16384, -20.0, 20.0).unwrap(), -20.0);
        assert_eq!(decode(0, -16384, 16384, -20.0, 20.0).unwrap(), 0.0);
        let amps = decode(8192, -16384, 16384, -20.0, 20.0).unwrap();
        assert!((amps - 10.0).abs() < 1e-9);
    }
}
