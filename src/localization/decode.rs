//! Identifier decoding for raw tracker detections.

use crate::domain::{MarkerKind, MarkerPayload, RawDetection};

/// How a detection should be treated after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Pose-capable marker with a usable identifier.
    Localizable(String),
    /// Barcode family; the identifier is only logged.
    PoseLess(String),
    /// Empty or undecodable identifier.
    Dropped,
}

/// Decodes the identifier of a detection according to its marker family.
///
/// - ArUco/April: decimal rendering of the integer tag id.
/// - QR, EAN-13, UPC-A: ASCII rendering of the payload bytes.
///
/// A payload shape that does not match the family counts as undecodable.
///
/// # Example
///
/// ```
/// use arcanvas::domain::{MarkerKind, MarkerPayload, Pose, RawDetection};
/// use arcanvas::localization::decode::{decode, Decoded};
///
/// let detection = RawDetection {
///     kind: MarkerKind::ArucoApril,
///     payload: MarkerPayload::Tag(42),
///     pose: Pose::default(),
/// };
/// assert_eq!(decode(&detection), Decoded::Localizable("42".to_string()));
/// ```
#[must_use]
pub fn decode(detection: &RawDetection) -> Decoded {
    let id = match (detection.kind, &detection.payload) {
        (MarkerKind::ArucoApril, MarkerPayload::Tag(tag)) => tag.to_string(),
        (MarkerKind::Qr | MarkerKind::Ean13 | MarkerKind::UpcA, MarkerPayload::Bytes(bytes)) => {
            ascii(bytes)
        }
        _ => return Decoded::Dropped,
    };

    if id.is_empty() {
        Decoded::Dropped
    } else if detection.kind.has_pose() {
        Decoded::Localizable(id)
    } else {
        Decoded::PoseLess(id)
    }
}

/// ASCII decode; bytes outside 7-bit ASCII become `?`.
fn ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Pose;

    fn detection(kind: MarkerKind, payload: MarkerPayload) -> RawDetection {
        RawDetection {
            kind,
            payload,
            pose: Pose::default(),
        }
    }

    #[test]
    fn qr_payload_is_ascii() {
        let d = detection(MarkerKind::Qr, MarkerPayload::Bytes(b"canvas-1".to_vec()));
        assert_eq!(decode(&d), Decoded::Localizable("canvas-1".into()));
    }

    #[test]
    fn non_ascii_bytes_are_replaced() {
        let d = detection(MarkerKind::Qr, MarkerPayload::Bytes(vec![b'a', 0xC3, 0xA9, b'b']));
        assert_eq!(decode(&d), Decoded::Localizable("a??b".into()));
    }

    #[test]
    fn barcodes_never_localize() {
        for kind in [MarkerKind::Ean13, MarkerKind::UpcA] {
            let d = detection(kind, MarkerPayload::Bytes(b"4006381333931".to_vec()));
            assert_eq!(decode(&d), Decoded::PoseLess("4006381333931".into()));
        }
    }

    #[test]
    fn empty_and_mismatched_payloads_are_dropped() {
        assert_eq!(
            decode(&detection(MarkerKind::Qr, MarkerPayload::Bytes(Vec::new()))),
            Decoded::Dropped
        );
        assert_eq!(
            decode(&detection(MarkerKind::ArucoApril, MarkerPayload::Bytes(b"7".to_vec()))),
            Decoded::Dropped
        );
        assert_eq!(
            decode(&detection(MarkerKind::Qr, MarkerPayload::Tag(7))),
            Decoded::Dropped
        );
    }
}
