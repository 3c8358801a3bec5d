use crate::error::FatalTransportError;

/// Copies a multi-segment delivered payload into one contiguous staging
/// buffer so the executive can parse it as an ordinary frame header.
/// A single-segment payload is copied too — callers needing a zero-copy
/// fast path should special-case that themselves, since F.'s contract
/// guarantees the staging-buffer shape either way.
///
/// Overflowing `staging` is always fatal: the transport promised this
/// could not happen above `MESSAGE_SIZE_MAX`, so seeing it here means that
/// promise was broken.
pub fn stage_delivery(
    iovecs: &[&[u8]],
    staging: &mut [u8],
) -> Result<usize, FatalTransportError> {
    let total: usize = iovecs.iter().map(|s| s.len()).sum();
    if total > staging.len() {
        return Err(FatalTransportError::DeliveryOverflow { got: total, max: staging.len() });
    }
    let mut offset = 0;
    for seg in iovecs {
        staging[offset..offset + seg.len()].copy_from_slice(seg);
        offset += seg.len();
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_segments_in_order() {
        let mut staging = [0u8; 16];
        let n = stage_delivery(&[b"ab", b"cd", b"ef"], &mut staging).unwrap();
        assert_eq!(&staging[..n], b"abcdef");
    }

    #[test]
    fn overflow_is_fatal() {
        let mut staging = [0u8; 4];
        let err = stage_delivery(&[b"abcde"], &mut staging).unwrap_err();
        assert!(matches!(err, FatalTransportError::DeliveryOverflow { got: 5, max: 4 }));
    }
}
