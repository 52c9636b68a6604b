use super::{read_public, write_public, CodecError, Reader, Writer};
use crate::model::{KeyBlob, PrivateBlob};

/// Encodes a key blob as a sized public area followed by a sized private area.
pub fn encode_key_blob(blob: &KeyBlob) -> Vec<u8> {
    let mut public = Writer::new();
    write_public(&mut public, blob.public());

    let mut w = Writer::new();
    w.sized(&public.into_bytes());
    w.sized(blob.private().as_bytes());
    w.into_bytes()
}

/// Decodes a key blob, rejecting truncation, bad structure and trailing bytes.
pub fn decode_key_blob(bytes: &[u8]) -> Result<KeyBlob, CodecError> {
    let mut outer = Reader::new(bytes);

    let mut inner = Reader::new(outer.sized()?);
    let public = read_public(&mut inner)?;
    inner.finish()?;

    let private = PrivateBlob::new(outer.sized()?.to_vec()).map_err(|e| CodecError::Invalid {
        field: "private area",
        reason: e.to_string(),
    })?;
    outer.finish()?;

    Ok(KeyBlob::new(public, private))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{catalog, PublicArea, Unique};

    fn sample_blob() -> KeyBlob {
        let public = PublicArea::new(
            catalog::aes128_cfb(),
            Unique::SymCipher {
                digest: vec![0x5A; 32],
            },
        )
        .unwrap();
        KeyBlob::new(public, PrivateBlob::new(vec![0xC3; 80]).unwrap())
    }

    #[test]
    fn test_round_trip() {
        let blob = sample_blob();
        assert_eq!(decode_key_blob(&encode_key_blob(&blob)).unwrap(), blob);
    }

    #[test]
    fn test_length_prefixes() {
        let bytes = encode_key_blob(&sample_blob());
        let public_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let private_at = 2 + public_len;
        assert_eq!(
            u16::from_be_bytes([bytes[private_at], bytes[private_at + 1]]),
            80
        );
        assert_eq!(bytes.len(), private_at + 2 + 80);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_key_blob(&sample_blob());
        bytes.push(0);
        assert_eq!(
            decode_key_blob(&bytes).unwrap_err(),
            CodecError::TrailingBytes { len: 1 }
        );
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = encode_key_blob(&sample_blob());
        for cut in [0, 1, 10, bytes.len() - 1] {
            assert!(decode_key_blob(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn test_public_size_must_cover_public_area() {
        let mut bytes = encode_key_blob(&sample_blob());
        // Shrinking the public size leaves the public area truncated.
        bytes[1] -= 1;
        assert!(decode_key_blob(&bytes).is_err());
    }

    #[test]
    fn test_empty_private_rejected() {
        let mut w = Writer::new();
        let mut public = Writer::new();
        write_public(&mut public, sample_blob().public());
        w.sized(&public.into_bytes());
        w.sized(&[]);
        assert!(matches!(
            decode_key_blob(&w.into_bytes()),
            Err(CodecError::Invalid {
                field: "private area",
                ..
            })
        ));
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs: [&[u8]; 4] = [
            &[],
            &[0xFF, 0xFF],
            &[0x00, 0x04, 0x00, 0x25, 0x00, 0x0B],
            b"not a key blob at all",
        ];
        for input in inputs {
            assert!(decode_key_blob(input).is_err());
        }
    }
}
