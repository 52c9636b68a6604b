use serde::{Deserialize, Serialize};

use super::CodecError;

/// JSON container for symmetric ciphertext and the IV it was produced with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex")]
    pub iv: Vec<u8>,
}

impl EncryptedBlob {
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string_pretty(self).map_err(|e| CodecError::Invalid {
            field: "encrypted blob",
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(json).map_err(|e| CodecError::Invalid {
            field: "encrypted blob",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let blob = EncryptedBlob {
            ciphertext: vec![0xDE, 0xAD],
            iv: vec![0x01; 16],
        };
        let json = blob.to_json().unwrap();
        assert!(json.contains("\"ciphertext\": \"dead\""));
        assert_eq!(EncryptedBlob::from_json(json.as_bytes()).unwrap(), blob);
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(EncryptedBlob::from_json(b"{\"ciphertext\": \"zz\"}").is_err());
    }
}
