use std::fmt;
use std::ops::BitOr;

/// Object attribute bits carried in every public area
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectAttributes(u32);

impl ObjectAttributes {
    pub const FIXED_TPM: Self = Self(1 << 1);
    pub const ST_CLEAR: Self = Self(1 << 2);
    pub const FIXED_PARENT: Self = Self(1 << 4);
    pub const SENSITIVE_DATA_ORIGIN: Self = Self(1 << 5);
    pub const USER_WITH_AUTH: Self = Self(1 << 6);
    pub const ADMIN_WITH_POLICY: Self = Self(1 << 7);
    pub const NO_DA: Self = Self(1 << 10);
    pub const ENCRYPTED_DUPLICATION: Self = Self(1 << 11);
    pub const RESTRICTED: Self = Self(1 << 16);
    pub const DECRYPT: Self = Self(1 << 17);
    pub const SIGN: Self = Self(1 << 18);

    const NAMED: [(Self, &'static str); 11] = [
        (Self::FIXED_TPM, "fixedTPM"),
        (Self::ST_CLEAR, "stClear"),
        (Self::FIXED_PARENT, "fixedParent"),
        (Self::SENSITIVE_DATA_ORIGIN, "sensitiveDataOrigin"),
        (Self::USER_WITH_AUTH, "userWithAuth"),
        (Self::ADMIN_WITH_POLICY, "adminWithPolicy"),
        (Self::NO_DA, "noDA"),
        (Self::ENCRYPTED_DUPLICATION, "encryptedDuplication"),
        (Self::RESTRICTED, "restricted"),
        (Self::DECRYPT, "decrypt"),
        (Self::SIGN, "sign"),
    ];

    const DEFINED: u32 = 0x0007_0CF6;

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `None` when a reserved bit is set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::DEFINED != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_restricted(self) -> bool {
        self.contains(Self::RESTRICTED)
    }

    pub const fn can_sign(self) -> bool {
        self.contains(Self::SIGN)
    }

    pub const fn can_decrypt(self) -> bool {
        self.contains(Self::DECRYPT)
    }

    /// A storage parent is a restricted decryption key.
    pub const fn is_storage(self) -> bool {
        self.contains(Self::RESTRICTED.union(Self::DECRYPT))
    }
}

impl BitOr for ObjectAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for ObjectAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ObjectAttributes({:#010x}: {})", self.0, names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_requires_both_bits() {
        let storage = ObjectAttributes::RESTRICTED | ObjectAttributes::DECRYPT;
        assert!(storage.is_storage());
        assert!(!ObjectAttributes::DECRYPT.is_storage());
        assert!(!(ObjectAttributes::RESTRICTED | ObjectAttributes::SIGN).is_storage());
    }

    #[test]
    fn test_reserved_bits_rejected() {
        assert!(ObjectAttributes::from_bits(1).is_none());
        assert!(ObjectAttributes::from_bits(1 << 3).is_none());
        let all = ObjectAttributes::NAMED
            .iter()
            .fold(ObjectAttributes::empty(), |acc, (flag, _)| acc | *flag);
        assert_eq!(ObjectAttributes::from_bits(all.bits()), Some(all));
    }

    #[test]
    fn test_debug_lists_flags() {
        let attrs = ObjectAttributes::SIGN | ObjectAttributes::FIXED_TPM;
        let text = format!("{:?}", attrs);
        assert!(text.contains("fixedTPM|sign"));
    }
}
