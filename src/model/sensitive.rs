use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::AuthValue;

/// Largest payload a keyed-hash object can seal.
pub const MAX_SEALED_DATA: usize = 128;

/// Secret inputs to object creation: the auth value and optional sealed data
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveCreate {
    user_auth: AuthValue,
    data: Vec<u8>,
}

impl SensitiveCreate {
    pub fn new(user_auth: AuthValue, data: Vec<u8>) -> Self {
        Self { user_auth, data }
    }

    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            user_auth: AuthValue::empty(),
            data,
        }
    }

    pub fn with_auth(user_auth: AuthValue) -> Self {
        Self {
            user_auth,
            data: Vec::new(),
        }
    }

    pub fn user_auth(&self) -> &AuthValue {
        &self.user_auth
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for SensitiveCreate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensitiveCreate")
            .field("user_auth", &self.user_auth)
            .field("data_len", &self.data.len())
            .finish()
    }
}
