use super::handle::Hierarchy;

/// Proof that the module itself hashed a message.
///
/// Restricted signing keys accept only digests that come with a valid
/// ticket. The null ticket carries no proof and is what unrestricted keys
/// are given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashCheckTicket {
    hierarchy: Hierarchy,
    digest: Vec<u8>,
}

impl HashCheckTicket {
    /// Structure tag of a hash-check ticket
    pub const TAG: u16 = 0x8024;

    pub fn new(hierarchy: Hierarchy, digest: Vec<u8>) -> Self {
        Self { hierarchy, digest }
    }

    pub fn null() -> Self {
        Self {
            hierarchy: Hierarchy::Null,
            digest: Vec::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.hierarchy == Hierarchy::Null && self.digest.is_empty()
    }

    pub fn hierarchy(&self) -> Hierarchy {
        self.hierarchy
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}
