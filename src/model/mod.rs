mod algorithm;
mod attributes;
mod auth;
mod blob;
pub mod catalog;
mod handle;
mod name;
mod public_area;
mod sensitive;
mod signature;
mod template;
mod ticket;

pub use algorithm::{alg_id, AlgorithmError, EccCurve, HashAlg, SymDef, SymMode};
pub use attributes::ObjectAttributes;
pub use auth::{AuthValue, AuthValueError};
pub use blob::{KeyBlob, PrivateBlob, PrivateBlobError};
pub use catalog::KeyKind;
pub use handle::{Handle, HandleError, Hierarchy, PersistentHandle};
pub use name::Name;
pub use public_area::{PublicArea, Unique, MAX_PUBLIC_BUFFER};
pub use sensitive::{SensitiveCreate, MAX_SEALED_DATA};
pub use signature::{SigScheme, Signature};
pub use template::{
    EccParams, EccScheme, KeyParams, KeyTemplate, KeyedHashParams, KeyedHashScheme, ObjectType,
    RsaParams, RsaScheme, TemplateError,
};
pub use ticket::HashCheckTicket;
