#![deny(missing_docs)]
#![doc = "Shared error taxonomy, code identity and dependency value types for prov."]

pub mod dependency;
pub mod errors;
pub mod hash;
pub mod identity;
pub mod patch;
pub mod provenance;
pub mod serde;

pub use dependency::{Dependency, VersionOrigin, UNKNOWN_VERSION};
pub use errors::{ErrorInfo, ProvError};
pub use hash::{hash_file, sha256_hex, stable_hash_string};
pub use identity::{CodeIdentity, VcsKind};
pub use patch::{is_whitespace_only, WhitespacePolicy};
pub use provenance::SchemaVersion;
pub use self::serde::{from_json_slice, to_canonical_json_bytes, to_canonical_json_pretty};
