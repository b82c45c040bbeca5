//! File addresses
//!
//! A file is named by `kinetic:<clusterId>:<relativePath>`. Only the first
//! two `:` are structural; the relative path keeps any further delimiters
//! verbatim and is used byte-for-byte as the chunk key base.
//!
//! The authority form `kinetic://<clusterId>/<relativePath>` is accepted
//! as well and names the same file as its colon form.

use crate::chunk::{chunk_key, ChunkKey};
use crate::error::{KineticIoError, Result};
use std::fmt;
use std::str::FromStr;

/// Recognized address scheme
pub const SCHEME: &str = "kinetic";

const DELIMITER: char = ':';
const AUTHORITY_PREFIX: &str = "//";
const AUTHORITY_DELIMITER: char = '/';

/// A parsed, validated file address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KineticAddress {
    cluster_id: String,
    relative_path: String,
}

impl KineticAddress {
    /// Build an address from its parts, applying the same validation as
    /// `parse`.
    pub fn new(cluster_id: impl Into<String>, relative_path: impl Into<String>) -> Result<Self> {
        let cluster_id = cluster_id.into();
        let relative_path = relative_path.into();
        let display = format!("{SCHEME}{DELIMITER}{cluster_id}{DELIMITER}{relative_path}");
        Self::validated(&display, &cluster_id, &relative_path)
    }

    /// Parse an address string.
    ///
    /// The scheme is checked before anything else is scanned, so input
    /// without `kinetic:` is always `InvalidAddress` and never reaches a
    /// cluster lookup.
    pub fn parse(address: &str) -> Result<Self> {
        let rest = address
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(DELIMITER))
            .ok_or_else(|| {
                KineticIoError::invalid_address(address, format!("missing '{SCHEME}:' scheme"))
            })?;

        let (cluster_id, relative_path) = match rest.strip_prefix(AUTHORITY_PREFIX) {
            Some(authority) => authority.split_once(AUTHORITY_DELIMITER).ok_or_else(|| {
                KineticIoError::invalid_address(address, "missing '/' after cluster id")
            })?,
            None => rest.split_once(DELIMITER).ok_or_else(|| {
                KineticIoError::invalid_address(address, "missing ':' after cluster id")
            })?,
        };

        Self::validated(address, cluster_id, relative_path)
    }

    fn validated(address: &str, cluster_id: &str, relative_path: &str) -> Result<Self> {
        if cluster_id.is_empty() {
            return Err(KineticIoError::invalid_address(address, "empty cluster id"));
        }
        if cluster_id.starts_with(AUTHORITY_PREFIX) {
            return Err(KineticIoError::invalid_address(
                address,
                "cluster id must not start with '//'",
            ));
        }
        if cluster_id.contains(DELIMITER) {
            return Err(KineticIoError::invalid_address(
                address,
                "cluster id must not contain ':'",
            ));
        }
        if relative_path.is_empty() {
            return Err(KineticIoError::invalid_address(address, "empty relative path"));
        }

        Ok(Self {
            cluster_id: cluster_id.to_string(),
            relative_path: relative_path.to_string(),
        })
    }

    /// Identifier of the owning cluster
    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Path inside the cluster, verbatim
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Device key of the given chunk of this file
    pub fn chunk_key(&self, index: u64) -> Result<ChunkKey> {
        chunk_key(&self.relative_path, index)
    }

}

impl FromStr for KineticAddress {
    type Err = KineticIoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KineticAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME}{DELIMITER}{}{DELIMITER}{}",
            self.cluster_id, self.relative_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason_of(address: &str) -> String {
        match KineticAddress::parse(address) {
            Err(KineticIoError::InvalidAddress { reason, .. }) => reason,
            other => panic!("expected InvalidAddress for {address:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_colon_form() {
        let addr = KineticAddress::parse("kinetic:clusterA:a/b/file.dat").unwrap();
        assert_eq!(addr.cluster_id(), "clusterA");
        assert_eq!(addr.relative_path(), "a/b/file.dat");
    }

    #[test]
    fn test_extra_delimiters_stay_in_path() {
        let addr = KineticAddress::parse("kinetic:c1:dir:with:colons").unwrap();
        assert_eq!(addr.cluster_id(), "c1");
        assert_eq!(addr.relative_path(), "dir:with:colons");
    }

    #[test]
    fn test_path_is_not_normalized() {
        let addr = KineticAddress::parse("kinetic:c1: ./a//b/../ ").unwrap();
        assert_eq!(addr.relative_path(), " ./a//b/../ ");
    }

    #[test]
    fn test_parse_authority_form() {
        let addr = KineticAddress::parse("kinetic://thisdoesntexist/file").unwrap();
        assert_eq!(addr.cluster_id(), "thisdoesntexist");
        assert_eq!(addr.relative_path(), "file");

        let nested = KineticAddress::parse("kinetic://c1/a/b/c").unwrap();
        assert_eq!(nested.relative_path(), "a/b/c");
        assert_eq!(nested.to_string(), "kinetic:c1:a/b/c");
    }

    #[test]
    fn test_missing_scheme() {
        assert!(reason_of("path").contains("scheme"));
        assert!(reason_of("").contains("scheme"));
        assert!(reason_of("s3:bucket:key").contains("scheme"));
        assert!(reason_of("kinetic").contains("scheme"));
        assert!(reason_of("Kinetic:c:p").contains("scheme"));
        assert!(reason_of(":c:p").contains("scheme"));
    }

    #[test]
    fn test_missing_second_delimiter() {
        assert!(reason_of("kinetic:").contains("after cluster id"));
        assert!(reason_of("kinetic:clusterOnly").contains("after cluster id"));
        assert!(reason_of("kinetic://clusterOnly").contains("after cluster id"));
    }

    #[test]
    fn test_empty_segments() {
        assert_eq!(reason_of("kinetic::file"), "empty cluster id");
        assert_eq!(reason_of("kinetic:///file"), "empty cluster id");
        assert_eq!(reason_of("kinetic:c1:"), "empty relative path");
        assert_eq!(reason_of("kinetic://c1/"), "empty relative path");
    }

    #[test]
    fn test_authority_cluster_id_cannot_hold_delimiter() {
        assert!(reason_of("kinetic://a:b/file").contains("must not contain"));
    }

    #[test]
    fn test_display_reparses() {
        let addr: KineticAddress = "kinetic:c9:x:y/z".parse().unwrap();
        let again = KineticAddress::parse(&addr.to_string()).unwrap();
        assert_eq!(addr, again);
    }

    #[test]
    fn test_new_validates() {
        assert!(KineticAddress::new("c", "f").is_ok());
        assert!(KineticAddress::new("", "f").is_err());
        assert!(KineticAddress::new("c", "").is_err());
    }

    #[test]
    fn test_new_rejects_authority_prefix_in_cluster_id() {
        let err = KineticAddress::new("//x", "f").unwrap_err();
        assert!(matches!(
            err,
            KineticIoError::InvalidAddress { ref reason, .. } if reason.contains("'//'")
        ));
        let single = KineticAddress::new("/x", "f").unwrap();
        assert_eq!(single.to_string().parse::<KineticAddress>().unwrap(), single);
    }

    #[test]
    fn test_chunk_key_from_address() {
        let addr = KineticAddress::parse("kinetic:c:file1").unwrap();
        assert_eq!(addr.chunk_key(3).unwrap().as_str(), "file1_0000000003");
    }
}
