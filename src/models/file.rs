//! # File State
//!
//! One produced build artifact. The four tag fields are decomposed from the
//! wheel filename exactly once, at construction; nothing downstream
//! re-derives them. The content hash is a lowercase SHA-256 hex digest,
//! validated here so a bad digest never reaches the database.

use crate::error::StateError;
use serde::{Deserialize, Serialize};

const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub filename: String,
    /// Size in bytes, always positive.
    pub filesize: i64,
    /// Lowercase SHA-256 hex digest of the file content.
    pub filehash: String,
    pub package_tag: String,
    pub package_version_tag: String,
    pub py_version_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
    /// Flipped exactly once, after the artifact is uploaded.
    pub transferred: bool,
}

impl FileState {
    /// Construct from a wheel filename, parsing the tag fields out of it.
    ///
    /// Handles both the five-part form
    /// (`pkg-version-py-abi-platform.whl`) and the six-part form carrying an
    /// optional build tag, which is not retained.
    pub fn from_filename(
        filename: &str,
        filesize: i64,
        filehash: &str,
    ) -> Result<Self, StateError> {
        let stem = filename
            .strip_suffix(".whl")
            .ok_or_else(|| StateError::InvalidFilename {
                filename: filename.to_string(),
            })?;
        let parts: Vec<&str> = stem.split('-').collect();
        let (package_tag, package_version_tag, py_version_tag, abi_tag, platform_tag) =
            match parts.as_slice() {
                [pkg, ver, py, abi, plat] => (*pkg, *ver, *py, *abi, *plat),
                [pkg, ver, _build, py, abi, plat] => (*pkg, *ver, *py, *abi, *plat),
                _ => {
                    return Err(StateError::InvalidFilename {
                        filename: filename.to_string(),
                    })
                }
            };
        if parts.iter().any(|part| part.is_empty()) {
            return Err(StateError::InvalidFilename {
                filename: filename.to_string(),
            });
        }
        Self::from_parts(
            filename,
            filesize,
            filehash,
            package_tag,
            package_version_tag,
            py_version_tag,
            abi_tag,
            platform_tag,
            false,
        )
    }

    /// Construct from pre-parsed tags (the database re-read path). Size and
    /// digest are still validated.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        filename: &str,
        filesize: i64,
        filehash: &str,
        package_tag: &str,
        package_version_tag: &str,
        py_version_tag: &str,
        abi_tag: &str,
        platform_tag: &str,
        transferred: bool,
    ) -> Result<Self, StateError> {
        if filesize <= 0 {
            return Err(StateError::InvalidSize { size: filesize });
        }
        validate_sha256(filehash)?;
        Ok(Self {
            filename: filename.to_string(),
            filesize,
            filehash: filehash.to_string(),
            package_tag: package_tag.to_string(),
            package_version_tag: package_version_tag.to_string(),
            py_version_tag: py_version_tag.to_string(),
            abi_tag: abi_tag.to_string(),
            platform_tag: platform_tag.to_string(),
            transferred,
        })
    }

    /// Record a successful upload. The only permitted mutation.
    pub fn mark_transferred(&mut self) {
        self.transferred = true;
    }
}

fn validate_sha256(digest: &str) -> Result<(), StateError> {
    let err = |reason: &str| StateError::InvalidHash {
        algorithm: "sha256".to_string(),
        digest: digest.to_string(),
        reason: reason.to_string(),
    };
    if digest.len() != SHA256_HEX_LEN {
        return Err(err("expected 64 hex characters"));
    }
    if !digest
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        return Err(err("expected lowercase hex"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HASH: &str = "97a6d21df7c51e88cdd4563832e6d1b723e69ec3ba7b73b97ac0db7eb8d0f0ca";

    #[test]
    fn parses_platform_wheel_tags() {
        let file =
            FileState::from_filename("foo-0.1-cp34-cp34m-linux_armv7l.whl", 123_456, HASH)
                .unwrap();
        assert_eq!(file.package_tag, "foo");
        assert_eq!(file.package_version_tag, "0.1");
        assert_eq!(file.py_version_tag, "cp34");
        assert_eq!(file.abi_tag, "cp34m");
        assert_eq!(file.platform_tag, "linux_armv7l");
        assert!(!file.transferred);
    }

    #[test]
    fn parses_universal_wheel_tags() {
        let file = FileState::from_filename("foo-0.1-py2.py3-none-any.whl", 123_456, HASH)
            .unwrap();
        assert_eq!(file.py_version_tag, "py2.py3");
        assert_eq!(file.abi_tag, "none");
        assert_eq!(file.platform_tag, "any");
    }

    #[test]
    fn build_tag_is_not_retained() {
        let file = FileState::from_filename("foo-0.1-2-cp34-cp34m-linux_armv7l.whl", 1, HASH)
            .unwrap();
        assert_eq!(file.package_version_tag, "0.1");
        assert_eq!(file.py_version_tag, "cp34");
    }

    #[test]
    fn rejects_non_wheel_filename() {
        let err = FileState::from_filename("foo-0.1.tar.gz", 1, HASH).unwrap_err();
        assert!(matches!(err, StateError::InvalidFilename { .. }));
    }

    #[test]
    fn rejects_uppercase_digest() {
        let err =
            FileState::from_filename("foo-0.1-cp34-cp34m-linux_armv7l.whl", 1, &HASH.to_uppercase())
                .unwrap_err();
        assert!(matches!(err, StateError::InvalidHash { .. }));
    }

    #[test]
    fn rejects_short_digest() {
        let err = FileState::from_filename("foo-0.1-cp34-cp34m-linux_armv7l.whl", 1, "abc123")
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidHash { .. }));
    }

    #[test]
    fn rejects_non_positive_size() {
        let err =
            FileState::from_filename("foo-0.1-cp34-cp34m-linux_armv7l.whl", 0, HASH).unwrap_err();
        assert_eq!(err, StateError::InvalidSize { size: 0 });
    }

    #[test]
    fn mark_transferred_flips_flag() {
        let mut file =
            FileState::from_filename("foo-0.1-cp34-cp34m-linux_armv7l.whl", 1, HASH).unwrap();
        file.mark_transferred();
        assert!(file.transferred);
    }

    proptest! {
        // The filename uniquely determines the four tag fields.
        #[test]
        fn filename_determines_tags(
            pkg in "[a-z][a-z0-9_]{0,10}",
            ver in "[0-9]{1,2}\\.[0-9]{1,2}",
            py in "(cp3[4-9]|py2\\.py3)",
            abi in "(none|cp3[4-9]m)",
            plat in "(any|linux_armv6l|linux_armv7l)",
        ) {
            let filename = format!("{pkg}-{ver}-{py}-{abi}-{plat}.whl");
            let file = FileState::from_filename(&filename, 1, HASH).unwrap();
            prop_assert_eq!(file.package_tag, pkg);
            prop_assert_eq!(file.package_version_tag, ver);
            prop_assert_eq!(file.py_version_tag, py);
            prop_assert_eq!(file.abi_tag, abi);
            prop_assert_eq!(file.platform_tag, plat);
        }
    }
}
