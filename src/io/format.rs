//! Product format identifiers such as `DBL_SM_XXXX_MIR_SCLF1C_0400`.
//!
//! Layout: `<kind 3>_<mission 2>_<class 4>_<file type 10>_<version 4>`. The
//! file class (`OPER`, `XXXX`, ...) does not influence the binary layout, so
//! the lookup key replaces it with `XXXX`.
use std::fmt;

use crate::types::ProductFamily;

const KEY_CLASS: &str = "XXXX";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatId {
    pub kind: String,
    pub mission: String,
    pub class: String,
    pub file_type: String,
    pub version: String,
}

impl FormatId {
    /// Parse a datablock schema or file name identifier. Trailing text after
    /// the version (e.g. a file extension) is ignored.
    pub fn parse(s: &str) -> Option<FormatId> {
        let s = s.trim();
        let b = s.as_bytes();
        if b.len() < 27 || !s.is_char_boundary(27) {
            return None;
        }
        if b[3] != b'_' || b[6] != b'_' || b[11] != b'_' || b[22] != b'_' {
            return None;
        }
        let kind = &s[0..3];
        let mission = &s[4..6];
        let class = &s[7..11];
        let file_type = &s[12..22];
        let version = &s[23..27];
        if kind != "DBL" && kind != "HDR" {
            return None;
        }
        if !mission.bytes().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        if !version.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !class.bytes().chain(file_type.bytes()).all(|c| c.is_ascii_alphanumeric() || c == b'_') {
            return None;
        }
        Some(FormatId {
            kind: kind.to_string(),
            mission: mission.to_string(),
            class: class.to_string(),
            file_type: file_type.to_string(),
            version: version.to_string(),
        })
    }

    /// Stable lookup key with the file class normalized.
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.kind, self.mission, KEY_CLASS, self.file_type, self.version
        )
    }

    pub fn family(&self) -> Option<ProductFamily> {
        ProductFamily::from_file_type(&self.file_type)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}",
            self.kind, self.mission, self.class, self.file_type, self.version
        )
    }
}

/// Normalized key for a format string; strings that do not follow the naming
/// convention are used verbatim.
pub fn format_key(s: &str) -> String {
    FormatId::parse(s)
        .map(|id| id.key())
        .unwrap_or_else(|| s.trim().to_string())
}
