//! Interface name matching.

use crate::error::{Error, Result};

/// Size of an interface name field including the terminating NUL.
pub const IFNAMSIZ: usize = 16;

/// Interface name and match mask, both NUL padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interface {
    pub name: [u8; IFNAMSIZ],
    pub mask: [u8; IFNAMSIZ],
}

impl Interface {
    /// The name up to its first NUL.
    pub fn name_str(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(IFNAMSIZ);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Whether the interface takes part in matching.
    pub fn is_set(&self) -> bool {
        self.mask.iter().any(|&b| b != 0)
    }
}

/// Parse an interface name.
///
/// A trailing `+` matches any interface with that prefix; otherwise the
/// terminating NUL is part of the match. An empty name matches anything.
pub fn parse_interface(arg: &str) -> Result<Interface> {
    let bytes = arg.as_bytes();
    if bytes.len() + 1 > IFNAMSIZ {
        return Err(Error::param(format!(
            "interface name `{}' must be shorter than IFNAMSIZ ({})",
            arg,
            IFNAMSIZ - 1
        )));
    }

    let mut iface = Interface::default();
    iface.name[..bytes.len()].copy_from_slice(bytes);

    match bytes.last() {
        None => {}
        Some(b'+') => iface.mask[..bytes.len() - 1].fill(0xff),
        Some(_) => {
            iface.mask[..bytes.len() + 1].fill(0xff);
            if bytes
                .iter()
                .any(|&b| !b.is_ascii_alphanumeric() && b != b'_' && b != b'.')
            {
                log::warn!(
                    "weird character in interface `{}' (No aliases, :, ! or *).",
                    arg
                );
            }
        }
    }
    Ok(iface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_includes_nul() {
        let iface = parse_interface("eth0").unwrap();
        assert_eq!(&iface.name[..5], b"eth0\0");
        assert_eq!(&iface.mask[..5], &[0xff; 5]);
        assert_eq!(iface.mask[5], 0);
        assert_eq!(iface.name_str(), "eth0");
    }

    #[test]
    fn test_wildcard_keeps_plus() {
        let iface = parse_interface("eth+").unwrap();
        assert_eq!(&iface.name[..4], b"eth+");
        assert_eq!(&iface.mask[..3], &[0xff; 3]);
        assert_eq!(iface.mask[3], 0);
    }

    #[test]
    fn test_empty_matches_anything() {
        let iface = parse_interface("").unwrap();
        assert!(!iface.is_set());
    }

    #[test]
    fn test_too_long() {
        assert!(parse_interface("abcdefghijklmno").is_ok());
        let err = parse_interface("abcdefghijklmnop").unwrap_err();
        assert_eq!(
            err.to_string(),
            "interface name `abcdefghijklmnop' must be shorter than IFNAMSIZ (15)"
        );
    }
}
