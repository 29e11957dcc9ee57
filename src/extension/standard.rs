//! The standard target: built-in verdicts and chain jumps.

use super::{ExtOption, Extension, ExtensionData, OptionCall};
use crate::rule_spec::RuleSpec;
use crate::Result;

/// Registered name of the standard target.
pub const STANDARD_TARGET: &str = "standard";

pub const LABEL_ACCEPT: &str = "ACCEPT";
pub const LABEL_DROP: &str = "DROP";
pub const LABEL_QUEUE: &str = "QUEUE";
pub const LABEL_RETURN: &str = "RETURN";

/// Verdict values stored in the data block.
pub const VERDICT_ACCEPT: i32 = -2;
pub const VERDICT_DROP: i32 = -1;
pub const VERDICT_QUEUE: i32 = -4;
pub const VERDICT_RETURN: i32 = -5;
/// Jumps are stored as 0; the table engine resolves the chain by label.
pub const VERDICT_JUMP: i32 = 0;

/// Whether `name` is handled by the standard target.
pub fn is_standard_label(name: &str) -> bool {
    matches!(
        name,
        "" | LABEL_ACCEPT | LABEL_DROP | LABEL_QUEUE | LABEL_RETURN
    )
}

/// Verdict for a target label.
pub fn verdict_for(label: &str) -> i32 {
    match label {
        LABEL_ACCEPT => VERDICT_ACCEPT,
        LABEL_DROP => VERDICT_DROP,
        LABEL_QUEUE => VERDICT_QUEUE,
        LABEL_RETURN => VERDICT_RETURN,
        _ => VERDICT_JUMP,
    }
}

/// Label for a built-in verdict.
pub fn label_for(verdict: i32) -> Option<&'static str> {
    match verdict {
        VERDICT_ACCEPT => Some(LABEL_ACCEPT),
        VERDICT_DROP => Some(LABEL_DROP),
        VERDICT_QUEUE => Some(LABEL_QUEUE),
        VERDICT_RETURN => Some(LABEL_RETURN),
        _ => None,
    }
}

/// The standard target extension.
#[derive(Debug, Default)]
pub struct StandardTarget;

impl Extension for StandardTarget {
    fn name(&self) -> &str {
        STANDARD_TARGET
    }

    fn size(&self) -> usize {
        8
    }

    fn userspace_size(&self) -> usize {
        4
    }

    fn options(&self) -> &[ExtOption] {
        &[]
    }

    fn init(&self, label: &str) -> Box<dyn ExtensionData> {
        Box::new(StandardData {
            verdict: verdict_for(label),
        })
    }
}

#[derive(Debug)]
struct StandardData {
    verdict: i32,
}

impl ExtensionData for StandardData {
    fn parse(&mut self, _call: &OptionCall<'_>, _flags: &mut u32, _spec: &mut RuleSpec) -> Result<bool> {
        Ok(false)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.verdict.to_be_bytes());
    }
}

/// Decode the verdict stored in a standard target block.
pub fn decode_verdict(data: &[u8]) -> Option<i32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(i32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert!(is_standard_label(""));
        assert!(is_standard_label("ACCEPT"));
        assert!(is_standard_label("RETURN"));
        assert!(!is_standard_label("accept"));
        assert!(!is_standard_label("mychain"));
    }

    #[test]
    fn test_encode_verdicts() {
        let target = StandardTarget;
        for (label, verdict) in [
            ("ACCEPT", -2),
            ("DROP", -1),
            ("QUEUE", -4),
            ("RETURN", -5),
            ("mychain", 0),
        ] {
            let data = target.init(label);
            let mut out = vec![0u8; target.size()];
            data.encode(&mut out);
            assert_eq!(decode_verdict(&out), Some(verdict), "{}", label);
            assert_eq!(&out[4..], &[0; 4]);
        }
    }

    #[test]
    fn test_label_for_roundtrip() {
        assert_eq!(label_for(VERDICT_DROP), Some("DROP"));
        assert_eq!(label_for(VERDICT_JUMP), None);
    }
}
