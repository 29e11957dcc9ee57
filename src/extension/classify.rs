//! The `CLASSIFY` target: set the traffic-control class.

use super::{ExtOption, Extension, ExtensionData, OptionCall};
use crate::address::number::parse_in_range;
use crate::rule_spec::{ArpSpec, RuleSpec};
use crate::{Error, Result};

const SET_CLASS: u32 = b'1' as u32;

static OPTIONS: [ExtOption; 1] = [ExtOption::with_arg("set-class", SET_CLASS)];

/// The `CLASSIFY` target extension.
#[derive(Debug, Default)]
pub struct ClassifyTarget;

impl Extension for ClassifyTarget {
    fn name(&self) -> &str {
        "CLASSIFY"
    }

    fn size(&self) -> usize {
        8
    }

    fn userspace_size(&self) -> usize {
        4
    }

    fn options(&self) -> &[ExtOption] {
        &OPTIONS
    }

    fn init(&self, _label: &str) -> Box<dyn ExtensionData> {
        Box::new(ClassifyData { priority: 0 })
    }

    fn print(&self, data: &[u8], _arp: &ArpSpec, _numeric: bool) -> String {
        match data.get(..4).and_then(|b| <[u8; 4]>::try_from(b).ok()) {
            Some(bytes) => {
                let priority = u32::from_be_bytes(bytes);
                format!("--set-class {:x}:{:x} ", priority >> 16, priority & 0xffff)
            }
            None => String::new(),
        }
    }
}

#[derive(Debug)]
struct ClassifyData {
    priority: u32,
}

/// Parse `MAJOR:MINOR` (hex, each at most 0xffff) into a class handle.
pub fn parse_class(text: &str) -> Option<u32> {
    let (major, minor) = text.split_once(':')?;
    let major = parse_in_range(major, 16, 0, 0xffff)? as u32;
    let minor = parse_in_range(minor, 16, 0, 0xffff)? as u32;
    Some((major << 16) | minor)
}

impl ExtensionData for ClassifyData {
    fn parse(&mut self, call: &OptionCall<'_>, flags: &mut u32, _spec: &mut RuleSpec) -> Result<bool> {
        if call.code != SET_CLASS {
            return Ok(false);
        }
        if *flags != 0 {
            return Err(Error::param("CLASSIFY: Only use --set-class ONCE!"));
        }
        if call.invert {
            return Err(Error::param("CLASSIFY: unexpected ! flag"));
        }
        self.priority = parse_class(call.arg())
            .ok_or_else(|| Error::param(format!("Bad class value `{}'", call.arg())))?;
        *flags = 1;
        Ok(true)
    }

    fn finalize(&self, flags: u32) -> Result<()> {
        if flags == 0 {
            return Err(Error::param("CLASSIFY: Parameter --set-class is required"));
        }
        Ok(())
    }

    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.priority.to_be_bytes());
    }
}
