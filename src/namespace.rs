//! Option namespace shared by the core parser and loaded extensions.
//!
//! Each extension that joins a parse is given its own window, a
//! multiple of [`WINDOW_SIZE`]. Entries record their owner directly so
//! dispatch never has to recover it from the flat code.

use crate::error::{Error, Result};
use crate::extension::ExtOption;
use crate::options::{CoreOpt, HasArg, CORE_LONG_OPTIONS};

/// Size of one option window; core options live in window 0.
pub const WINDOW_SIZE: u32 = 256;

/// Component an option belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionOwner {
    /// The core parser
    Core(CoreOpt),
    /// The target selected with `-j`
    Target,
    /// The n-th match loaded with `-m`
    Match(usize),
}

/// One long option in the merged table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongOption {
    pub name: String,
    pub has_arg: HasArg,
    pub owner: OptionOwner,
    /// Owner-local code
    pub code: u32,
    /// Window the option was merged into
    pub window: u32,
}

impl LongOption {
    /// Code in the flat numbering across all windows.
    pub fn flat_code(&self) -> u32 {
        self.window + self.code
    }
}

/// The running option table of one parse.
#[derive(Debug, Clone)]
pub struct OptionNamespace {
    base_len: usize,
    options: Vec<LongOption>,
    running_offset: u32,
}

impl OptionNamespace {
    /// A namespace holding only the core options.
    pub fn new() -> Self {
        let options: Vec<LongOption> = CORE_LONG_OPTIONS
            .iter()
            .map(|(name, has_arg, opt)| LongOption {
                name: name.to_string(),
                has_arg: *has_arg,
                owner: OptionOwner::Core(*opt),
                code: opt.code(),
                window: 0,
            })
            .collect();
        Self {
            base_len: options.len(),
            options,
            running_offset: 0,
        }
    }

    /// Merge an extension's options under a fresh window.
    ///
    /// # Returns
    /// The window id assigned to this merge.
    pub fn contribute(&mut self, owner: OptionOwner, extension_options: &[ExtOption]) -> u32 {
        self.running_offset += WINDOW_SIZE;
        let window = self.running_offset;
        self.options.extend(extension_options.iter().map(|opt| LongOption {
            name: opt.name.to_string(),
            has_arg: if opt.has_arg {
                HasArg::Required
            } else {
                HasArg::No
            },
            owner,
            code: opt.code,
            window,
        }));
        log::debug!(
            "merged {} option(s) for {:?} at window {}",
            extension_options.len(),
            owner,
            window
        );
        window
    }

    /// Drop every merged extension option.
    ///
    /// Window ids keep increasing so none is handed out twice.
    pub fn reset(&mut self) {
        self.options.truncate(self.base_len);
    }

    /// All options in merge order.
    pub fn options(&self) -> &[LongOption] {
        &self.options
    }

    /// Resolve a long option by exact name or unambiguous prefix.
    pub fn lookup(&self, name: &str) -> Result<&LongOption> {
        if let Some(exact) = self.options.iter().find(|o| o.name == name) {
            return Ok(exact);
        }

        let mut found: Option<&LongOption> = None;
        for candidate in self.options.iter().filter(|o| o.name.starts_with(name)) {
            match found {
                None => found = Some(candidate),
                // Aliases of one option are not ambiguous
                Some(prev)
                    if prev.owner == candidate.owner
                        && prev.code == candidate.code
                        && prev.has_arg == candidate.has_arg => {}
                Some(_) => {
                    return Err(Error::param(format!("option `--{}' is ambiguous", name)));
                }
            }
        }
        found.ok_or_else(|| Error::param(format!("unrecognized option `--{}'", name)))
    }
}

impl Default for OptionNamespace {
    fn default() -> Self {
        Self::new()
    }
}
