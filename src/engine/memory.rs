//! In-process table engine.

use std::path::{Path, PathBuf};

use super::{snapshot, ChainPolicy, EngineResult, TableEngine, FILTER_CHAINS};
use crate::compiler::CompiledRule;
use crate::error::{EngineError, Error, Result};
use crate::extension::standard::{is_standard_label, LABEL_ACCEPT, LABEL_DROP};
use crate::rule_spec::Counters;

/// One chain as stored by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chain {
    pub name: String,
    /// Policy of a built-in chain; `None` for user-defined chains
    pub policy: Option<String>,
    pub counters: Counters,
    pub rules: Vec<CompiledRule>,
}

impl Chain {
    fn builtin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: Some(LABEL_ACCEPT.to_string()),
            counters: Counters::default(),
            rules: Vec::new(),
        }
    }

    fn user(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: None,
            counters: Counters::default(),
            rules: Vec::new(),
        }
    }

    fn is_builtin(&self) -> bool {
        self.policy.is_some()
    }
}

/// Table engine keeping every chain in memory.
///
/// With a state file the table is loaded from it on open and written
/// back on [`TableEngine::commit`].
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    table: String,
    chains: Vec<Chain>,
    state_file: Option<PathBuf>,
}

impl MemoryEngine {
    /// Open an empty table.
    pub fn new(table: &str) -> Result<Self> {
        if table != "filter" {
            return Err(Error::Version(format!(
                "can't initialize arptables table `{}': Table does not exist (do you need to insmod?)",
                table
            )));
        }
        Ok(Self {
            table: table.to_string(),
            chains: FILTER_CHAINS.iter().map(|name| Chain::builtin(name)).collect(),
            state_file: None,
        })
    }

    /// Open a table persisted in `path`, starting empty when the file
    /// does not exist yet.
    pub fn open(table: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut engine = Self::new(table)?;

        if path.exists() {
            let (stored_table, chains) = snapshot::load(path)?;
            if stored_table != table {
                return Err(Error::Version(format!(
                    "can't initialize arptables table `{}': {} holds table `{}'",
                    table,
                    path.display(),
                    stored_table
                )));
            }
            log::debug!("loaded {} chain(s) from {}", chains.len(), path.display());
            engine.chains = chains;
        }

        engine.state_file = Some(path.to_path_buf());
        Ok(engine)
    }

    /// Path changes are committed to, if any.
    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    pub(crate) fn stored_chains(&self) -> &[Chain] {
        &self.chains
    }

    fn chain(&self, name: &str) -> EngineResult<&Chain> {
        self.chains
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| EngineError::NoSuchChain(name.to_string()))
    }

    fn chain_mut(&mut self, name: &str) -> EngineResult<&mut Chain> {
        self.chains
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| EngineError::NoSuchChain(name.to_string()))
    }

    fn count_references(&self, name: &str) -> u32 {
        self.chains
            .iter()
            .flat_map(|c| c.rules.iter())
            .filter(|r| r.target_label() == name)
            .count() as u32
    }

    fn find_masked(chain: &Chain, rule: &CompiledRule, mask: &[u8]) -> Option<usize> {
        chain.rules.iter().position(|r| rule.matches_masked(r, mask))
    }

    fn insert_user_chain(&mut self, chain: Chain) {
        // Built-ins stay first; user chains are kept sorted by name
        let pos = self
            .chains
            .iter()
            .position(|c| !c.is_builtin() && c.name > chain.name)
            .unwrap_or(self.chains.len());
        self.chains.insert(pos, chain);
    }
}

impl TableEngine for MemoryEngine {
    fn table(&self) -> &str {
        &self.table
    }

    fn chains(&self) -> Vec<String> {
        self.chains.iter().map(|c| c.name.clone()).collect()
    }

    fn is_chain(&self, name: &str) -> bool {
        self.chains.iter().any(|c| c.name == name)
    }

    fn is_builtin(&self, chain: &str) -> bool {
        self.chain(chain).map(Chain::is_builtin).unwrap_or(false)
    }

    fn rules(&self, chain: &str) -> EngineResult<Vec<CompiledRule>> {
        Ok(self.chain(chain)?.rules.clone())
    }

    fn policy(&self, chain: &str) -> EngineResult<Option<ChainPolicy>> {
        let chain = self.chain(chain)?;
        Ok(chain.policy.as_ref().map(|policy| ChainPolicy {
            policy: policy.clone(),
            counters: chain.counters,
        }))
    }

    fn references(&self, chain: &str) -> EngineResult<u32> {
        self.chain(chain)?;
        Ok(self.count_references(chain))
    }

    fn set_policy(&mut self, chain: &str, policy: &str) -> EngineResult<()> {
        let target = self.chain_mut(chain)?;
        if !target.is_builtin() {
            return Err(EngineError::NotBuiltin(chain.to_string()));
        }
        if policy != LABEL_ACCEPT && policy != LABEL_DROP {
            return Err(EngineError::BadPolicy(policy.to_string()));
        }
        target.policy = Some(policy.to_string());
        Ok(())
    }

    fn append(&mut self, chain: &str, rule: &CompiledRule) -> EngineResult<()> {
        self.chain_mut(chain)?.rules.push(rule.clone());
        Ok(())
    }

    fn insert(&mut self, chain: &str, rule: &CompiledRule, index: u32) -> EngineResult<()> {
        let target = self.chain_mut(chain)?;
        let index = index as usize;
        if index > target.rules.len() {
            return Err(EngineError::InsertIndex(index as u32));
        }
        target.rules.insert(index, rule.clone());
        Ok(())
    }

    fn replace(&mut self, chain: &str, rule: &CompiledRule, index: u32) -> EngineResult<()> {
        let target = self.chain_mut(chain)?;
        let slot = target
            .rules
            .get_mut(index as usize)
            .ok_or(EngineError::ReplaceIndex(index))?;
        *slot = rule.clone();
        Ok(())
    }

    fn delete(&mut self, chain: &str, rule: &CompiledRule, mask: &[u8]) -> EngineResult<()> {
        let target = self.chain_mut(chain)?;
        let pos = Self::find_masked(target, rule, mask).ok_or(EngineError::NoMatchingRule)?;
        target.rules.remove(pos);
        Ok(())
    }

    fn delete_num(&mut self, chain: &str, index: u32) -> EngineResult<()> {
        let target = self.chain_mut(chain)?;
        if index as usize >= target.rules.len() {
            return Err(EngineError::DeleteIndex(index));
        }
        target.rules.remove(index as usize);
        Ok(())
    }

    fn check(&self, chain: &str, rule: &CompiledRule, mask: &[u8]) -> EngineResult<()> {
        let target = self.chain(chain)?;
        Self::find_masked(target, rule, mask)
            .map(|_| ())
            .ok_or(EngineError::NoMatchingRule)
    }

    fn create_chain(&mut self, chain: &str) -> EngineResult<()> {
        if self.is_chain(chain) || is_standard_label(chain) {
            return Err(EngineError::ChainExists(chain.to_string()));
        }
        self.insert_user_chain(Chain::user(chain));
        Ok(())
    }

    fn delete_chain(&mut self, chain: &str) -> EngineResult<()> {
        let target = self.chain(chain)?;
        if target.is_builtin() {
            return Err(EngineError::BuiltinChain(chain.to_string()));
        }
        if self.count_references(chain) > 0 {
            return Err(EngineError::ChainReferenced(chain.to_string()));
        }
        if !target.rules.is_empty() {
            return Err(EngineError::ChainNotEmpty(chain.to_string()));
        }
        self.chains.retain(|c| c.name != chain);
        Ok(())
    }

    fn rename_chain(&mut self, old: &str, new: &str) -> EngineResult<()> {
        if self.is_chain(new) || is_standard_label(new) {
            return Err(EngineError::ChainExists(new.to_string()));
        }
        let pos = self
            .chains
            .iter()
            .position(|c| c.name == old)
            .ok_or_else(|| EngineError::NoSuchChain(old.to_string()))?;
        if self.chains[pos].is_builtin() {
            return Err(EngineError::BuiltinChain(old.to_string()));
        }

        let mut chain = self.chains.remove(pos);
        chain.name = new.to_string();
        self.insert_user_chain(chain);

        for rule in self.chains.iter_mut().flat_map(|c| c.rules.iter_mut()) {
            if rule.target_label() == old {
                rule.set_target_label(new);
            }
        }
        Ok(())
    }

    fn flush(&mut self, chain: &str) -> EngineResult<()> {
        self.chain_mut(chain)?.rules.clear();
        Ok(())
    }

    fn zero(&mut self, chain: &str) -> EngineResult<()> {
        let target = self.chain_mut(chain)?;
        target.counters = Counters::default();
        for rule in &mut target.rules {
            rule.set_counters(Counters::default());
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match &self.state_file {
            Some(path) => {
                snapshot::save(path, &self.table, &self.chains)?;
                log::debug!("committed table `{}' to {}", self.table, path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }
}
