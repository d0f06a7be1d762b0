use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Block, ConfigurationError};
use crate::ast::{is_identifier, Line};

/// Names the rewriter uses when it synthesises a hook call, and under which the
/// executor binds the hook, the log sequence and the persistence resource.
///
/// A synthesised call reads
/// `log_variable(val=<value>, name="<binding>", lineno=<line>, db=db)`:
/// the resource keyword and the resource binding share one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookBindings {
    /// Namespace name of the logging hook
    pub hook: String,
    /// Namespace name of the log sequence
    pub log: String,
    /// Keyword carrying the captured value
    pub value: String,
    /// Keyword carrying the binding name
    pub name: String,
    /// Keyword carrying the source line
    pub line: String,
    /// Keyword and namespace name of the persistence resource
    pub resource: String,
}

impl Default for HookBindings {
    fn default() -> Self {
        Self {
            hook: "log_variable".to_string(),
            log: "log".to_string(),
            value: "val".to_string(),
            name: "name".to_string(),
            line: "lineno".to_string(),
            resource: "db".to_string(),
        }
    }
}

impl HookBindings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        // Namespace names and keywords are separate groups; `resource` is in both
        let namespace = [&self.hook, &self.log, &self.resource];
        let keywords = [&self.value, &self.name, &self.line, &self.resource];
        for group in [&namespace[..], &keywords[..]] {
            let mut seen = BTreeSet::new();
            for name in group {
                if !is_identifier(name) {
                    return Err(ConfigurationError::InvalidBinding {
                        name: name.to_string(),
                    });
                }
                if !seen.insert(name.as_str()) {
                    return Err(ConfigurationError::DuplicateBinding {
                        name: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Active selectors for one instrumentation run.
///
/// Blocks may overlap or repeat; a line matches when any block contains it.
/// Modifier names collapse duplicates. Once [`freeze`](Self::freeze) is
/// called, further additions fail with [`ConfigurationError::Frozen`].
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    blocks: Vec<Block>,
    modifier_names: BTreeSet<String>,
    hook_bindings: HookBindings,
    frozen: bool,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(hook_bindings: HookBindings) -> Result<Self, ConfigurationError> {
        hook_bindings.validate()?;
        Ok(Self {
            hook_bindings,
            ..Self::default()
        })
    }

    pub fn add_blocks(
        &mut self,
        blocks: impl IntoIterator<Item = Block>,
    ) -> Result<(), ConfigurationError> {
        self.ensure_open()?;
        self.blocks.extend(blocks);
        Ok(())
    }

    pub fn add_modifier_names<S: AsRef<str>>(
        &mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<(), ConfigurationError> {
        self.ensure_open()?;
        // Validate everything first so a bad name leaves the set untouched
        let names = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                if is_identifier(name) {
                    Ok(name.to_string())
                } else {
                    Err(ConfigurationError::InvalidModifier {
                        name: name.to_string(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.modifier_names.extend(names);
        Ok(())
    }

    pub fn matches_block(&self, line: Line) -> bool {
        self.blocks.iter().any(|block| block.contains(line))
    }

    pub fn matches_modifier(&self, call_name: &str) -> bool {
        self.modifier_names.contains(call_name)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn modifier_names(&self) -> impl Iterator<Item = &str> {
        self.modifier_names.iter().map(String::as_str)
    }

    pub fn hook_bindings(&self) -> &HookBindings {
        &self.hook_bindings
    }

    /// True when no selector can match anything
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.modifier_names.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn ensure_open(&self) -> Result<(), ConfigurationError> {
        if self.frozen {
            Err(ConfigurationError::Frozen)
        } else {
            Ok(())
        }
    }
}
