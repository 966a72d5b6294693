//! `rename` addon: identifier renaming before emit

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::application::addons::CompilerAddon;
use crate::application::context::CompilationContext;
use crate::engine::{CustomTransformers, SyntaxTree, TokenKind};
use crate::error::{TspipeError, TspipeResult};

use super::merged_options;

/// Renames identifiers according to an `identifiers` table.
///
/// All renames apply in a single pass, so swapping two names works.
pub struct RenameAddon {
    name: String,
    options: toml::Table,
}

impl RenameAddon {
    pub fn from_options(name: &str, options: &toml::Table) -> TspipeResult<Self> {
        identifier_table(name, options)?;
        Ok(Self {
            name: name.to_string(),
            options: options.clone(),
        })
    }
}

fn identifier_table(addon: &str, options: &toml::Table) -> TspipeResult<BTreeMap<String, String>> {
    let Some(value) = options.get("identifiers") else {
        return Ok(BTreeMap::new());
    };
    let table = value.as_table().ok_or_else(|| {
        TspipeError::addon(addon, "option 'identifiers' must be a table of strings")
    })?;
    table
        .iter()
        .map(|(from, to)| match to.as_str() {
            Some(to) => Ok((from.clone(), to.to_string())),
            None => Err(TspipeError::addon(
                addon,
                format!("identifiers.{from} must be a string"),
            )),
        })
        .collect()
}

fn rename_all(tree: &mut SyntaxTree, table: &BTreeMap<String, String>) {
    for token in tree.tokens_mut().iter_mut() {
        if token.kind != TokenKind::Identifier {
            continue;
        }
        if let Some(to) = table.get(&token.text) {
            token.text = to.clone();
        }
    }
}

impl CompilerAddon for RenameAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self, context: &mut CompilationContext) -> TspipeResult<()> {
        let options = merged_options(&self.options, context.addon_settings(&self.name));
        let table = identifier_table(&self.name, &options)?;
        if table.is_empty() {
            return Ok(());
        }
        context.register_pre_emit_transformer(CustomTransformers::before(Rc::new(
            move |tree: &mut SyntaxTree| {
                rename_all(tree, &table);
                Ok(())
            },
        )));
        Ok(())
    }
}
