//! `banner` addon: prepends a comment to every source file

use std::path::Path;
use std::rc::Rc;

use crate::application::addons::CompilerAddon;
use crate::application::context::CompilationContext;
use crate::engine::is_source_file;
use crate::error::TspipeResult;

use super::{merged_options, string_option};

const DEFAULT_TEXT: &str = "Generated by tspipe ({target})";

pub struct BannerAddon {
    name: String,
    options: toml::Table,
}

impl BannerAddon {
    pub fn from_options(name: &str, options: &toml::Table) -> TspipeResult<Self> {
        string_option(name, options, "text")?;
        Ok(Self {
            name: name.to_string(),
            options: options.clone(),
        })
    }
}

/// `// <text>` line with `{target}` substituted
pub(crate) fn banner_line(template: &str, target: &str) -> String {
    format!("// {}\n", template.replace("{target}", target))
}

impl CompilerAddon for BannerAddon {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self, context: &mut CompilationContext) -> TspipeResult<()> {
        let options = merged_options(&self.options, context.addon_settings(&self.name));
        let template =
            string_option(&self.name, &options, "text")?.unwrap_or_else(|| DEFAULT_TEXT.to_string());
        let line = banner_line(&template, context.target());

        context.register_processor(Rc::new(
            move |_: &CompilationContext, path: &Path, source: String| -> TspipeResult<String> {
                if !is_source_file(path) {
                    return Ok(source);
                }
                Ok(format!("{line}{source}"))
            },
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_target() {
        assert_eq!(banner_line("built for {target}", "web"), "// built for web\n");
    }

    #[test]
    fn rejects_non_string_text() {
        let options: toml::Table = toml::from_str("text = 3").unwrap();
        assert!(BannerAddon::from_options("banner", &options).is_err());
    }
}
