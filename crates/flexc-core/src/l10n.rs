//! Message localization.
//!
//! Templates use `${arg}` placeholders. Lookup order: the configured locale,
//! then `en_US`, then the message's own English text.

use rustc_hash::FxHashMap;

use crate::CompilerMessage;

pub const DEFAULT_LOCALE: &str = "en_US";

const EN_US: &[(&str, &str)] = &[
    ("abc.NoBytecodeAvailable", "No bytecode is available."),
    ("abc.BytecodeDecodingFailed", "Bytecode decoding failed: ${reason}"),
    ("source.Unreadable", "Unable to read source: ${reason}"),
    (
        "styles.StyleConflict",
        "The style '${name}' declared by '${declaredBy}' conflicts with the declaration in '${existing}'.",
    ),
    (
        "registry.ClassRedefined",
        "Class '${name}' from '${source}' replaces the definition from '${previous}'.",
    ),
    ("registry.DuplicateDefinition", "'${name}' is already defined in '${existing}'."),
    ("flow.UnresolvedType", "Type was not found or was not a compile-time constant: ${name}."),
    (
        "constant.TypeMismatch",
        "Constant '${name}' is declared as '${declared}' but initialized with a ${actual} value.",
    ),
    (
        "constant.NegativeUintLiteral",
        "Negative value ${value} will become a large positive number when assigned to uint '${name}'.",
    ),
    (
        "abc.UnsupportedByTargetPlayer",
        "'${name}' requires Flash Player ${required} or later, but the target player is ${target}.",
    ),
    ("scheduler.InheritanceCycle", "Circular inheritance involving ${names}."),
    ("scheduler.UnsupportedMimeType", "No compiler is registered for MIME type '${mime}'."),
    ("properties.Malformed", "Malformed properties entry at line ${line}: ${reason}"),
    (
        "properties.DuplicateBundle",
        "Resource bundle '${name}' is already defined by '${existing}'.",
    ),
    ("extension.Message", "${extension}: ${message}"),
];

/// Localized message templates per locale.
#[derive(Debug, Clone)]
pub struct LocalizationManager {
    locale: String,
    bundles: FxHashMap<String, FxHashMap<String, String>>,
}

impl Default for LocalizationManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

impl LocalizationManager {
    pub fn new(locale: impl Into<String>) -> Self {
        let mut bundles = FxHashMap::default();
        bundles.insert(
            DEFAULT_LOCALE.to_string(),
            EN_US
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        Self {
            locale: locale.into(),
            bundles,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Add or override a template for a locale.
    pub fn add_template(
        &mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) {
        self.bundles
            .entry(locale.into())
            .or_default()
            .insert(key.into(), template.into());
    }

    fn template(&self, key: &str) -> Option<&str> {
        self.bundles
            .get(&self.locale)
            .and_then(|b| b.get(key))
            .or_else(|| self.bundles.get(DEFAULT_LOCALE).and_then(|b| b.get(key)))
            .map(String::as_str)
    }

    pub fn localize(&self, message: &CompilerMessage) -> String {
        match self.template(message.key()) {
            Some(template) => substitute(template, &message.args()),
            None => message.to_string(),
        }
    }
}

/// Replace `${name}` placeholders. Unknown placeholders are left as is.
fn substitute(template: &str, args: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match args.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_bundle_renders() {
        let l10n = LocalizationManager::default();
        let text = l10n.localize(&CompilerMessage::UnsupportedMimeType {
            mime: "image/png".into(),
        });
        assert_eq!(text, "No compiler is registered for MIME type 'image/png'.");
    }

    #[test]
    fn locale_overrides_and_falls_back() {
        let mut l10n = LocalizationManager::new("fr_FR");
        l10n.add_template("fr_FR", "abc.NoBytecodeAvailable", "Aucun bytecode disponible.");

        assert_eq!(
            l10n.localize(&CompilerMessage::NoBytecodeAvailable),
            "Aucun bytecode disponible."
        );
        assert!(l10n
            .localize(&CompilerMessage::UnresolvedType { name: "a:B".into() })
            .ends_with("a:B."));
    }

    #[test]
    fn substitution_edge_cases() {
        let args = vec![("a", "1".to_string())];
        assert_eq!(substitute("${a}-${b}", &args), "1-${b}");
        assert_eq!(substitute("open ${a", &args), "open ${a");
        assert_eq!(substitute("none", &args), "none");
    }
}
