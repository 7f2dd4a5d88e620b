//! Resource bundles from `.properties` files.
//!
//! A file `locale/en_US/core.properties` becomes the class
//! `en_US$core_properties`, a subclass of `mx.resources:ResourceBundle` with
//! one public `String` constant per key.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use flexc_core::{AbcClass, CompilerMessage, ConstantValue, Name, QName, Source, Variable, mime};

use crate::abc::{AbcBuilder, ClassSpec, Literal};
use crate::context::CompilationContext;
use crate::frame::{ClassSlot, Frame, MemberSlot, SlotKind};
use crate::passes::classes::{register_cached_classes, register_class};
use crate::subcompiler::{Extension, Extensions, Phase, SubCompiler};
use crate::unit::{CompilationUnit, SourceExt, SyntaxTree};

pub const RESOURCE_BUNDLE_CLASS: &str = "mx.resources:ResourceBundle";

const MIME_TYPES: &[&str] = &[mime::PROPERTIES];

/// A parsed properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesFile {
    pub locale: String,
    pub bundle: String,
    pub entries: IndexMap<String, String>,
}

impl PropertiesFile {
    /// Name of the generated bundle class.
    pub fn class_name(&self) -> QName {
        QName::unnamed(format!("{}${}_properties", self.locale, self.bundle))
    }

    /// Registry key of the bundle, unique per locale.
    pub fn bundle_key(&self) -> String {
        format!("{}${}", self.locale, self.bundle)
    }
}

/// Syntax error in a properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesError {
    /// 1-based line of the logical entry.
    pub line: usize,
    pub reason: String,
}

/// Parse `key=value` entries. `:` and whitespace also separate, `#` and `!`
/// start comments, and a trailing backslash continues the line.
pub fn parse_properties(text: &str) -> Result<IndexMap<String, String>, PropertiesError> {
    let mut entries = IndexMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::from(trimmed);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        let line = index + 1;
        let key = unescape(key).map_err(|reason| PropertiesError { line, reason })?;
        let value = unescape(value).map_err(|reason| PropertiesError { line, reason })?;
        entries.insert(key, value);
    }
    Ok(entries)
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    let rest = rest
        .strip_prefix(['=', ':'])
        .map_or(rest, |r| r.trim_start_matches([' ', '\t', '\x0c']));
    (key, rest)
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .ok_or_else(|| format!("invalid unicode escape '\\u{hex}'"))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("invalid code point U+{code:04X}"))?;
                out.push(ch);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/// Compiles `.properties` files into resource bundle classes.
#[derive(Debug, Default)]
pub struct PropertiesCompiler {
    extensions: Extensions,
}

impl PropertiesCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn file(unit: &CompilationUnit) -> Option<&PropertiesFile> {
        match unit.syntax_tree() {
            Some(SyntaxTree::Properties(file)) => Some(file),
            _ => None,
        }
    }
}

/// Locale of a bundle: the name of the directory holding the file.
fn locale_of(source: &Source, fallback: &str) -> String {
    Path::new(source.parent())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn bundle_key(source: &Source, fallback_locale: &str) -> String {
    format!("{}${}", locale_of(source, fallback_locale), source.short_name())
}

impl SubCompiler for PropertiesCompiler {
    fn name(&self) -> &str {
        "properties"
    }

    fn supported_mime_types(&self) -> &[&'static str] {
        MIME_TYPES
    }

    fn add_extension(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    fn parse1<'u>(
        &mut self,
        source: &Source,
        slot: &'u mut Option<CompilationUnit>,
        cx: &mut CompilationContext,
    ) -> Option<&'u mut CompilationUnit> {
        if slot
            .as_ref()
            .is_some_and(|u| u.has_type_info || u.syntax_tree().is_some())
        {
            return slot.as_mut();
        }

        let reporting = source.name_for_reporting();
        let text = match source.to_byte_array() {
            Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(err) => {
                    cx.diagnostics.log_error(
                        Some(reporting),
                        CompilerMessage::SourceUnreadable {
                            reason: err.to_string(),
                        },
                    );
                    return None;
                }
            },
            Err(err) => {
                cx.diagnostics.log_error(
                    Some(reporting),
                    CompilerMessage::SourceUnreadable {
                        reason: err.to_string(),
                    },
                );
                return None;
            }
        };
        let entries = match parse_properties(&text) {
            Ok(entries) => entries,
            Err(err) => {
                cx.diagnostics.log_error(
                    Some(reporting),
                    CompilerMessage::MalformedProperties {
                        line: err.line,
                        reason: err.reason,
                    },
                );
                return None;
            }
        };

        let file = PropertiesFile {
            locale: locale_of(source, &cx.config.locale),
            bundle: source.short_name().to_string(),
            entries,
        };
        tracing::debug!(bundle = %file.bundle_key(), keys = file.entries.len(), "parsed bundle");

        let unit = slot.get_or_insert_with(|| source.new_compilation_unit(None));
        unit.top_level_definitions = vec![file.class_name()];
        unit.inheritance
            .insert(Name::QName(QName::from_qualified_string(RESOURCE_BUNDLE_CLASS)));
        unit.set_syntax_tree(Some(SyntaxTree::Properties(file)));

        if !self.extensions.run(Phase::Parse1, unit, cx) {
            return None;
        }
        Some(unit)
    }

    fn parse2(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        self.extensions.run(Phase::Parse2, unit, cx);
    }

    fn analyze1(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        let Some(file) = Self::file(unit) else {
            return;
        };

        let mut slot = ClassSlot::new(file.class_name());
        slot.super_name = Some(Name::QName(QName::from_qualified_string(RESOURCE_BUNDLE_CLASS)));
        slot.members = file
            .entries
            .keys()
            .map(|key| MemberSlot {
                name: key.clone(),
                namespace: String::new(),
                is_static: false,
                kind: SlotKind::Const,
                declared_type: Some(Name::QName(QName::unnamed("String"))),
                resolved_type: Some(QName::unnamed("String")),
                trait_ref: None,
            })
            .collect();
        let mut frame = Frame::new();
        frame.insert_class(slot);
        unit.type_info = Some(frame);

        self.extensions.run(Phase::Analyze1, unit, cx);
    }

    fn analyze2(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        self.extensions.run(Phase::Analyze2, unit, cx);
    }

    fn analyze3(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        self.extensions.run(Phase::Analyze3, unit, cx);
    }

    fn analyze4(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if cx.has_errors() {
            return;
        }
        let bundle = bundle_key(unit.source(), &cx.config.locale);
        if let Err(err) = cx.registry.register_resource_bundle(
            bundle,
            unit.top_level_definitions.clone(),
            unit.source(),
        ) {
            cx.diagnostics
                .log_error(Some(unit.source().name_for_reporting()), err.into());
            return;
        }

        let type_table = cx.registry.type_table();
        if unit.has_type_info {
            register_cached_classes(unit, &type_table, cx);
            return;
        }
        let Some(file) = Self::file(unit) else {
            return;
        };

        let name = file.class_name();
        let class_name = name.to_string();
        let mut builder = AbcClass::builder(class_name.clone())
            .super_type(RESOURCE_BUNDLE_CLASS)
            .public(true)
            .source_name(unit.source().name());
        for (key, value) in &file.entries {
            builder = builder.variable(Variable {
                name: key.clone(),
                namespace: String::new(),
                type_name: Some("String".to_string()),
                is_const: true,
                is_static: false,
                value: Some(ConstantValue::String(value.clone())),
                metadata: Vec::new(),
                declaring_class: class_name.clone(),
            });
        }
        let class = Arc::new(builder.build());
        register_class(unit, class, &type_table, cx);

        self.extensions.run(Phase::Analyze4, unit, cx);
    }

    fn generate(&mut self, unit: &mut CompilationUnit, cx: &mut CompilationContext) {
        if unit.has_type_info || cx.has_errors() {
            return;
        }
        if !self.extensions.run(Phase::Generate, unit, cx) {
            return;
        }

        let Some(file) = Self::file(unit) else {
            return;
        };
        let mut spec = ClassSpec::new(&file.class_name().to_string()).extends(RESOURCE_BUNDLE_CLASS);
        for (key, value) in &file.entries {
            spec = spec.constant(key, "String", Literal::String(value.clone()));
        }
        let mut builder = AbcBuilder::new();
        builder.class(spec);
        let bytes = builder.finish();

        unit.scratch.clear();
        if let Some(frame) = unit.type_info.as_mut() {
            frame.clean_slots();
        }
        unit.set_bytecode(bytes);
    }
}
