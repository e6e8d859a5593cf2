//! Ordered rewrite rules for stripping leftover underscore prefixes.
//!
//! Each rule pairs a match pattern with a transform and runs over file
//! content in a fixed order: import lists, then destructuring clauses,
//! then member access. Allow-lists keep external package imports and
//! generated database type names untouched.

use regex::{Captures, Match, Regex};
use serde::Serialize;

/// File extensions the rewriter considers source code.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Package specifiers whose imports are never rewritten. Matches the bare
/// specifier and any subpath (`react-dom` covers `react-dom/client`).
pub const EXTERNAL_MODULES: &[&str] = &[
    "react",
    "react-dom",
    "lucide-react",
    "sonner",
    "@tanstack/react-query",
    "@tanstack/react-router",
    "date-fns",
    "react-hook-form",
    "zod",
    "@supabase/supabase-js",
    "vitest",
];

/// Generated database type names that keep their spelling everywhere.
pub const RESERVED_NAMES: &[&str] = &[
    "Json",
    "Database",
    "Tables",
    "TablesInsert",
    "TablesUpdate",
    "Enums",
    "CompositeTypes",
];

/// Lowercase prefixes that mark an import as callable (hooks, helpers).
pub const CALLABLE_PREFIXES: &[&str] = &["use", "parse", "format", "generate", "get"];

pub fn is_external_module(specifier: &str) -> bool {
    EXTERNAL_MODULES.iter().any(|module| {
        specifier == *module || specifier.starts_with(&format!("{}/", module))
    })
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Which rule produced a rename. Serialized into per-file reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ImportList,
    DestructuringList,
    MemberAccess,
}

/// A single applied rename.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameChange {
    pub from: String,
    pub to: String,
    pub rule: RuleKind,
}

/// Rename totals broken down by rule.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCounts {
    pub import_list: usize,
    pub destructuring_list: usize,
    pub member_access: usize,
}

impl RuleCounts {
    pub fn tally(changes: &[NameChange]) -> Self {
        let mut counts = Self::default();
        for change in changes {
            match change.rule {
                RuleKind::ImportList => counts.import_list += 1,
                RuleKind::DestructuringList => counts.destructuring_list += 1,
                RuleKind::MemberAccess => counts.member_access += 1,
            }
        }
        counts
    }

    pub fn merge(&mut self, other: &RuleCounts) {
        self.import_list += other.import_list;
        self.destructuring_list += other.destructuring_list;
        self.member_access += other.member_access;
    }

    pub fn total(&self) -> usize {
        self.import_list + self.destructuring_list + self.member_access
    }
}

type TransformFn = fn(&Captures, RuleKind, &mut Vec<NameChange>) -> String;

struct Rule {
    kind: RuleKind,
    pattern: Regex,
    transform: TransformFn,
}

impl Rule {
    fn apply(&self, content: &str, changes: &mut Vec<NameChange>) -> String {
        let kind = self.kind;
        let transform = self.transform;
        self.pattern
            .replace_all(content, |caps: &Captures| transform(caps, kind, changes))
            .into_owned()
    }
}

/// The ordered rule table. Rules run top to bottom; each sees the
/// previous rule's output.
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Rule {
                    kind: RuleKind::ImportList,
                    pattern: Regex::new(
                        r#"\bimport\s+(type\s+)?\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#,
                    )
                    .unwrap(),
                    transform: rewrite_import_list,
                },
                Rule {
                    kind: RuleKind::DestructuringList,
                    pattern: Regex::new(r"\b(const|let|var)\s*\{([^}]*)\}\s*=").unwrap(),
                    transform: rewrite_destructuring_list,
                },
                Rule {
                    kind: RuleKind::MemberAccess,
                    pattern: Regex::new(r"(\.\.)?\.(_[A-Za-z][\w$]*)").unwrap(),
                    transform: rewrite_member_access,
                },
            ],
        }
    }

    /// Runs every rule over `content` and returns the rewritten text plus
    /// the renames that were applied. Content with nothing to rewrite
    /// comes back byte-identical.
    pub fn apply(&self, content: &str) -> (String, Vec<NameChange>) {
        let mut changes = Vec::new();
        let mut current = content.to_string();
        for rule in &self.rules {
            current = rule.apply(&current, &mut changes);
        }
        (current, changes)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces `inner` within `whole`, keeping the surrounding text verbatim.
fn splice(whole: Match, inner: Match, replacement: &str) -> String {
    let base = whole.start();
    let text = whole.as_str();
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..inner.start() - base]);
    out.push_str(replacement);
    out.push_str(&text[inner.end() - base..]);
    out
}

fn rewrite_import_list(caps: &Captures, kind: RuleKind, changes: &mut Vec<NameChange>) -> String {
    let whole = caps.get(0).unwrap();
    let specifier = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    if is_external_module(specifier) {
        return whole.as_str().to_string();
    }

    let blob = caps.get(2).unwrap();
    let rewritten = blob
        .as_str()
        .split(',')
        .map(|piece| rewrite_import_piece(piece, kind, changes))
        .collect::<Vec<_>>()
        .join(",");

    splice(whole, blob, &rewritten)
}

/// One comma-separated entry of an import list. Whitespace around the
/// entry is preserved; entries that are not a plain underscore-prefixed
/// name (with optional `type` modifier and `as` alias) pass through.
fn rewrite_import_piece(piece: &str, kind: RuleKind, changes: &mut Vec<NameChange>) -> String {
    let core = piece.trim();
    let entry = Regex::new(r"^(type\s+)?(_[A-Za-z][\w$]*)(\s+as\s+[A-Za-z_$][\w$]*)?$").unwrap();

    let Some(caps) = entry.captures(core) else {
        return piece.to_string();
    };

    let name = caps.get(2).unwrap().as_str();
    let bare = &name[1..];
    if !import_name_strips(bare) {
        return piece.to_string();
    }

    changes.push(NameChange {
        from: name.to_string(),
        to: bare.to_string(),
        rule: kind,
    });

    let rewritten_core = format!(
        "{}{}{}",
        caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        bare,
        caps.get(3).map(|m| m.as_str()).unwrap_or_default(),
    );

    let lead = piece.len() - piece.trim_start().len();
    format!(
        "{}{}{}",
        &piece[..lead],
        rewritten_core,
        &piece[lead + core.len()..]
    )
}

/// Imports strip their underscore when the remainder reads as a type
/// (uppercase-led) or as a callable (known prefix followed by an
/// uppercase letter or the end of the name, so `_user` stays put).
fn import_name_strips(bare: &str) -> bool {
    if is_reserved(bare) {
        return false;
    }
    if bare.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return true;
    }
    CALLABLE_PREFIXES.iter().any(|prefix| {
        bare.strip_prefix(prefix).is_some_and(|rest| {
            rest.chars().next().is_none_or(|c| c.is_ascii_uppercase())
        })
    })
}

fn rewrite_destructuring_list(
    caps: &Captures,
    kind: RuleKind,
    changes: &mut Vec<NameChange>,
) -> String {
    let whole = caps.get(0).unwrap();
    let blob = caps.get(2).unwrap();
    let rewritten = blob
        .as_str()
        .split(',')
        .map(|piece| rewrite_destructuring_piece(piece, kind, changes))
        .collect::<Vec<_>>()
        .join(",");

    splice(whole, blob, &rewritten)
}

/// Destructured bindings strip lowercase-led names only; uppercase-led
/// names stay (they are usually deliberate type-shaped aliases). Renames,
/// defaults, and nested patterns pass through untouched.
fn rewrite_destructuring_piece(
    piece: &str,
    kind: RuleKind,
    changes: &mut Vec<NameChange>,
) -> String {
    let core = piece.trim();
    let entry = Regex::new(r"^_[a-z][\w$]*$").unwrap();
    if !entry.is_match(core) {
        return piece.to_string();
    }

    let bare = &core[1..];
    if is_reserved(bare) {
        return piece.to_string();
    }

    changes.push(NameChange {
        from: core.to_string(),
        to: bare.to_string(),
        rule: kind,
    });

    let lead = piece.len() - piece.trim_start().len();
    format!("{}{}{}", &piece[..lead], bare, &piece[lead + core.len()..])
}

/// Member access strips both cases (`obj._error`, `obj._SomeType`). The
/// leading group catches spread syntax so `..._rest` is left alone.
fn rewrite_member_access(caps: &Captures, kind: RuleKind, changes: &mut Vec<NameChange>) -> String {
    let whole = caps.get(0).unwrap().as_str();
    if caps.get(1).is_some() {
        return whole.to_string();
    }

    let name = caps.get(2).unwrap().as_str();
    let bare = &name[1..];
    if is_reserved(bare) {
        return whole.to_string();
    }

    changes.push(NameChange {
        from: name.to_string(),
        to: bare.to_string(),
        rule: kind,
    });

    format!(".{}", bare)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(content: &str) -> (String, Vec<NameChange>) {
        Ruleset::new().apply(content)
    }

    #[test]
    fn import_strips_uppercase_and_callable_names() {
        let (out, changes) =
            apply("import { _Foo, bar, _useThing as Thing2 } from './local';\n");
        assert_eq!(out, "import { Foo, bar, useThing as Thing2 } from './local';\n");
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.rule == RuleKind::ImportList));
    }

    #[test]
    fn import_keeps_lowercase_non_callable_names() {
        let source = "import { _user, _helper } from './local';\n";
        let (out, changes) = apply(source);
        assert_eq!(out, source);
        assert!(changes.is_empty());
    }

    #[test]
    fn import_callable_prefix_must_be_followed_by_uppercase() {
        let (out, _) = apply("import { _useState, _username } from './local';\n");
        assert_eq!(out, "import { useState, _username } from './local';\n");
    }

    #[test]
    fn import_external_module_is_untouched() {
        let source = "import { _Fragment } from 'react';\n";
        let (out, changes) = apply(source);
        assert_eq!(out, source);
        assert!(changes.is_empty());
    }

    #[test]
    fn import_external_module_subpath_is_untouched() {
        let source = "import { _Root } from 'react-dom/client';\n";
        let (out, _) = apply(source);
        assert_eq!(out, source);
    }

    #[test]
    fn import_scoped_external_module_is_untouched() {
        let source = "import { _QueryClient } from '@tanstack/react-query';\n";
        let (out, _) = apply(source);
        assert_eq!(out, source);
    }

    #[test]
    fn import_reserved_name_is_untouched() {
        let source = "import { _Database, _Json } from './types';\n";
        let (out, _) = apply(source);
        assert_eq!(out, source);
    }

    #[test]
    fn type_only_import_is_rewritten() {
        let (out, _) = apply("import type { _Props } from './types';\n");
        assert_eq!(out, "import type { Props } from './types';\n");
    }

    #[test]
    fn inline_type_modifier_is_preserved() {
        let (out, _) = apply("import { type _Props, _Config } from './types';\n");
        assert_eq!(out, "import { type Props, Config } from './types';\n");
    }

    #[test]
    fn multiline_import_list_is_rewritten() {
        let source = "import {\n  _Foo,\n  bar,\n} from './local';\n";
        let (out, _) = apply(source);
        assert_eq!(out, "import {\n  Foo,\n  bar,\n} from './local';\n");
    }

    #[test]
    fn destructuring_strips_lowercase_only() {
        let (out, changes) = apply("const { _value, _Type } = props;\n");
        assert_eq!(out, "const { value, _Type } = props;\n");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].rule, RuleKind::DestructuringList);
    }

    #[test]
    fn destructuring_keeps_nested_patterns() {
        let source = "const { a: { _b } } = props;\n";
        let (out, _) = apply(source);
        // Nested patterns never match the clause pattern; the inner name
        // is the member rule's problem only when accessed with a dot.
        assert_eq!(out, source);
    }

    #[test]
    fn destructuring_keeps_object_literals() {
        let source = "const x = { _foo: 1 };\n";
        let (out, changes) = apply(source);
        assert_eq!(out, source);
        assert!(changes.is_empty());
    }

    #[test]
    fn member_access_strips_both_cases() {
        let (out, changes) = apply("const a = obj._error;\nconst b = obj._SomeType;\n");
        assert_eq!(out, "const a = obj.error;\nconst b = obj.SomeType;\n");
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.rule == RuleKind::MemberAccess));
    }

    #[test]
    fn member_access_keeps_spread_rest() {
        let source = "const clone = { ..._rest };\n";
        let (out, changes) = apply(source);
        assert_eq!(out, source);
        assert!(changes.is_empty());
    }

    #[test]
    fn member_access_handles_optional_chaining() {
        let (out, _) = apply("const v = obj?._value;\n");
        assert_eq!(out, "const v = obj?.value;\n");
    }

    #[test]
    fn member_access_keeps_reserved_names() {
        let source = "const t = schema._Tables;\n";
        let (out, _) = apply(source);
        assert_eq!(out, source);
    }

    #[test]
    fn unchanged_content_is_byte_identical() {
        let source = "const plain = compute();\nexport default plain;\n";
        let (out, changes) = apply(source);
        assert_eq!(out, source);
        assert!(changes.is_empty());
    }

    #[test]
    fn rewriting_is_idempotent() {
        let source = "import { _Foo } from './x';\nconst { _val } = props;\nobj._Thing;\n";
        let (first, first_changes) = apply(source);
        assert!(!first_changes.is_empty());

        let (second, second_changes) = apply(&first);
        assert_eq!(second, first);
        assert!(second_changes.is_empty());
    }

    #[test]
    fn counts_tally_per_rule() {
        let source = "import { _Foo } from './x';\nconst { _val } = props;\nobj._err;\nobj._Type;\n";
        let (_, changes) = apply(source);
        let counts = RuleCounts::tally(&changes);
        assert_eq!(counts.import_list, 1);
        assert_eq!(counts.destructuring_list, 1);
        assert_eq!(counts.member_access, 2);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn external_module_matching_covers_subpaths_only() {
        assert!(is_external_module("react"));
        assert!(is_external_module("react-dom/client"));
        assert!(!is_external_module("react-hot-toast"));
        assert!(!is_external_module("./react"));
    }
}
