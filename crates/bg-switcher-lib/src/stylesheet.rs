// SPDX-License-Identifier: MPL-2.0

//! Just enough CSS reading to detect a stylesheet written for the switcher and
//! to resolve the custom properties its per-background rules declare.
//!
//! Tokenizing and error recovery come from `cssparser`; only style rules are
//! kept, with selectors and declaration values as written in the source.

use std::path::Path;

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser, Token,
    parse_important,
};

use crate::markup::PLUGIN_CLASS;

/// A qualified rule: selector list plus its declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub selector: String,
    pub declarations: Vec<(String, String)>,
}

impl Rule {
    /// Whether any selector in the list targets `class`, either alone
    /// (`.bg-3`) or compounded onto a root element (`body.bg-3`).
    pub fn targets_class(&self, class: &str) -> bool {
        let suffix = format!(".{class}");
        self.selectors().any(|selector| {
            selector
                .strip_suffix(suffix.as_str())
                .is_some_and(|head| head.is_empty() || is_root_selector(head))
        })
    }

    /// Whether the rule applies to the document root regardless of class.
    pub fn targets_root(&self) -> bool {
        self.selectors().any(is_root_selector)
    }

    pub fn declaration(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }

    fn selectors(&self) -> impl Iterator<Item = &str> {
        self.selector.split(',').map(str::trim)
    }
}

fn is_root_selector(selector: &str) -> bool {
    matches!(selector, ":root" | "html" | "body")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub href: Option<String>,
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    pub fn parse(source: &str) -> Self {
        let mut input = ParserInput::new(source);
        let mut parser = Parser::new(&mut input);
        let rules = collect_rules(&mut parser, &mut RuleCollector);
        Self { href: None, rules }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::parse(&source).with_href(path.display().to_string()))
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// True if this sheet was written for the switcher: a rule mentions the
    /// wrapper class, or the sheet was linked under the component's name.
    pub fn references_switcher(&self) -> bool {
        let marker = format!(".{PLUGIN_CLASS}");
        self.rules.iter().any(|rule| rule.selector.contains(&marker))
            || self
                .href
                .as_deref()
                .is_some_and(|href| href.contains(PLUGIN_CLASS))
    }
}

pub fn references_switcher(sheets: &[Stylesheet]) -> bool {
    sheets.iter().any(Stylesheet::references_switcher)
}

/// Collects style rules, descending into conditional group rules.
struct RuleCollector;

impl<'i> QualifiedRuleParser<'i> for RuleCollector {
    type Prelude = String;
    type QualifiedRule = Vec<Rule>;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let start = input.position();
        while input.next().is_ok() {}
        Ok(input.slice_from(start).trim().to_string())
    }

    fn parse_block<'t>(
        &mut self,
        selector: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut parser = DeclarationCollector;
        let body: RuleBodyParser<'_, '_, '_, _, Declaration, ()> =
            RuleBodyParser::new(input, &mut parser);
        let declarations = body
            .filter_map(|declaration| match declaration {
                Ok(declaration) => Some(declaration),
                Err((_, text)) => {
                    tracing::trace!(text, "skipping invalid declaration");
                    None
                }
            })
            .collect();
        Ok(vec![Rule {
            selector,
            declarations,
        }])
    }
}

impl<'i> AtRuleParser<'i> for RuleCollector {
    type Prelude = ();
    type AtRule = Vec<Rule>;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        if GROUP_RULES.iter().any(|group| name.eq_ignore_ascii_case(group)) {
            while input.next().is_ok() {}
            Ok(())
        } else {
            Err(input.new_custom_error(()))
        }
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        Ok(collect_rules(input, self))
    }
}

/// At-rules whose block is itself a list of style rules.
const GROUP_RULES: [&str; 4] = ["media", "supports", "layer", "container"];

type Declaration = (String, String);

/// Keeps each declaration's value as written, minus `!important`.
struct DeclarationCollector;

impl<'i> DeclarationParser<'i> for DeclarationCollector {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        input.skip_whitespace();
        let start = input.position();
        let mut end = start;
        while !input.is_exhausted() {
            if input.try_parse(parse_important).is_ok() {
                break;
            }
            let opens_block = matches!(
                input.next()?,
                Token::Function(_)
                    | Token::ParenthesisBlock
                    | Token::SquareBracketBlock
                    | Token::CurlyBracketBlock
            );
            if opens_block {
                input.parse_nested_block(|block| {
                    while block.next().is_ok() {}
                    Ok::<_, ParseError<'i, ()>>(())
                })?;
            }
            end = input.position();
        }

        let value = input.slice(start..end).trim();
        if value.is_empty() && !name.starts_with("--") {
            return Err(input.new_custom_error(()));
        }
        Ok((name.to_string(), value.to_string()))
    }
}

impl<'i> AtRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationCollector {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for DeclarationCollector {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

fn collect_rules<'i>(input: &mut Parser<'i, '_>, collector: &mut RuleCollector) -> Vec<Rule> {
    let mut rules = Vec::new();
    for rule in StyleSheetParser::new(input, collector) {
        match rule {
            Ok(parsed) => rules.extend(parsed),
            Err((err, text)) => tracing::debug!(
                line = err.location.line + 1,
                column = err.location.column,
                text,
                "skipping css rule"
            ),
        }
    }
    rules
}
