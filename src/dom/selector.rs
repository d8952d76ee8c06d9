//! # Selector Engine
//!
//! The subset of CSS selectors the directive pack actually uses: tag,
//! `#id`, `.class`, `[attr]`, `[attr="value"]`, compounds of those, the
//! descendant combinator (whitespace), comma groups, and `*`. Matching is
//! right-to-left: the last compound must match the candidate, earlier
//! compounds must match some ancestor chain.

use std::collections::HashMap;

use thiserror::Error;

use super::document::NodeId;

#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated attribute selector")]
    UnterminatedAttr,
}

/// Borrowed view of one element, provided by the document during matching.
pub struct NodeView<'a> {
    pub tag: &'a str,
    pub classes: &'a [String],
    pub attrs: &'a HashMap<String, String>,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrTest {
    Present(String),
    Equals(String, String),
}

/// One compound selector: every listed condition must hold on a single
/// element. An empty compound (bare `*`) matches anything.
#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, view: &NodeView<'_>) -> bool {
        if let Some(tag) = &self.tag
            && tag != view.tag
        {
            return false;
        }
        for id in &self.ids {
            if view.attrs.get("id") != Some(id) {
                return false;
            }
        }
        for class in &self.classes {
            if !view.classes.iter().any(|c| c == class) {
                return false;
            }
        }
        for attr in &self.attrs {
            match attr {
                AttrTest::Present(name) => {
                    if !view.attrs.contains_key(name) {
                        return false;
                    }
                }
                AttrTest::Equals(name, value) => {
                    if view.attrs.get(name) != Some(value) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// A descendant chain of compounds, e.g. `#main button.buy`.
#[derive(Debug, Clone, PartialEq)]
struct Chain {
    compounds: Vec<Compound>,
}

/// A parsed selector list (comma groups).
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    chains: Vec<Chain>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Selector, SelectorError> {
        let mut chains = Vec::new();
        for group in input.split(',') {
            let group = group.trim();
            if group.is_empty() {
                return Err(SelectorError::Empty);
            }
            let mut compounds = Vec::new();
            for word in group.split_whitespace() {
                compounds.push(parse_compound(word)?);
            }
            chains.push(Chain { compounds });
        }
        if chains.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Selector { chains })
    }

    /// True when `node` matches any group. `view` resolves node data and
    /// parents on demand, so only the ancestor chain is ever inspected.
    pub fn matches<'a, F>(&self, view: F, node: NodeId) -> bool
    where
        F: Fn(NodeId) -> NodeView<'a>,
    {
        self.chains.iter().any(|chain| {
            let (last, ancestors) = match chain.compounds.split_last() {
                Some(split) => split,
                None => return false,
            };
            let node_view = view(node);
            if !last.matches(&node_view) {
                return false;
            }
            // Work upward through ancestors, consuming compounds right to
            // left. Each remaining compound may match any strict ancestor.
            let mut remaining = ancestors.iter().rev();
            let mut wanted = remaining.next();
            let mut cursor = node_view.parent;
            while let Some(compound) = wanted {
                let id = match cursor {
                    Some(id) => id,
                    None => return false,
                };
                let candidate = view(id);
                cursor = candidate.parent;
                if compound.matches(&candidate) {
                    wanted = remaining.next();
                }
            }
            true
        })
    }
}

fn parse_compound(word: &str) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    let chars: Vec<char> = word.chars().collect();
    let mut pos = 0;

    // Optional leading tag or universal.
    if pos < chars.len() && chars[pos] == '*' {
        pos += 1;
    } else if pos < chars.len() && is_ident_start(chars[pos]) {
        let start = pos;
        while pos < chars.len() && is_ident_char(chars[pos]) {
            pos += 1;
        }
        compound.tag = Some(chars[start..pos].iter().collect());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let (ident, next) = take_ident(&chars, pos)?;
                compound.ids.push(ident);
                pos = next;
            }
            '.' => {
                pos += 1;
                let (ident, next) = take_ident(&chars, pos)?;
                compound.classes.push(ident);
                pos = next;
            }
            '[' => {
                pos += 1;
                let (name, next) = take_ident(&chars, pos)?;
                pos = next;
                match chars.get(pos) {
                    Some(']') => {
                        compound.attrs.push(AttrTest::Present(name));
                        pos += 1;
                    }
                    Some('=') => {
                        pos += 1;
                        let quoted = chars.get(pos) == Some(&'"');
                        if quoted {
                            pos += 1;
                        }
                        let start = pos;
                        while pos < chars.len()
                            && chars[pos] != ']'
                            && !(quoted && chars[pos] == '"')
                        {
                            pos += 1;
                        }
                        let value: String = chars[start..pos].iter().collect();
                        if quoted {
                            if chars.get(pos) != Some(&'"') {
                                return Err(SelectorError::UnterminatedAttr);
                            }
                            pos += 1;
                        }
                        if chars.get(pos) != Some(&']') {
                            return Err(SelectorError::UnterminatedAttr);
                        }
                        pos += 1;
                        compound.attrs.push(AttrTest::Equals(name, value));
                    }
                    _ => return Err(SelectorError::UnterminatedAttr),
                }
            }
            other => return Err(SelectorError::UnexpectedChar(other, pos)),
        }
    }

    Ok(compound)
}

fn take_ident(chars: &[char], mut pos: usize) -> Result<(String, usize), SelectorError> {
    let start = pos;
    while pos < chars.len() && is_ident_char(chars[pos]) {
        pos += 1;
    }
    if pos == start {
        let found = chars.get(pos).copied().unwrap_or(' ');
        return Err(SelectorError::UnexpectedChar(found, pos));
    }
    Ok((chars[start..pos].iter().collect(), pos))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

// =====================================================================
// Tests
// =====================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeNode {
        tag: &'static str,
        classes: Vec<String>,
        attrs: HashMap<String, String>,
        parent: Option<NodeId>,
    }

    fn node(tag: &'static str, parent: Option<usize>) -> FakeNode {
        FakeNode {
            tag,
            classes: Vec::new(),
            attrs: HashMap::new(),
            parent: parent.map(NodeId),
        }
    }

    fn matches(sel: &str, nodes: &[FakeNode], target: usize) -> bool {
        let sel = Selector::parse(sel).unwrap();
        sel.matches(
            |id| {
                let n = &nodes[id.0];
                NodeView {
                    tag: n.tag,
                    classes: &n.classes,
                    attrs: &n.attrs,
                    parent: n.parent,
                }
            },
            NodeId(target),
        )
    }

    #[test]
    fn test_tag_id_class_attr() {
        let mut button = node("button", None);
        button.classes.push("buy".into());
        button.attrs.insert("id".into(), "go".into());
        button.attrs.insert("data-kind".into(), "basket".into());
        let nodes = vec![button];
        assert!(matches("button", &nodes, 0));
        assert!(matches("#go", &nodes, 0));
        assert!(matches(".buy", &nodes, 0));
        assert!(matches("[data-kind]", &nodes, 0));
        assert!(matches("[data-kind=\"basket\"]", &nodes, 0));
        assert!(matches("button.buy[data-kind=basket]", &nodes, 0));
        assert!(!matches("a", &nodes, 0));
        assert!(!matches(".sell", &nodes, 0));
        assert!(!matches("[data-kind=\"coupon\"]", &nodes, 0));
    }

    #[test]
    fn test_descendant_combinator() {
        // body > div#main > form > button
        let mut main = node("div", Some(0));
        main.attrs.insert("id".into(), "main".into());
        let nodes = vec![
            node("body", None),
            main,
            node("form", Some(1)),
            node("button", Some(2)),
        ];
        assert!(matches("#main button", &nodes, 3));
        assert!(matches("body form button", &nodes, 3));
        assert!(!matches("form #main button", &nodes, 3));
        assert!(!matches("#other button", &nodes, 3));
    }

    #[test]
    fn test_comma_groups_and_star() {
        let nodes = vec![node("body", None), node("select", Some(0))];
        assert!(matches("input, select, textarea", &nodes, 1));
        assert!(matches("*", &nodes, 1));
        assert!(!matches("input, textarea", &nodes, 1));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse(""), Err(SelectorError::Empty));
        assert_eq!(Selector::parse("a, ,b"), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("[data-x"),
            Err(SelectorError::UnterminatedAttr)
        ));
        assert!(matches!(
            Selector::parse("di%v"),
            Err(SelectorError::UnexpectedChar('%', _))
        ));
    }
}
