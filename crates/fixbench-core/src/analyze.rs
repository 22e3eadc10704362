//! Lightweight structure extraction for Python candidates.
//!
//! Line-oriented, not a parser: good enough to tell a caller which functions
//! and imports a candidate has. Never fails; input it cannot make sense of
//! yields fewer entries.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A function definition found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// 1-based line of the `def` keyword.
    pub line_start: usize,
    /// 1-based last line of the body.
    pub line_end: usize,
    /// Positional-or-keyword parameter names, in order.
    pub args: Vec<String>,
    /// Source text of lines `line_start..=line_end`, joined with `\n`.
    pub code: String,
}

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<indent>[ \t]*)(?:async[ \t]+)?def[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*\(")
            .expect("static regex")
    })
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ \t]*import[ \t]+(?P<names>.+)$").expect("static regex"))
}

fn from_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[ \t]*from[ \t]+(?P<module>[\w.]+)[ \t]+import[ \t]+(?P<names>.+)$")
            .expect("static regex")
    })
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 8 } else { 1 })
        .sum()
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Collect text after an opening bracket until the matching close, across lines.
/// Returns the enclosed text and the index of the line holding the close.
fn collect_bracketed(lines: &[&str], start_line: usize, start_col: usize) -> (String, usize) {
    let mut depth = 1usize;
    let mut text = String::new();
    for (idx, line) in lines.iter().enumerate().skip(start_line) {
        let from = if idx == start_line { start_col } else { 0 };
        for c in line[from..].chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return (text, idx);
                    }
                }
                _ => {}
            }
            text.push(c);
        }
        text.push('\n');
    }
    (text, lines.len().saturating_sub(1))
}

/// Split on commas that are not nested inside brackets.
fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn parameter_names(params: &str) -> Vec<String> {
    let mut names = Vec::new();
    for raw in split_top_level(params) {
        let param = raw.trim();
        if param.is_empty() || param == "/" {
            continue;
        }
        // `*`, `*args` and `**kwargs` end the positional-or-keyword section.
        if param.starts_with('*') {
            break;
        }
        let name = param
            .split(|c: char| c == ':' || c == '=')
            .next()
            .unwrap_or("")
            .trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    names
}

/// Find every `def` / `async def` in `source`, including nested ones.
pub fn extract_functions(source: &str) -> Vec<FunctionInfo> {
    let lines: Vec<&str> = source.lines().collect();
    let mut functions = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = def_re().captures(line) else {
            continue;
        };
        let indent = indent_width(&caps["indent"]);
        let open = caps.get(0).map(|m| m.end()).unwrap_or(line.len());
        let (params, sig_end) = collect_bracketed(&lines, idx, open);

        let mut line_end = sig_end;
        for (body_idx, body_line) in lines.iter().enumerate().skip(sig_end + 1) {
            if is_blank_or_comment(body_line) {
                continue;
            }
            if indent_width(body_line) <= indent {
                break;
            }
            line_end = body_idx;
        }

        functions.push(FunctionInfo {
            name: caps["name"].to_string(),
            line_start: idx + 1,
            line_end: line_end + 1,
            args: parameter_names(&params),
            code: lines[idx..=line_end].join("\n"),
        });
    }
    functions
}

fn strip_alias(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or("")
}

/// List imports as normalized `import x` / `from m import n` strings, one per name.
pub fn extract_imports(source: &str) -> Vec<String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut imports = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        if let Some(caps) = from_import_re().captures(line) {
            let module = caps["module"].to_string();
            let names_match = caps.name("names").map(|m| (m.start(), m.as_str()));
            let (names, last) = match names_match {
                Some((start, text)) if text.trim_start().starts_with('(') => {
                    let open = start + text.find('(').unwrap_or(0) + 1;
                    collect_bracketed(&lines, idx, open)
                }
                Some((_, text)) => (text.to_string(), idx),
                None => (String::new(), idx),
            };
            for name in names.split(',') {
                let name = strip_alias(name.split('#').next().unwrap_or("").trim());
                if !name.is_empty() {
                    imports.push(format!("from {module} import {name}"));
                }
            }
            idx = last + 1;
            continue;
        }
        if let Some(caps) = import_re().captures(line) {
            for name in caps["names"].split('#').next().unwrap_or("").split(',') {
                let name = strip_alias(name.trim());
                if !name.is_empty() {
                    imports.push(format!("import {name}"));
                }
            }
        }
        idx += 1;
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import os, sys as system
from typing import (
    List,
    Optional as Opt,
)
from . import helpers

def divide(a, b: int = 2):
    # comment inside
    if b == 0:
        return None

    return a / b

class Stack:
    def push(self, item, *rest, **kw):
        self.items.append(item)

    async def pop(self):
        return self.items.pop()

def one_liner(): return 1
"#;

    #[test]
    fn test_extract_functions() {
        let funcs = extract_functions(SAMPLE);
        let names: Vec<_> = funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["divide", "push", "pop", "one_liner"]);

        let divide = &funcs[0];
        assert_eq!(divide.line_start, 8);
        assert_eq!(divide.line_end, 13);
        assert_eq!(divide.args, vec!["a", "b"]);
        assert!(divide.code.starts_with("def divide(a, b: int = 2):\n"));
        assert!(divide.code.ends_with("    return a / b"));
        assert_eq!(divide.code.lines().count(), 6);

        let push = &funcs[1];
        assert_eq!(push.args, vec!["self", "item"]);
        assert_eq!(push.line_start, push.line_end - 1);

        let one = &funcs[3];
        assert_eq!(one.line_start, one.line_end);
        assert!(one.args.is_empty());
        assert_eq!(one.code, "def one_liner(): return 1");
    }

    #[test]
    fn test_multiline_signature() {
        let src = "def f(\n    x,\n    y=(1, 2),\n):\n    return x\n";
        let funcs = extract_functions(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].args, vec!["x", "y"]);
        assert_eq!(funcs[0].line_end, 5);
    }

    #[test]
    fn test_extract_imports() {
        let imports = extract_imports(SAMPLE);
        assert_eq!(
            imports,
            vec![
                "import os",
                "import sys",
                "from typing import List",
                "from typing import Optional",
                "from . import helpers",
            ]
        );
    }

    #[test]
    fn test_garbage_input_is_empty() {
        assert!(extract_functions("))) def (((").is_empty());
        assert!(extract_imports("").is_empty());
    }
}
