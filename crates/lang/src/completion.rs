//! Editor completion
//!
//! Completion works on tokens rather than a bound tree so that it copes with
//! the half-typed source an editor sends while the user is typing.

use crate::lexer::{Keyword, Lexer, Token, TokenType};
use crate::library::{qualify, MemberKind, ReferenceSet, TypeInfo};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Completion item kinds, numbered the way editors number them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompletionItemKind {
    Text = 0,
    Method = 1,
    Function = 2,
    Constructor = 3,
    Field = 4,
    Variable = 5,
    Class = 6,
    Interface = 7,
    Module = 8,
    Property = 9,
    Unit = 10,
    Value = 11,
    Enum = 12,
    Keyword = 13,
    Snippet = 14,
    Color = 15,
    File = 16,
    Reference = 17,
    Folder = 18,
}

impl CompletionItemKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl Serialize for CompletionItemKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub insert_text: String,
}

/// Reserved words, as offered at the top of every completion list.
pub fn keywords() -> Vec<&'static str> {
    let mut words: Vec<&'static str> = Keyword::ALL.iter().map(|(text, _)| *text).collect();
    words.sort_unstable();
    words
}

/// Completion items for the caret at character `offset` of `source`.
pub fn complete(source: &str, offset: usize) -> Vec<CompletionItem> {
    let references = ReferenceSet::completion();
    let (tokens, _) = Lexer::new(source).tokenize_with_errors();
    let tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t.token_type, TokenType::Comment(_) | TokenType::Eof))
        .collect();
    let outline = Outline::scan(&tokens);

    let before: Vec<&Token> = tokens.iter().filter(|t| t.end_offset() <= offset).collect();
    let mut context_end = before.len();
    if let Some(last) = before.last() {
        let is_word = matches!(last.token_type, TokenType::Identifier(_) | TokenType::Keyword(_));
        if is_word && last.end_offset() == offset {
            context_end -= 1;
        }
    }
    let context = &before[..context_end];

    let candidates = match member_chain(context) {
        Some(path) => member_candidates(&references, &outline, &path),
        None => scope_candidates(&references, &outline, context),
    };

    let mut items: Vec<CompletionItem> = keywords()
        .into_iter()
        .map(|word| CompletionItem {
            label: word.to_string(),
            kind: CompletionItemKind::Keyword,
            detail: None,
            documentation: None,
            insert_text: word.to_string(),
        })
        .collect();
    items.extend(group(candidates));
    items
}

struct Candidate {
    label: String,
    kind: CompletionItemKind,
    detail: &'static str,
    documentation: String,
}

/// Merge candidates sharing (label, kind, detail), sorted by label then kind.
fn group(candidates: Vec<Candidate>) -> Vec<CompletionItem> {
    let mut groups: BTreeMap<(String, CompletionItemKind, &'static str), Vec<String>> =
        BTreeMap::new();
    for candidate in candidates {
        let docs = groups
            .entry((candidate.label, candidate.kind, candidate.detail))
            .or_default();
        if !docs.contains(&candidate.documentation) {
            docs.push(candidate.documentation);
        }
    }

    groups
        .into_iter()
        .map(|((label, kind, detail), docs)| CompletionItem {
            insert_text: label.clone(),
            label,
            kind,
            detail: Some(detail.to_string()),
            documentation: Some(docs.join("\n")),
        })
        .collect()
}

/// The `a.b.` chain ending the context, if the caret follows a dot.
fn member_chain(context: &[&Token]) -> Option<Vec<String>> {
    let (last, mut rest) = context.split_last()?;
    if last.token_type != TokenType::Dot {
        return None;
    }

    let mut path = Vec::new();
    loop {
        let Some((token, remaining)) = rest.split_last() else {
            break;
        };
        let Some(name) = token.identifier() else {
            break;
        };
        path.push(name.to_string());
        rest = remaining;
        match rest.split_last() {
            Some((dot, remaining)) if dot.token_type == TokenType::Dot => rest = remaining,
            _ => break,
        }
    }
    path.reverse();
    Some(path)
}

fn member_candidates(references: &ReferenceSet, outline: &Outline, path: &[String]) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if path.is_empty() {
        return candidates;
    }
    let joined = path.join(".");

    if references.is_namespace(&joined) {
        namespace_contents(references, &joined, &mut candidates);
        return candidates;
    }

    if path.len() == 1 {
        if let Some(class) = outline.classes.iter().find(|c| c.name == joined) {
            for method in &class.methods {
                candidates.push(function_candidate(method));
            }
            return candidates;
        }
        for namespace in outline.imported_namespaces() {
            if let Some(ty) = references.lookup_type(&namespace, &joined) {
                type_members(ty, &mut candidates);
            }
        }
        return candidates;
    }

    let Some((name, prefix)) = path.split_last() else {
        return candidates;
    };
    if let Some(ty) = references.lookup_type(&prefix.join("."), name) {
        type_members(ty, &mut candidates);
    }
    candidates
}

fn scope_candidates(references: &ReferenceSet, outline: &Outline, context: &[&Token]) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let scope = CaretScope::scan(context);

    if let Some(function) = &scope.function {
        for parameter in &function.parameters {
            candidates.push(Candidate {
                label: parameter.clone(),
                kind: CompletionItemKind::Variable,
                detail: "Parameter",
                documentation: format!("(parameter) {}", parameter),
            });
        }
        for (local, _) in &function.locals {
            candidates.push(Candidate {
                label: local.clone(),
                kind: CompletionItemKind::Variable,
                detail: "Local",
                documentation: format!("let {}", local),
            });
        }
    }

    for function in &outline.functions {
        candidates.push(function_candidate(function));
    }
    for class in &outline.classes {
        candidates.push(Candidate {
            label: class.name.clone(),
            kind: CompletionItemKind::Class,
            detail: "Class",
            documentation: format!("class {}", class.name),
        });
        if scope.class.as_deref() == Some(class.name.as_str()) {
            for method in &class.methods {
                candidates.push(function_candidate(method));
            }
        }
    }

    for using in &outline.usings {
        let name = using.path.join(".");
        if using.is_static {
            if let Some(ty) = references.lookup_full_name(&name) {
                type_members(ty, &mut candidates);
            } else if let Some(class) = outline.classes.iter().find(|c| c.name == name) {
                for method in &class.methods {
                    candidates.push(function_candidate(method));
                }
            }
        } else if references.is_namespace(&name) {
            for ty in references.types_in(&name) {
                candidates.push(type_candidate(ty));
            }
        }
    }

    for namespace in references.child_namespaces("") {
        candidates.push(namespace_candidate(&namespace));
    }
    candidates
}

fn namespace_contents(references: &ReferenceSet, namespace: &str, out: &mut Vec<Candidate>) {
    for child in references.child_namespaces(namespace) {
        let mut candidate = namespace_candidate(&qualify(namespace, &child));
        candidate.label = child;
        out.push(candidate);
    }
    for ty in references.types_in(namespace) {
        out.push(type_candidate(ty));
    }
}

fn namespace_candidate(qualified: &str) -> Candidate {
    Candidate {
        label: qualified.to_string(),
        kind: CompletionItemKind::Module,
        detail: "Namespace",
        documentation: format!("namespace {}", qualified),
    }
}

fn type_candidate(ty: &TypeInfo) -> Candidate {
    Candidate {
        label: ty.name.clone(),
        kind: CompletionItemKind::Class,
        detail: "Class",
        documentation: format!("{}\nclass {}", ty.documentation, ty.full_name()),
    }
}

fn type_members(ty: &TypeInfo, out: &mut Vec<Candidate>) {
    for member in &ty.members {
        let (kind, detail) = match member.kind {
            MemberKind::Method => (CompletionItemKind::Method, "Method"),
            MemberKind::Property => (CompletionItemKind::Property, "Property"),
        };
        out.push(Candidate {
            label: member.name.to_string(),
            kind,
            detail,
            documentation: format!("{}\n{}", member.documentation, member.signature),
        });
    }
}

fn function_candidate(function: &OutlineFunction) -> Candidate {
    Candidate {
        label: function.name.clone(),
        kind: CompletionItemKind::Method,
        detail: "Method",
        documentation: format!("function {}({})", function.name, function.parameters.join(", ")),
    }
}

struct OutlineUsing {
    is_static: bool,
    path: Vec<String>,
}

struct OutlineFunction {
    name: String,
    parameters: Vec<String>,
}

struct OutlineClass {
    name: String,
    methods: Vec<OutlineFunction>,
}

/// Declarations of the whole document, found by brace depth alone.
#[derive(Default)]
struct Outline {
    usings: Vec<OutlineUsing>,
    functions: Vec<OutlineFunction>,
    classes: Vec<OutlineClass>,
}

impl Outline {
    fn scan(tokens: &[Token]) -> Self {
        let mut outline = Outline::default();
        let mut depth = 0usize;
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            match &token.token_type {
                TokenType::LeftBrace => depth += 1,
                TokenType::RightBrace => depth = depth.saturating_sub(1),
                TokenType::Keyword(Keyword::Using) if depth == 0 => {
                    let mut j = i + 1;
                    let is_static = tokens.get(j).is_some_and(|t| t.is_keyword(Keyword::Static));
                    if is_static {
                        j += 1;
                    }
                    let (path, next) = dotted_path(tokens, j);
                    if !path.is_empty() {
                        outline.usings.push(OutlineUsing { is_static, path });
                    }
                    i = next;
                    continue;
                }
                TokenType::Keyword(Keyword::Class) if depth == 0 => {
                    if let Some(name) = tokens.get(i + 1).and_then(Token::identifier) {
                        outline.classes.push(OutlineClass {
                            name: name.to_string(),
                            methods: Vec::new(),
                        });
                    }
                }
                TokenType::Keyword(Keyword::Function) if depth <= 1 => {
                    if let Some(function) = function_header(tokens, i) {
                        if depth == 0 {
                            outline.functions.push(function);
                        } else if let Some(class) = outline.classes.last_mut() {
                            class.methods.push(function);
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }

        outline
    }

    fn imported_namespaces(&self) -> impl Iterator<Item = String> + '_ {
        self.usings
            .iter()
            .filter(|using| !using.is_static)
            .map(|using| using.path.join("."))
    }
}

fn dotted_path(tokens: &[Token], start: usize) -> (Vec<String>, usize) {
    let mut path = Vec::new();
    let mut i = start;
    while let Some(name) = tokens.get(i).and_then(Token::identifier) {
        path.push(name.to_string());
        i += 1;
        if tokens.get(i).map(|t| &t.token_type) == Some(&TokenType::Dot) {
            i += 1;
        } else {
            break;
        }
    }
    (path, i)
}

/// `function name(a, b)` starting at `start`.
fn function_header(tokens: &[Token], start: usize) -> Option<OutlineFunction> {
    let name = tokens.get(start + 1)?.identifier()?.to_string();
    let mut parameters = Vec::new();
    if tokens.get(start + 2)?.token_type == TokenType::LeftParen {
        for token in &tokens[start + 3..] {
            match &token.token_type {
                TokenType::Identifier(parameter) => parameters.push(parameter.clone()),
                TokenType::Comma => {}
                _ => break,
            }
        }
    }
    Some(OutlineFunction { name, parameters })
}

struct FunctionScope {
    declared_at: usize,
    parameters: Vec<String>,
    /// Local name and the brace depth that owns it
    locals: Vec<(String, usize)>,
}

/// What is in scope at the caret.
#[derive(Default)]
struct CaretScope {
    class: Option<String>,
    function: Option<FunctionScope>,
}

impl CaretScope {
    fn scan(tokens: &[&Token]) -> Self {
        let mut scope = CaretScope::default();
        let mut class_declared_at = 0;
        let mut depth = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let next_identifier = |offset: usize| tokens.get(i + offset).and_then(|t| t.identifier());
            match &token.token_type {
                TokenType::LeftBrace => depth += 1,
                TokenType::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if let Some(function) = &mut scope.function {
                        function.locals.retain(|(_, owner)| *owner <= depth);
                        if depth == function.declared_at {
                            scope.function = None;
                        }
                    }
                    if scope.class.is_some() && depth == class_declared_at {
                        scope.class = None;
                    }
                }
                TokenType::Keyword(Keyword::Class) => {
                    if let Some(name) = next_identifier(1) {
                        scope.class = Some(name.to_string());
                        class_declared_at = depth;
                    }
                }
                TokenType::Keyword(Keyword::Function) => {
                    if next_identifier(1).is_some() {
                        let mut parameters = Vec::new();
                        for token in tokens.iter().skip(i + 3) {
                            match &token.token_type {
                                TokenType::Identifier(parameter) => parameters.push(parameter.clone()),
                                TokenType::Comma => {}
                                _ => break,
                            }
                        }
                        scope.function = Some(FunctionScope {
                            declared_at: depth,
                            parameters,
                            locals: Vec::new(),
                        });
                    }
                }
                TokenType::Keyword(Keyword::Let) => {
                    if let (Some(function), Some(name)) = (&mut scope.function, next_identifier(1)) {
                        function.locals.push((name.to_string(), depth));
                    }
                }
                TokenType::Keyword(Keyword::For) | TokenType::Keyword(Keyword::Catch) => {
                    let opens_paren = tokens
                        .get(i + 1)
                        .is_some_and(|t| t.token_type == TokenType::LeftParen);
                    if let (true, Some(function), Some(name)) =
                        (opens_paren, &mut scope.function, next_identifier(2))
                    {
                        function.locals.push((name.to_string(), depth + 1));
                    }
                }
                _ => {}
            }
        }

        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[CompletionItem], kind: CompletionItemKind) -> Vec<String> {
        items
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.label.clone())
            .collect()
    }

    fn complete_at_end(source: &str) -> Vec<CompletionItem> {
        complete(source, source.chars().count())
    }

    #[test]
    fn test_keywords_come_first_and_sorted() {
        let items = complete_at_end("function main() { ");
        let words = keywords();
        let leading: Vec<&str> = items.iter().take(words.len()).map(|i| i.label.as_str()).collect();
        assert_eq!(leading, words);
        assert!(items[..words.len()]
            .iter()
            .all(|item| item.kind == CompletionItemKind::Keyword));
    }

    #[test]
    fn test_member_completion_on_type() {
        let items = complete_at_end("using System;\nfunction main() { Console.");
        let methods = labels(&items, CompletionItemKind::Method);
        assert!(methods.contains(&"WriteLine".to_string()));
        assert!(methods.contains(&"SetOut".to_string()));
        assert!(labels(&items, CompletionItemKind::Property).contains(&"Out".to_string()));
    }

    #[test]
    fn test_member_completion_on_namespace() {
        let items = complete_at_end("function main() { System.");
        assert!(labels(&items, CompletionItemKind::Module).contains(&"IO".to_string()));
        assert!(labels(&items, CompletionItemKind::Class).contains(&"Console".to_string()));
    }

    #[test]
    fn test_member_completion_with_partial_word() {
        let source = "function main() { System.Console.Wri }";
        let offset = source.find("Wri").unwrap() + 3;
        let items = complete(source, offset);
        assert!(labels(&items, CompletionItemKind::Method).contains(&"Write".to_string()));
    }

    #[test]
    fn test_scope_completion() {
        let items = complete_at_end(
            "class Printer { function Shout(text) { } }\nfunction main(arg) { let greeting = 1; for (n in [1]) { } gr",
        );
        let variables = labels(&items, CompletionItemKind::Variable);
        assert!(variables.contains(&"greeting".to_string()));
        assert!(variables.contains(&"arg".to_string()));
        assert!(!variables.contains(&"n".to_string()));
        assert!(!variables.contains(&"text".to_string()));
        assert!(labels(&items, CompletionItemKind::Method).contains(&"main".to_string()));
        assert!(labels(&items, CompletionItemKind::Class).contains(&"Printer".to_string()));
        assert!(labels(&items, CompletionItemKind::Module).contains(&"System".to_string()));
    }

    #[test]
    fn test_capture_namespace_is_hidden() {
        let items = complete_at_end("function main() { ");
        assert!(!labels(&items, CompletionItemKind::Module).contains(&"Sandbox".to_string()));
    }

    #[test]
    fn test_static_import_members_offered() {
        let items = complete_at_end("using static System.Console;\nfunction main() { ");
        assert!(labels(&items, CompletionItemKind::Method).contains(&"ReadLine".to_string()));
    }

    #[test]
    fn test_duplicate_candidates_are_grouped() {
        let items = complete_at_end(
            "function main() { let x = 1; let x = 2; ",
        );
        let xs: Vec<_> = items.iter().filter(|item| item.label == "x").collect();
        assert_eq!(xs.len(), 1);
    }

    #[test]
    fn test_kind_serializes_as_number() {
        let json = serde_json::to_value(CompletionItemKind::Keyword).unwrap();
        assert_eq!(json, serde_json::json!(13));
    }
}
