//! Tokenizer for expression source text

use crate::error::CompileError;

/// One lexical token
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Let,
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEq,
    EqEq,
    Assign,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Question,
    Colon,
    LParen,
    RParen,
    Comma,
    Semi,
}

/// Rewrite the `Thing->Attribute` sugar into `attr(Thing, "Attribute")`
///
/// The single pre-compile textual transform. Applies only outside string
/// literals; anything that does not look like `identifier -> identifier`
/// is left untouched for the lexer to reject.
pub(crate) fn rewrite_attribute_sugar(source: &str) -> String {
    let cs: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut i = 0;
    let mut in_string = false;
    while i < cs.len() {
        let c = cs[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < cs.len() {
                out.push(cs[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '-' if i + 1 < cs.len() && cs[i + 1] == '>' => {
                let head = out.trim_end();
                let start = match head.rfind(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                {
                    Some(p) => {
                        let boundary_char_len = head[p..].chars().next().map_or(1, char::len_utf8);
                        p + boundary_char_len
                    }
                    None => 0,
                };
                let owner = head[start..].to_string();

                let mut j = i + 2;
                while j < cs.len() && cs[j].is_whitespace() {
                    j += 1;
                }
                let attr_start = j;
                while j < cs.len() && (cs[j].is_ascii_alphanumeric() || cs[j] == '_') {
                    j += 1;
                }
                let attribute: String = cs[attr_start..j].iter().collect();

                let owner_ok = owner
                    .chars()
                    .next()
                    .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
                if owner_ok && !attribute.is_empty() {
                    out.truncate(start);
                    out.push_str("attr(");
                    out.push_str(&owner);
                    out.push_str(", \"");
                    out.push_str(&attribute);
                    out.push_str("\")");
                    i = j;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Tokenize a (rewritten) source string into tokens with byte offsets
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, CompileError> {
    let cs: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < cs.len() {
        let c = cs[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let token = match c {
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            ';' => {
                i += 1;
                Token::Semi
            }
            '?' => {
                i += 1;
                Token::Question
            }
            ':' => {
                i += 1;
                Token::Colon
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '%' => {
                i += 1;
                Token::Percent
            }
            '!' => {
                if cs.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::BangEq
                } else {
                    i += 1;
                    Token::Bang
                }
            }
            '=' => {
                if cs.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::EqEq
                } else {
                    i += 1;
                    Token::Assign
                }
            }
            '<' => {
                if cs.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::Le
                } else {
                    i += 1;
                    Token::Lt
                }
            }
            '>' => {
                if cs.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::Ge
                } else {
                    i += 1;
                    Token::Gt
                }
            }
            '&' => {
                if cs.get(i + 1) == Some(&'&') {
                    i += 2;
                    Token::AndAnd
                } else {
                    return Err(CompileError::new(start, "expected '&&'"));
                }
            }
            '|' => {
                if cs.get(i + 1) == Some(&'|') {
                    i += 2;
                    Token::OrOr
                } else {
                    return Err(CompileError::new(start, "expected '||'"));
                }
            }
            '"' => {
                i += 1;
                let mut s = String::new();
                loop {
                    match cs.get(i) {
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match cs.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('"') => '"',
                                Some('\\') => '\\',
                                other => {
                                    return Err(CompileError::new(
                                        i,
                                        format!("unknown escape: {:?}", other),
                                    ))
                                }
                            };
                            s.push(escaped);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err(CompileError::new(start, "unterminated string")),
                    }
                }
                Token::Str(s)
            }
            _ if c.is_ascii_digit() => {
                let mut end = i;
                while end < cs.len() && cs[end].is_ascii_digit() {
                    end += 1;
                }
                let is_float =
                    cs.get(end) == Some(&'.') && cs.get(end + 1).is_some_and(|d| d.is_ascii_digit());
                if is_float {
                    end += 1;
                    while end < cs.len() && cs[end].is_ascii_digit() {
                        end += 1;
                    }
                }
                let text: String = cs[i..end].iter().collect();
                i = end;
                if is_float {
                    Token::Float(
                        text.parse()
                            .map_err(|_| CompileError::new(start, "malformed number"))?,
                    )
                } else {
                    Token::Int(
                        text.parse()
                            .map_err(|_| CompileError::new(start, "malformed number"))?,
                    )
                }
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i;
                while end < cs.len() && (cs[end].is_ascii_alphanumeric() || cs[end] == '_') {
                    end += 1;
                }
                let text: String = cs[i..end].iter().collect();
                i = end;
                match text.as_str() {
                    "let" => Token::Let,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(text),
                }
            }
            other => {
                return Err(CompileError::new(
                    start,
                    format!("unexpected character: {:?}", other),
                ))
            }
        };
        tokens.push((token, start));
    }
    Ok(tokens)
}
