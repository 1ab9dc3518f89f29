//! Expression engine: compile once, evaluate many times
//!
//! All numeric, string and boolean behavior in the simulation — chances,
//! magnitudes, descriptions, movement speeds — is defined as small textual
//! expressions on definitions rather than hard-coded logic. An expression is
//! compiled (with the `Thing->Attribute` sugar rewritten first) into a
//! reusable [`CompiledExpr`] and evaluated against a random source plus a
//! set of named thing bindings.

mod cache;
mod eval;
mod lexer;
mod parser;

pub use cache::compile_cached;
pub use eval::EvalScope;

use crate::error::{CompileError, EvalError};
use crate::value::Value;
use lexer::{rewrite_attribute_sugar, tokenize};
use parser::{Ast, Parser};

/// How an expression source is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprMode {
    /// A single expression producing one value
    Simple,
    /// A template string; `{expr}` segments are embedded expressions and
    /// everything else is literal text; produces a string
    FormattedText,
    /// `let name = expr;` statements followed by a final expression
    Complex,
}

#[derive(Debug, Clone)]
enum Program {
    Simple(Ast),
    Text(Vec<TextPart>),
    Block { lets: Vec<(String, Ast)>, result: Ast },
}

#[derive(Debug, Clone)]
enum TextPart {
    Literal(String),
    Expr(Ast),
}

/// A compiled, reusable expression
///
/// Never evaluates eagerly; callers invoke [`CompiledExpr::evaluate`] with a
/// fresh scope per use. Obtain shared instances through [`compile_cached`].
#[derive(Debug)]
pub struct CompiledExpr {
    source: String,
    mode: ExprMode,
    declared: Vec<String>,
    program: Program,
}

/// Compile an expression source under a declared variable signature
///
/// `declared` lists the role names the owning definition may bind; it is
/// retained for introspection. Unknown names do not fail compilation — they
/// evaluate to null, which is what keeps optional roles optional.
pub fn compile(
    source: &str,
    declared: &[&str],
    mode: ExprMode,
) -> Result<CompiledExpr, CompileError> {
    let program = match mode {
        ExprMode::Simple => {
            let rewritten = rewrite_attribute_sugar(source);
            Program::Simple(Parser::new(tokenize(&rewritten)?, rewritten.len()).parse_expression()?)
        }
        ExprMode::Complex => {
            let rewritten = rewrite_attribute_sugar(source);
            let (lets, result) =
                Parser::new(tokenize(&rewritten)?, rewritten.len()).parse_block()?;
            Program::Block { lets, result }
        }
        ExprMode::FormattedText => Program::Text(parse_template(source)?),
    };
    Ok(CompiledExpr {
        source: source.to_string(),
        mode,
        declared: declared.iter().map(|s| s.to_string()).collect(),
        program,
    })
}

fn parse_template(source: &str) -> Result<Vec<TextPart>, CompileError> {
    let cs: Vec<char> = source.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < cs.len() {
        match cs[i] {
            '{' if cs.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if cs.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '{' => {
                let start = i;
                let mut depth = 1;
                let mut j = i + 1;
                while j < cs.len() {
                    match cs[j] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(CompileError::new(start, "unclosed '{' in template"));
                }
                if !literal.is_empty() {
                    parts.push(TextPart::Literal(std::mem::take(&mut literal)));
                }
                let inner: String = cs[i + 1..j].iter().collect();
                let rewritten = rewrite_attribute_sugar(&inner);
                let ast =
                    Parser::new(tokenize(&rewritten)?, rewritten.len()).parse_expression()?;
                parts.push(TextPart::Expr(ast));
                i = j + 1;
            }
            '}' => return Err(CompileError::new(i, "unmatched '}' in template")),
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        parts.push(TextPart::Literal(literal));
    }
    Ok(parts)
}

impl CompiledExpr {
    /// The original source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The mode this expression was compiled under
    pub fn mode(&self) -> ExprMode {
        self.mode
    }

    /// The declared variable signature
    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    /// Evaluate against a scope
    pub fn evaluate(&self, scope: &mut EvalScope) -> Result<Value, EvalError> {
        match &self.program {
            Program::Simple(ast) => eval::eval(ast, scope),
            Program::Text(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TextPart::Literal(s) => out.push_str(s),
                        TextPart::Expr(ast) => {
                            let v = eval::eval(ast, scope)?;
                            out.push_str(&v.to_string());
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            Program::Block { lets, result } => {
                scope.clear_locals();
                for (name, ast) in lets {
                    let v = eval::eval(ast, scope)?;
                    scope.set_local(name, v);
                }
                eval::eval(result, scope)
            }
        }
    }

    /// Evaluate to an integer
    pub fn evaluate_int(&self, scope: &mut EvalScope) -> Result<i64, EvalError> {
        let v = self.evaluate(scope)?;
        v.as_int()
            .ok_or_else(|| EvalError::Type {
                expected: "int",
                got: v.type_name(),
            })
    }

    /// Evaluate to a float
    pub fn evaluate_float(&self, scope: &mut EvalScope) -> Result<f64, EvalError> {
        let v = self.evaluate(scope)?;
        v.as_float()
            .ok_or_else(|| EvalError::Type {
                expected: "number",
                got: v.type_name(),
            })
    }

    /// Evaluate to a boolean by truthiness
    pub fn evaluate_bool(&self, scope: &mut EvalScope) -> Result<bool, EvalError> {
        Ok(self.evaluate(scope)?.is_truthy())
    }

    /// Evaluate and render to a string
    pub fn evaluate_string(&self, scope: &mut EvalScope) -> Result<String, EvalError> {
        Ok(self.evaluate(scope)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ThingId;
    use crate::rng::SimRng;
    use crate::thing::{AttributeEffect, Thing, ThingKind};
    use crate::value::ValueMap;

    fn eval_simple(source: &str) -> Value {
        let compiled = compile(source, &[], ExprMode::Simple).unwrap();
        let globals = ValueMap::new();
        let mut rng = SimRng::new(42);
        let mut scope = EvalScope::new(&mut rng, 0, &globals);
        compiled.evaluate(&mut scope).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_simple("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval_simple("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval_simple("7 / 2"), Value::Int(3));
        assert_eq!(eval_simple("7.0 / 2"), Value::Float(3.5));
        assert_eq!(eval_simple("-4 % 3"), Value::Int(-1));
        assert_eq!(eval_simple("min(3, 8) + max(1, 2)"), Value::Int(5));
    }

    #[test]
    fn test_logic_and_comparison() {
        assert_eq!(eval_simple("3 > 2 && 1 <= 1"), Value::Bool(true));
        assert_eq!(eval_simple("3 == 3.0"), Value::Bool(true));
        assert_eq!(eval_simple("!(2 != 2)"), Value::Bool(true));
        assert_eq!(eval_simple("false || 0 + 1"), Value::Bool(true));
        assert_eq!(eval_simple("1 > 2 ? 10 : 20"), Value::Int(20));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            eval_simple("\"pop: \" + 95"),
            Value::Str("pop: 95".to_string())
        );
    }

    #[test]
    fn test_division_by_zero() {
        let compiled = compile("1 / 0", &[], ExprMode::Simple).unwrap();
        let globals = ValueMap::new();
        let mut rng = SimRng::new(1);
        let mut scope = EvalScope::new(&mut rng, 0, &globals);
        assert!(matches!(
            compiled.evaluate(&mut scope),
            Err(EvalError::DivisionByZero)
        ));
    }

    #[test]
    fn test_attribute_sugar_reads_effective_value() {
        let mut thing = Thing::new(ThingId::new(1), ThingKind::Site, "village", 0, 0);
        thing.set_attribute("Population", 100);
        thing.add_effect(AttributeEffect {
            title: "plague".into(),
            description: String::new(),
            attribute: "Population".into(),
            magnitude: -5,
            took_effect: 1,
            duration: -1,
            applied_by: None,
        });

        let compiled = compile("Subject->Population", &["Subject"], ExprMode::Simple).unwrap();
        let globals = ValueMap::new();
        let mut rng = SimRng::new(1);
        let mut scope = EvalScope::new(&mut rng, 1, &globals).bind("Subject", &thing);
        // effective, not base: 100 - 5
        assert_eq!(compiled.evaluate(&mut scope).unwrap(), Value::Int(95));
    }

    #[test]
    fn test_unresolved_binding_is_null() {
        let compiled =
            compile("Target->Strength", &["Target"], ExprMode::Simple).unwrap();
        let globals = ValueMap::new();
        let mut rng = SimRng::new(1);
        let mut scope = EvalScope::new(&mut rng, 0, &globals).bind_optional("Target", None);
        assert_eq!(compiled.evaluate(&mut scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_globals_resolution() {
        let compiled = compile("StepCount * 2", &[], ExprMode::Simple).unwrap();
        let mut globals = ValueMap::new();
        globals.insert("StepCount".into(), Value::Int(21));
        let mut rng = SimRng::new(1);
        let mut scope = EvalScope::new(&mut rng, 21, &globals);
        assert_eq!(compiled.evaluate(&mut scope).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_formatted_text() {
        let mut thing = Thing::new(ThingId::new(2), ThingKind::Unit, "warband", 0, 0);
        thing.name = "Red Hand".into();
        thing.set_attribute("Strength", 12);

        let compiled = compile(
            "The {Subject->Strength}-strong host marched {{onward}}",
            &["Subject"],
            ExprMode::FormattedText,
        )
        .unwrap();
        let globals = ValueMap::new();
        let mut rng = SimRng::new(1);
        let mut scope = EvalScope::new(&mut rng, 0, &globals).bind("Subject", &thing);
        assert_eq!(
            compiled.evaluate_string(&mut scope).unwrap(),
            "The 12-strong host marched {onward}"
        );
    }

    #[test]
    fn test_complex_block() {
        let compiled = compile(
            "let base = 10; let bonus = base * 2; base + bonus",
            &[],
            ExprMode::Complex,
        )
        .unwrap();
        let globals = ValueMap::new();
        let mut rng = SimRng::new(1);
        let mut scope = EvalScope::new(&mut rng, 0, &globals);
        assert_eq!(compiled.evaluate(&mut scope).unwrap(), Value::Int(30));
    }

    #[test]
    fn test_rand_is_deterministic_per_scope_rng() {
        let compiled = compile("rand(1, 100)", &[], ExprMode::Simple).unwrap();
        let globals = ValueMap::new();

        let mut rng1 = SimRng::new(7);
        let mut scope1 = EvalScope::new(&mut rng1, 0, &globals);
        let first = compiled.evaluate_int(&mut scope1).unwrap();
        assert!((1..=100).contains(&first));

        let mut rng2 = SimRng::new(7);
        let mut scope2 = EvalScope::new(&mut rng2, 0, &globals);
        assert_eq!(first, compiled.evaluate_int(&mut scope2).unwrap());
    }

    #[test]
    fn test_compile_error_reports_offset() {
        let err = compile("1 + * 2", &[], ExprMode::Simple).unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(compile("{oops", &[], ExprMode::FormattedText).is_err());
        assert!(compile("let = 3; 1", &[], ExprMode::Complex).is_err());
    }
}
