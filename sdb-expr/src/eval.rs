//! 式評価エンジン
//!
//! トークン列を主演算子で再帰的に分割して評価します（printコマンド、
//! ウォッチポイント等）。

use crate::{ExprError, Lexer, MemoryReader, RegisterResolver, Token, TokenKind, Word};
use tracing::debug;

type EvalResult = std::result::Result<Word, ExprError>;

/// 式評価器
pub struct ExpressionEvaluator<'a> {
    lexer: &'a Lexer,
    memory: &'a dyn MemoryReader,
    registers: &'a dyn RegisterResolver,
}

impl<'a> ExpressionEvaluator<'a> {
    /// 新しい式評価器を作成する
    pub fn new(
        lexer: &'a Lexer,
        memory: &'a dyn MemoryReader,
        registers: &'a dyn RegisterResolver,
    ) -> Self {
        Self {
            lexer,
            memory,
            registers,
        }
    }

    /// 式文字列を評価する
    pub fn evaluate(&self, input: &str) -> EvalResult {
        let tokens = self.lexer.tokenize(input)?;
        self.evaluate_tokens(&tokens)
    }

    /// トークン列全体を評価する
    pub fn evaluate_tokens(&self, tokens: &[Token]) -> EvalResult {
        if tokens.is_empty() {
            return Err(ExprError::malformed("empty expression"));
        }
        self.eval(tokens)
    }

    /// トークン列の閉区間 `[p, q]` を評価する
    pub fn eval_range(&self, tokens: &[Token], p: usize, q: usize) -> EvalResult {
        if p > q || q >= tokens.len() {
            return Err(ExprError::malformed(format!(
                "invalid token range [{}, {}]",
                p, q
            )));
        }
        self.eval(&tokens[p..=q])
    }

    fn eval(&self, tokens: &[Token]) -> EvalResult {
        match tokens {
            [] => Err(ExprError::malformed("missing operand")),
            [token] => self.eval_operand(token),
            _ if is_enclosed(tokens)? => self.eval(&tokens[1..tokens.len() - 1]),
            _ => {
                let op = find_main_operator(tokens)?;
                let op_token = &tokens[op];
                debug!(
                    "main operator '{}' at position {}",
                    op_token.text, op_token.position
                );

                if op_token.kind == TokenKind::Deref {
                    if op != 0 {
                        return Err(ExprError::malformed(format!(
                            "unexpected operand before '*' at position {}",
                            op_token.position
                        )));
                    }
                    let addr = self.eval(&tokens[1..])?;
                    return self.read_byte(addr);
                }

                let lhs = self.eval(&tokens[..op])?;
                let rhs = self.eval(&tokens[op + 1..])?;
                apply_binary(op_token, lhs, rhs)
            }
        }
    }

    /// 数値リテラルまたはレジスタを評価する
    fn eval_operand(&self, token: &Token) -> EvalResult {
        match token.kind {
            TokenKind::Decimal => token
                .text
                .parse::<Word>()
                .map_err(|_| ExprError::InvalidNumber(token.text.clone())),
            TokenKind::Hex => Word::from_str_radix(&token.text[2..], 16)
                .map_err(|_| ExprError::InvalidNumber(token.text.clone())),
            TokenKind::Register => {
                let name = token.text.trim_start_matches('$');
                self.registers
                    .resolve(name)
                    .ok_or_else(|| ExprError::UnknownRegister(name.to_string()))
            }
            _ => Err(ExprError::malformed(format!(
                "operator '{}' at position {} has no operands",
                token.text, token.position
            ))),
        }
    }

    fn read_byte(&self, addr: Word) -> EvalResult {
        self.memory
            .read_u8(addr)
            .map(Word::from)
            .map_err(|e| ExprError::Memory {
                addr,
                source: e.into(),
            })
    }
}

/// 二項演算を適用する
fn apply_binary(op: &Token, lhs: Word, rhs: Word) -> EvalResult {
    match op.kind {
        TokenKind::Plus => Ok(lhs.wrapping_add(rhs)),
        TokenKind::Minus => Ok(lhs.wrapping_sub(rhs)),
        TokenKind::Star => Ok(lhs.wrapping_mul(rhs)),
        TokenKind::Slash => {
            if rhs == 0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(lhs / rhs)
        }
        TokenKind::Eq => Ok(Word::from(lhs == rhs)),
        TokenKind::Neq => Ok(Word::from(lhs != rhs)),
        TokenKind::And => Ok(Word::from(lhs != 0 && rhs != 0)),
        TokenKind::Deref
        | TokenKind::Decimal
        | TokenKind::Hex
        | TokenKind::Register
        | TokenKind::LParen
        | TokenKind::RParen => Err(ExprError::malformed(format!(
            "'{}' is not a binary operator",
            op.text
        ))),
    }
}

/// 区間全体が1組の括弧で囲まれているか判定する
///
/// 括弧の対応が取れていない場合はエラー。
fn is_enclosed(tokens: &[Token]) -> std::result::Result<bool, ExprError> {
    let last = tokens.len() - 1;
    let mut depth: usize = 0;
    let mut closed_early = false;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ExprError::malformed(format!("unmatched ')' at position {}", token.position))
                })?;
                if depth == 0 && i != last {
                    closed_early = true;
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ExprError::malformed("unmatched '('"));
    }

    Ok(tokens[0].kind == TokenKind::LParen
        && tokens[last].kind == TokenKind::RParen
        && !closed_early)
}

/// 主演算子のインデックスを探す
///
/// 括弧の外にある演算子のうち優先順位が最も低いものを選ぶ。同順位なら
/// 二項演算子は右端（左結合）、単項演算子は左端を選ぶ。
fn find_main_operator(tokens: &[Token]) -> std::result::Result<usize, ExprError> {
    let mut depth: usize = 0;
    let mut main: Option<(usize, u8)> = None;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            kind => {
                let Some(prec) = kind.precedence() else {
                    continue;
                };
                let take = match main {
                    None => true,
                    Some((_, current)) => prec < current || (prec == current && !kind.is_unary()),
                };
                if take {
                    main = Some((i, prec));
                }
            }
        }
    }

    main.map(|(i, _)| i).ok_or_else(|| {
        ExprError::malformed(format!(
            "no operator between operands at position {}",
            tokens[0].position
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// テスト用のエミュレータ状態
    struct FakeTarget {
        memory: HashMap<Word, u8>,
        registers: HashMap<&'static str, Word>,
    }

    impl FakeTarget {
        fn new() -> Self {
            let mut memory = HashMap::new();
            memory.insert(0x100, 42);
            memory.insert(0x101, 0xff);
            memory.insert(0x2a, 0x7);
            let mut registers = HashMap::new();
            registers.insert("sp", 0x100);
            registers.insert("a0", 5);
            registers.insert("0", 0);
            Self { memory, registers }
        }
    }

    impl MemoryReader for FakeTarget {
        fn read_u8(&self, addr: Word) -> crate::Result<u8> {
            self.memory
                .get(&addr)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("address 0x{:x} is not mapped", addr))
        }
    }

    impl RegisterResolver for FakeTarget {
        fn resolve(&self, name: &str) -> Option<Word> {
            self.registers.get(name).copied()
        }
    }

    fn eval(input: &str) -> EvalResult {
        let lexer = Lexer::new().unwrap();
        let target = FakeTarget::new();
        ExpressionEvaluator::new(&lexer, &target, &target).evaluate(input)
    }

    #[test]
    fn test_eval_literals() {
        assert_eq!(eval("42").unwrap(), 42);
        assert_eq!(eval("0x2a").unwrap(), 42);
        assert_eq!(eval("0XFF").unwrap(), 255);
        assert_eq!(eval("  7 ").unwrap(), 7);
    }

    #[test]
    fn test_eval_parentheses() {
        assert_eq!(eval("(1+2)").unwrap(), 3);
        assert_eq!(eval("1+2").unwrap(), 3);
        assert_eq!(eval("((1+2)*3)").unwrap(), 9);
        assert_eq!(eval("(1+2)*(3+4)").unwrap(), 21);
        assert_eq!(eval("((((5))))").unwrap(), 5);
    }

    #[test]
    fn test_eval_left_associative() {
        assert_eq!(eval("10-3-2").unwrap(), 5);
        assert_eq!(eval("100/10/5").unwrap(), 2);
        assert_eq!(eval("10-(3-2)").unwrap(), 9);
    }

    #[test]
    fn test_eval_precedence() {
        assert_eq!(eval("2+3*4").unwrap(), 14);
        assert_eq!(eval("2*3+4").unwrap(), 10);
        assert_eq!(eval("1==1&&2!=3").unwrap(), 1);
        assert_eq!(eval("1+1==2").unwrap(), 1);
        assert_eq!(eval("3==3==1").unwrap(), 1);
        assert_eq!(eval("0&&1").unwrap(), 0);
        assert_eq!(eval("2&&3").unwrap(), 1);
    }

    #[test]
    fn test_eval_wrapping() {
        assert_eq!(eval("0-1").unwrap(), Word::MAX);
        assert_eq!(eval("0xffffffffffffffff+2").unwrap(), 1);
    }

    #[test]
    fn test_eval_division_by_zero() {
        assert!(matches!(eval("4/0"), Err(ExprError::DivisionByZero)));
        assert!(matches!(eval("4/(2-2)"), Err(ExprError::DivisionByZero)));
    }

    #[test]
    fn test_eval_deref() {
        assert_eq!(eval("*0x100").unwrap(), 42);
        assert_eq!(eval("*0x101").unwrap(), 0xff);
        assert_eq!(eval("*$sp").unwrap(), 42);
        assert_eq!(eval("*0x100+1").unwrap(), 43);
        assert_eq!(eval("2**0x100").unwrap(), 84);
        assert_eq!(eval("1+*0x100").unwrap(), 43);
        assert_eq!(eval("*(0x80+0x80)").unwrap(), 42);
        // 二重参照外し: *0x100 = 42 = 0x2a -> 7
        assert_eq!(eval("**0x100").unwrap(), 7);
    }

    #[test]
    fn test_eval_deref_memory_error() {
        match eval("*0x999") {
            Err(ExprError::Memory { addr, .. }) => assert_eq!(addr, 0x999),
            other => panic!("Expected Memory error, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_registers() {
        assert_eq!(eval("$a0*2").unwrap(), 10);
        assert_eq!(eval("$0").unwrap(), 0);
        match eval("$nosuch") {
            Err(ExprError::UnknownRegister(name)) => assert_eq!(name, "nosuch"),
            other => panic!("Expected UnknownRegister, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_malformed() {
        assert!(matches!(eval(""), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("   "), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("(1+2"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("1+2)"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval(")1+2("), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("()"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("1 2"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("1+"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("-1"), Err(ExprError::Malformed(_))));
        assert!(matches!(eval("+"), Err(ExprError::Malformed(_))));
    }

    #[test]
    fn test_eval_invalid_number() {
        assert!(matches!(
            eval("99999999999999999999"),
            Err(ExprError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_eval_lex_error_propagates() {
        assert!(matches!(eval("1 ? 2"), Err(ExprError::Lex { position: 2 })));
    }

    #[test]
    fn test_eval_range() {
        let lexer = Lexer::new().unwrap();
        let target = FakeTarget::new();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let tokens = lexer.tokenize("(1+2)*4").unwrap();

        assert_eq!(evaluator.eval_range(&tokens, 0, 6).unwrap(), 12);
        assert_eq!(evaluator.eval_range(&tokens, 1, 3).unwrap(), 3);
        assert_eq!(evaluator.eval_range(&tokens, 6, 6).unwrap(), 4);
        assert!(matches!(
            evaluator.eval_range(&tokens, 3, 2),
            Err(ExprError::Malformed(_))
        ));
        assert!(matches!(
            evaluator.eval_range(&tokens, 0, 7),
            Err(ExprError::Malformed(_))
        ));
    }

    #[test]
    fn test_failed_eval_leaves_lexer_usable() {
        let lexer = Lexer::new().unwrap();
        let target = FakeTarget::new();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        assert!(evaluator.evaluate("4/0").is_err());
        assert_eq!(evaluator.evaluate("4/2").unwrap(), 2);
    }
}
