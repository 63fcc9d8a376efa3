//! Recursive-descent evaluator for integer formulas.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | atom
//! atom   := number | '[' name ']' | '(' expr ')'
//! ```
//!
//! Division rounds toward negative infinity.

use std::str::FromStr;

use super::{FormulaError, FormulaEvaluator, LevelContext};
use crate::state::{ActorState, AttributeKey};

/// Default [`FormulaEvaluator`].
///
/// Recognized references: `[level]`, every [`AttributeKey`] name
/// (`[attack]`, `[damage_roll]`, ...) read from effective attributes,
/// `[encroachment]`, `[hp]` and `[hp_max]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionEvaluator;

impl FormulaEvaluator for ExpressionEvaluator {
    fn evaluate(
        &self,
        formula: &str,
        level: &LevelContext,
        actor: &ActorState,
    ) -> Result<i64, FormulaError> {
        if formula.trim().is_empty() {
            return Ok(0);
        }

        let mut parser = Parser {
            chars: formula.char_indices().collect(),
            pos: 0,
            level,
            actor,
        };
        let value = parser.expr()?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(value),
            Some((position, ch)) => Err(FormulaError::UnexpectedChar { ch, position }),
        }
    }
}

struct Parser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    level: &'a LevelContext,
    actor: &'a ActorState,
}

impl Parser<'_> {
    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.peek();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some((_, ch)) if ch.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if matches!(self.peek(), Some((_, ch)) if ch == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<i64, FormulaError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value = value
                    .checked_add(self.term()?)
                    .ok_or(FormulaError::Overflow)?;
            } else if self.eat('-') {
                value = value
                    .checked_sub(self.term()?)
                    .ok_or(FormulaError::Overflow)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<i64, FormulaError> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value = value
                    .checked_mul(self.unary()?)
                    .ok_or(FormulaError::Overflow)?;
            } else if self.eat('/') {
                value = floor_div(value, self.unary()?)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<i64, FormulaError> {
        if self.eat('-') {
            return self
                .unary()?
                .checked_neg()
                .ok_or(FormulaError::Overflow);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<i64, FormulaError> {
        self.skip_whitespace();
        let (position, ch) = self.peek().ok_or(FormulaError::UnexpectedEnd)?;

        match ch {
            '0'..='9' => self.number(),
            '[' => {
                self.pos += 1;
                self.reference(position)
            }
            '(' => {
                self.pos += 1;
                let value = self.expr()?;
                if self.eat(')') {
                    Ok(value)
                } else {
                    match self.peek() {
                        Some((position, ch)) => Err(FormulaError::UnexpectedChar { ch, position }),
                        None => Err(FormulaError::UnexpectedEnd),
                    }
                }
            }
            _ => Err(FormulaError::UnexpectedChar { ch, position }),
        }
    }

    fn number(&mut self) -> Result<i64, FormulaError> {
        let start = self.peek().map_or(0, |(position, _)| position);
        let mut digits = String::new();
        while let Some((_, ch)) = self.peek().filter(|(_, ch)| ch.is_ascii_digit()) {
            digits.push(ch);
            self.pos += 1;
        }
        digits
            .parse()
            .map_err(|_| FormulaError::NumberOutOfRange(start))
    }

    fn reference(&mut self, start: usize) -> Result<i64, FormulaError> {
        let mut name = String::new();
        loop {
            match self.bump() {
                Some((_, ']')) => break,
                Some((_, ch)) => name.push(ch),
                None => return Err(FormulaError::UnclosedReference(start)),
            }
        }

        let name = name.trim();
        let value = match name {
            "level" => i64::from(self.level.level),
            "encroachment" => i64::from(self.actor.encroachment),
            "hp" => i64::from(self.actor.hp.current),
            "hp_max" => i64::from(self.actor.hp.maximum),
            _ => {
                let key = AttributeKey::from_str(name)
                    .map_err(|_| FormulaError::UnknownReference(name.to_owned()))?;
                self.actor.effective_attributes().get(key)
            }
        };
        Ok(value)
    }
}

fn floor_div(lhs: i64, rhs: i64) -> Result<i64, FormulaError> {
    if rhs == 0 {
        return Err(FormulaError::DivisionByZero);
    }
    let quotient = lhs.checked_div(rhs).ok_or(FormulaError::Overflow)?;
    if lhs % rhs != 0 && (lhs < 0) != (rhs < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CombatAttributes, ResourceMeter};

    fn actor() -> ActorState {
        ActorState::new("pc", "PC", ResourceMeter::new(12, 30))
            .with_encroachment(60)
            .with_attributes(CombatAttributes {
                attack: 4,
                damage_roll: 1,
                ..CombatAttributes::default()
            })
    }

    fn eval(formula: &str, level: u32) -> Result<i64, FormulaError> {
        ExpressionEvaluator.evaluate(formula, &LevelContext::new(level), &actor())
    }

    #[test]
    fn empty_formula_is_zero() {
        assert_eq!(eval("", 3), Ok(0));
        assert_eq!(eval("   ", 3), Ok(0));
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(eval("2+3*4", 1), Ok(14));
        assert_eq!(eval("(2+3)*4", 1), Ok(20));
        assert_eq!(eval("-2 - -3", 1), Ok(1));
    }

    #[test]
    fn references_read_level_and_actor_stats() {
        assert_eq!(eval("[level]*2+1", 3), Ok(7));
        assert_eq!(eval("[attack] + [damage_roll]", 1), Ok(5));
        assert_eq!(eval("[encroachment]/10", 1), Ok(6));
        assert_eq!(eval("[hp_max]-[hp]", 1), Ok(18));
    }

    #[test]
    fn division_rounds_down() {
        assert_eq!(eval("7/2", 1), Ok(3));
        assert_eq!(eval("-7/2", 1), Ok(-4));
        assert_eq!(eval("1/0", 1), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        assert_eq!(eval("2 +", 1), Err(FormulaError::UnexpectedEnd));
        assert_eq!(
            eval("[nonsense]", 1),
            Err(FormulaError::UnknownReference("nonsense".into()))
        );
        assert_eq!(eval("[level", 1), Err(FormulaError::UnclosedReference(0)));
        assert_eq!(
            eval("2 3", 1),
            Err(FormulaError::UnexpectedChar {
                ch: '3',
                position: 2
            })
        );
    }
}
