//! Built-in operator and statement signatures.
//!
//! Each line of the tables is `name signature`: the first whitespace-separated
//! word is the operator, the rest is parsed with [`Type::parse`].

use std::collections::BTreeMap;

use super::env::TypeEnv;
use super::ty::{ParseTypeError, Type, TypeScheme};

/// Names the comprehension lowering relies on.
pub const BIND: &str = "bind";
pub const GUARD: &str = "guard";
pub const YIELD: &str = "yield";
pub const CONS: &str = ":";
pub const NIL: &str = "[]";

const OPERATORS: &str = "
    +           Number -> Number -> Number
    -           Number -> Number -> Number
    *           Number -> Number -> Number
    /           Number -> Number -> Number
    ^           Number -> Number -> Number
    negate      Number -> Number
    abs         Number -> Number
    sqrt        Number -> Number
    ==          a -> a -> Bool
    !=          a -> a -> Bool
    <           a -> a -> Bool
    <=          a -> a -> Bool
    >           a -> a -> Bool
    >=          a -> a -> Bool
    &&          Bool -> Bool -> Bool
    ||          Bool -> Bool -> Bool
    not         Bool -> Bool
    if          Bool -> a -> a -> a
    ,           a -> b -> pair<a, b>
    fst         pair<a, b> -> a
    snd         pair<a, b> -> b
    :           a -> list<a> -> list<a>
    []          list<a>
    length      list<a> -> Number
    at          list<a> -> Number -> a
    numgen      Number -> Number -> list<Number>
    ++          Text -> Text -> Text
    show        Number -> Text
    bind        list<a> -> (a -> list<b>) -> list<b>
    guard       Bool -> list<a> -> list<a>
    yield       a -> list<a>
    circle      Number -> Picture
    solidCircle Number -> Picture
    rectangle   Number -> Number -> Picture
    text        Text -> Picture
    path        list<pair<Number, Number>> -> Picture
    &           Picture -> Picture -> Picture
    pictures    list<Picture> -> Picture
    translated  Picture -> Number -> Number -> Picture
    rotated     Picture -> Number -> Picture
    scaled      Picture -> Number -> Number -> Picture
    colored     Picture -> Color -> Picture
    rgb         Number -> Number -> Number -> Color
";

const STATEMENTS: &str = "
    drawingOf    Picture
    animationOf  Number -> Picture
";

fn parse_table(table: &str) -> Result<Vec<(String, TypeScheme)>, ParseTypeError> {
    table
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| -> Result<(String, TypeScheme), ParseTypeError> {
            let (name, signature) = line.split_once(char::is_whitespace).ok_or_else(|| {
                ParseTypeError {
                    signature: line.to_string(),
                    reason: "missing signature".to_string(),
                }
            })?;
            Ok((name.to_string(), TypeScheme::parse(signature.trim())?))
        })
        .collect()
}

/// The global environment of built-in operators.
pub fn builtin_env() -> Result<TypeEnv, ParseTypeError> {
    parse_table(OPERATORS).map(TypeEnv::with_bindings)
}

/// Statement blocks and the types of their input slots, in order.
///
/// Slots are separated by `;` since a single slot may itself be a function,
/// as with `animationOf`.
pub fn statement_signatures() -> Result<BTreeMap<String, Vec<Type>>, ParseTypeError> {
    STATEMENTS
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| -> Result<(String, Vec<Type>), ParseTypeError> {
            let (name, slots) = line.split_once(char::is_whitespace).ok_or_else(|| {
                ParseTypeError {
                    signature: line.to_string(),
                    reason: "missing slot types".to_string(),
                }
            })?;
            let slots = slots
                .split(';')
                .map(|slot| Type::parse(slot.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((name.to_string(), slots))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_table_parses() {
        let env = builtin_env().unwrap();
        assert!(env.len() > 30);
        assert_eq!(
            env.lookup("if").map(ToString::to_string),
            Some("forall a. Bool -> a -> a -> a".to_string())
        );
        assert_eq!(
            env.lookup(CONS).map(|s| s.ty.clone()),
            Some(Type::curried(
                [Type::var("a"), Type::list(Type::var("a"))],
                Type::list(Type::var("a"))
            ))
        );
        assert_eq!(
            env.lookup(NIL).map(|s| s.ty.clone()),
            Some(Type::list(Type::var("a")))
        );
    }

    #[test]
    fn test_comprehension_helpers_present() {
        let env = builtin_env().unwrap();
        for name in [BIND, GUARD, YIELD] {
            assert!(env.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_statement_signatures() {
        let statements = statement_signatures().unwrap();
        assert_eq!(statements.get("drawingOf"), Some(&vec![Type::lit("Picture")]));
        assert_eq!(
            statements.get("animationOf"),
            Some(&vec![Type::func(Type::number(), Type::lit("Picture"))])
        );
    }
}
