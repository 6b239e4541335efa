#![forbid(unsafe_code)]

//! Target-language expression text with enough precedence information to
//! parenthesize only where the target grammar needs it.

use mzdsl_ast::{BinOp, CmpOp};
use mzdsl_ir::Shape;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Prec {
    Implies,
    Or,
    And,
    Compare,
    Add,
    Mul,
    Unary,
    Atom,
}

impl Prec {
    pub fn tighter(self) -> Prec {
        match self {
            Prec::Implies => Prec::Or,
            Prec::Or => Prec::And,
            Prec::And => Prec::Compare,
            Prec::Compare => Prec::Add,
            Prec::Add => Prec::Mul,
            Prec::Mul => Prec::Unary,
            Prec::Unary | Prec::Atom => Prec::Atom,
        }
    }
}

/// Scalar category of a rendered expression; `None` when it is not a scalar
/// (arrays, records) or could not be determined.
pub type Kind = Option<Shape>;

#[derive(Clone, Debug, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub prec: Prec,
    pub kind: Kind,
}

impl Rendered {
    pub fn new(text: impl Into<String>, prec: Prec, kind: Kind) -> Self {
        Self {
            text: text.into(),
            prec,
            kind,
        }
    }

    pub fn atom(text: impl Into<String>, kind: Kind) -> Self {
        Self::new(text, Prec::Atom, kind)
    }

    /// Text usable as an operand of an operator binding at `min`.
    pub fn at(&self, min: Prec) -> String {
        if self.prec < min {
            format!("({})", self.text)
        } else {
            self.text.clone()
        }
    }

    pub fn is_bool(&self) -> bool {
        self.kind == Some(Shape::Bool)
    }

    /// Arithmetic operand: booleans become `bool2int(..)`.
    pub fn numeric(self) -> Rendered {
        if self.is_bool() {
            Rendered::atom(format!("bool2int({})", self.text), Some(Shape::Int))
        } else {
            self
        }
    }

    /// Boolean operand: numbers are compared against zero.
    pub fn truthy(self) -> Rendered {
        match self.kind {
            Some(Shape::Int) | Some(Shape::Float) => {
                Rendered::new(format!("{} != 0", self.at(Prec::Add)), Prec::Compare, Some(Shape::Bool))
            }
            _ => self,
        }
    }
}

fn arith_kind(a: Kind, b: Kind) -> Kind {
    match (a, b) {
        (Some(Shape::Float), _) | (_, Some(Shape::Float)) => Some(Shape::Float),
        _ => Some(Shape::Int),
    }
}

pub fn binary(left: Rendered, op: BinOp, right: Rendered) -> Rendered {
    let left = left.numeric();
    let right = right.numeric();
    let (sym, prec) = match op {
        BinOp::Add => ("+", Prec::Add),
        BinOp::Sub => ("-", Prec::Add),
        BinOp::Mul => ("*", Prec::Mul),
        BinOp::Div => ("/", Prec::Mul),
        BinOp::FloorDiv => ("div", Prec::Mul),
        BinOp::Mod => ("mod", Prec::Mul),
        BinOp::Pow => {
            let kind = arith_kind(left.kind, right.kind);
            return Rendered::atom(format!("pow({}, {})", left.text, right.text), kind);
        }
    };
    let kind = match op {
        BinOp::Div => Some(Shape::Float),
        _ => arith_kind(left.kind, right.kind),
    };
    Rendered::new(
        format!("{} {sym} {}", left.at(prec), right.at(prec.tighter())),
        prec,
        kind,
    )
}

pub fn negate(operand: Rendered) -> Rendered {
    let operand = operand.numeric();
    let kind = operand.kind;
    Rendered::new(format!("-{}", operand.at(Prec::Unary)), Prec::Unary, kind)
}

pub fn not(operand: Rendered) -> Rendered {
    let operand = operand.truthy();
    Rendered::new(format!("not {}", operand.at(Prec::Unary)), Prec::Unary, Some(Shape::Bool))
}

pub fn compare(left: &Rendered, op: CmpOp, right: &Rendered) -> Rendered {
    let sym = match op {
        CmpOp::Eq => "=",
        CmpOp::Ne => "!=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    };
    Rendered::new(
        format!("{} {sym} {}", left.at(Prec::Add), right.at(Prec::Add)),
        Prec::Compare,
        Some(Shape::Bool),
    )
}

/// N-ary `/\`; an empty conjunction is `true`.
pub fn conjunction(items: Vec<Rendered>) -> Rendered {
    join_logical(items, "/\\", Prec::And, "true")
}

/// N-ary `\/`; an empty disjunction is `false`.
pub fn disjunction(items: Vec<Rendered>) -> Rendered {
    join_logical(items, "\\/", Prec::Or, "false")
}

fn join_logical(items: Vec<Rendered>, sym: &str, prec: Prec, empty: &str) -> Rendered {
    let mut items: Vec<Rendered> = items.into_iter().map(Rendered::truthy).collect();
    match items.len() {
        0 => Rendered::atom(empty, Some(Shape::Bool)),
        1 => items.remove(0),
        _ => {
            let text = items
                .iter()
                .map(|r| r.at(prec))
                .collect::<Vec<_>>()
                .join(&format!(" {sym} "));
            Rendered::new(text, prec, Some(Shape::Bool))
        }
    }
}

/// N-ary `+`; an empty sum is `0`.
pub fn sum(items: Vec<Rendered>) -> Rendered {
    let mut iter = items.into_iter();
    let Some(first) = iter.next() else {
        return Rendered::atom("0", Some(Shape::Int));
    };
    iter.fold(first.numeric(), |acc, item| binary(acc, BinOp::Add, item))
}

pub fn if_then_else(cond: Rendered, then: Rendered, otherwise: Rendered) -> Rendered {
    let kind = if then.kind == otherwise.kind {
        then.kind
    } else {
        arith_kind(then.kind, otherwise.kind)
    };
    Rendered::atom(
        format!("if {} then {} else {} endif", cond.truthy().text, then.text, otherwise.text),
        kind,
    )
}

pub fn call(name: &str, args: &[Rendered], kind: Kind) -> Rendered {
    let args = args.iter().map(|a| a.text.as_str()).collect::<Vec<_>>().join(", ");
    Rendered::atom(format!("{name}({args})"), kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(text: &str) -> Rendered {
        Rendered::atom(text, Some(Shape::Int))
    }

    #[test]
    fn parenthesizes_lower_precedence_operands() {
        let sum = binary(int("a"), BinOp::Add, int("b"));
        let product = binary(sum.clone(), BinOp::Mul, int("c"));
        assert_eq!(product.text, "(a + b) * c");
        let nested = binary(int("c"), BinOp::Sub, sum);
        assert_eq!(nested.text, "c - (a + b)");
    }

    #[test]
    fn booleans_are_coerced_in_arithmetic() {
        let eq = compare(&int("x[1]"), CmpOp::Eq, &int("1"));
        let term = binary(eq, BinOp::Mul, int("4"));
        assert_eq!(term.text, "bool2int(x[1] = 1) * 4");
    }

    #[test]
    fn numbers_are_truthy_in_logic() {
        let both = conjunction(vec![int("x"), Rendered::atom("b", Some(Shape::Bool))]);
        assert_eq!(both.text, "x != 0 /\\ b");
        assert_eq!(conjunction(Vec::new()).text, "true");
        assert_eq!(disjunction(Vec::new()).text, "false");
    }

    #[test]
    fn disjunction_inside_conjunction_is_wrapped() {
        let b = |t: &str| Rendered::atom(t, Some(Shape::Bool));
        let or = disjunction(vec![b("a"), b("b")]);
        assert_eq!(conjunction(vec![or, b("c")]).text, "(a \\/ b) /\\ c");
    }

    #[test]
    fn negation_of_a_sum() {
        let sum = binary(int("a"), BinOp::Add, int("b"));
        assert_eq!(negate(sum).text, "-(a + b)");
        assert_eq!(not(Rendered::atom("p", Some(Shape::Bool))).text, "not p");
    }
}
