//! Lightweight, explicitly invoked rewrite pass for term trees.
//!
//! Differentiation never simplifies, so derivative trees are full of `* 1`, `+ 0` and
//! `h^0` nodes. This pass removes them. It only applies rewrites that are exact in IEEE
//! arithmetic, so `optimize(t).evaluate(p)` returns bit-for-bit the same value as
//! `t.evaluate(p)` for every point (up to the sign of zero). No subtree that reads a
//! coordinate is ever dropped, so a point too short for `t` is rejected by both.
//!
//! Pass pipeline
//! -------------
//!  1. **fold_consts**    – evaluate sums, products and composites of constants.
//!  2. **drop_neutral**   – remove `x + 0`, `x * 1`, unit `General` composites
//!                         and `s * c^0` over a constant `c`.
//!
//! `x * 0` is deliberately left alone: it is NaN when `x` is NaN or infinite.
//!
//! The optimiser iterates the full pipeline until a fix-point is reached.

use log::trace;

use crate::term::{CompositeKind, Term};

/// Run all rewrite passes until nothing changes.
pub fn optimize(term: &Term) -> Term {
    let mut current = term.clone();
    let mut iteration = 0;
    loop {
        let count_before = current.node_count();
        current = drop_neutral(fold_consts(current));
        let count_after = current.node_count();
        trace!("optimize pass {iteration}: {count_before} -> {count_after} nodes");
        iteration += 1;
        if count_after == count_before {
            return current;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Pass 1 – constant folding
// ────────────────────────────────────────────────────────────────────────────
fn fold_consts(term: Term) -> Term {
    match term {
        Term::Constant(_) | Term::Coordinate(_) => term,
        Term::Sum(left, right) => match (fold_consts(*left), fold_consts(*right)) {
            (Term::Constant(a), Term::Constant(b)) => Term::Constant(a + b),
            (l, r) => Term::sum(l, r),
        },
        Term::Product(left, right) => match (fold_consts(*left), fold_consts(*right)) {
            (Term::Constant(a), Term::Constant(b)) => Term::Constant(a * b),
            (l, r) => Term::product(l, r),
        },
        Term::Composite {
            kind,
            scalar,
            power,
            inner,
        } => match fold_consts(*inner) {
            Term::Constant(value) => Term::Constant(kind.apply(scalar, power, value)),
            inner => Term::composite(kind, scalar, power, inner),
        },
    }
}

// ────────────────────────────────────────────────────────────────────────────
//  Pass 2 – neutral element removal
// ────────────────────────────────────────────────────────────────────────────
fn drop_neutral(term: Term) -> Term {
    match term {
        Term::Constant(_) | Term::Coordinate(_) => term,
        Term::Sum(left, right) => match (drop_neutral(*left), drop_neutral(*right)) {
            (x, Term::Constant(zero)) | (Term::Constant(zero), x) if zero == 0.0 => x,
            (l, r) => Term::sum(l, r),
        },
        Term::Product(left, right) => match (drop_neutral(*left), drop_neutral(*right)) {
            (x, Term::Constant(one)) | (Term::Constant(one), x) if one == 1.0 => x,
            (l, r) => Term::product(l, r),
        },
        Term::Composite {
            kind,
            scalar,
            power,
            inner,
        } => {
            let inner = drop_neutral(*inner);
            match kind {
                // s * c^0 == s for every constant c, NaN included
                CompositeKind::General if power == 0.0 && matches!(inner, Term::Constant(_)) => {
                    Term::Constant(scalar)
                }
                CompositeKind::General if scalar == 1.0 && power == 1.0 => inner,
                _ => Term::composite(kind, scalar, power, inner),
            }
        }
    }
}
