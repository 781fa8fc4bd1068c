//! Arithmetic operators on [`Var`].
//!
//! Every operator computes the forward value, records the local partial
//! derivatives evaluated at the current operand values, and appends one node.
//! A plain `f64` operand is a constant and gets no edge.
//!
//! | expression | partials            |
//! |------------|---------------------|
//! | `a + b`    | `1`, `1`            |
//! | `a - b`    | `1`, `-1`           |
//! | `a * b`    | `b`, `a`            |
//! | `a / b`    | `1/b`, `-a/b²`      |
//! | `-a`       | `-1`                |
//!
//! The assignment forms (`+=`, `-=`, `*=`, `/=`) build the same node and then
//! rebind the left-hand variable to it.

use crate::node::{BinaryOp, UnaryOp};
use crate::var::Var;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

impl<'a> Add for Var<'a> {
    type Output = Var<'a>;

    fn add(self, rhs: Var<'a>) -> Var<'a> {
        let value = self.val() + rhs.val();
        self.binary(BinaryOp::Add, rhs, value, [1.0, 1.0])
    }
}

impl<'a> Add<f64> for Var<'a> {
    type Output = Var<'a>;

    fn add(self, rhs: f64) -> Var<'a> {
        self.unary(UnaryOp::AddConst, self.val() + rhs, 1.0)
    }
}

impl<'a> Add<Var<'a>> for f64 {
    type Output = Var<'a>;

    fn add(self, rhs: Var<'a>) -> Var<'a> {
        rhs.unary(UnaryOp::AddConst, self + rhs.val(), 1.0)
    }
}

impl<'a> Sub for Var<'a> {
    type Output = Var<'a>;

    fn sub(self, rhs: Var<'a>) -> Var<'a> {
        let value = self.val() - rhs.val();
        self.binary(BinaryOp::Sub, rhs, value, [1.0, -1.0])
    }
}

impl<'a> Sub<f64> for Var<'a> {
    type Output = Var<'a>;

    fn sub(self, rhs: f64) -> Var<'a> {
        self.unary(UnaryOp::SubConst, self.val() - rhs, 1.0)
    }
}

impl<'a> Sub<Var<'a>> for f64 {
    type Output = Var<'a>;

    fn sub(self, rhs: Var<'a>) -> Var<'a> {
        rhs.unary(UnaryOp::ConstSub, self - rhs.val(), -1.0)
    }
}

impl<'a> Mul for Var<'a> {
    type Output = Var<'a>;

    fn mul(self, rhs: Var<'a>) -> Var<'a> {
        let (a, b) = (self.val(), rhs.val());
        self.binary(BinaryOp::Mul, rhs, a * b, [b, a])
    }
}

impl<'a> Mul<f64> for Var<'a> {
    type Output = Var<'a>;

    fn mul(self, rhs: f64) -> Var<'a> {
        self.unary(UnaryOp::MulConst, self.val() * rhs, rhs)
    }
}

impl<'a> Mul<Var<'a>> for f64 {
    type Output = Var<'a>;

    fn mul(self, rhs: Var<'a>) -> Var<'a> {
        rhs.unary(UnaryOp::MulConst, self * rhs.val(), self)
    }
}

impl<'a> Div for Var<'a> {
    type Output = Var<'a>;

    fn div(self, rhs: Var<'a>) -> Var<'a> {
        let b = rhs.val();
        let value = self.val() / b;
        self.binary(BinaryOp::Div, rhs, value, [1.0 / b, -value / b])
    }
}

impl<'a> Div<f64> for Var<'a> {
    type Output = Var<'a>;

    fn div(self, rhs: f64) -> Var<'a> {
        self.unary(UnaryOp::DivConst, self.val() / rhs, 1.0 / rhs)
    }
}

impl<'a> Div<Var<'a>> for f64 {
    type Output = Var<'a>;

    fn div(self, rhs: Var<'a>) -> Var<'a> {
        let b = rhs.val();
        let value = self / b;
        rhs.unary(UnaryOp::ConstDiv, value, -value / b)
    }
}

impl<'a> Neg for Var<'a> {
    type Output = Var<'a>;

    fn neg(self) -> Var<'a> {
        self.unary(UnaryOp::Neg, -self.val(), -1.0)
    }
}

macro_rules! impl_assign_op {
    ($Trait:ident, $method:ident, $op:tt) => {
        impl<'a> $Trait<Var<'a>> for Var<'a> {
            fn $method(&mut self, rhs: Var<'a>) {
                *self = *self $op rhs;
            }
        }

        impl $Trait<f64> for Var<'_> {
            fn $method(&mut self, rhs: f64) {
                *self = *self $op rhs;
            }
        }
    };
}

impl_assign_op!(AddAssign, add_assign, +);
impl_assign_op!(SubAssign, sub_assign, -);
impl_assign_op!(MulAssign, mul_assign, *);
impl_assign_op!(DivAssign, div_assign, /);
