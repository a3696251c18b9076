//! Numbers that physics formulas can be written against.
//!
//! A formula written once for a generic `N: Number<T>` can be evaluated with plain values
//! (`N = T`) to obtain residual contributions, or with [`Dual`] numbers to obtain the
//! directional derivative needed for Jacobian entries.
use crate::Real;
use nalgebra::ComplexField;
use num::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// A scalar that supports the arithmetic used by physics formulas.
pub trait Number<T: Real>:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + Add<T, Output = Self>
    + Mul<T, Output = Self>
{
    fn from_real(value: T) -> Self;

    /// The real value, discarding any derivative information.
    fn value(&self) -> T;

    fn powi(self, n: i32) -> Self;

    fn exp(self) -> Self;

    fn is_finite(&self) -> bool;
}

impl<T: Real> Number<T> for T {
    fn from_real(value: T) -> Self {
        value
    }

    fn value(&self) -> T {
        *self
    }

    fn powi(self, n: i32) -> Self {
        ComplexField::powi(self, n)
    }

    fn exp(self) -> Self {
        ComplexField::exp(self)
    }

    fn is_finite(&self) -> bool {
        ComplexField::is_finite(self)
    }
}

/// A forward-mode dual number `value + derivative * eps` with `eps^2 = 0`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Dual<T> {
    pub value: T,
    pub derivative: T,
}

impl<T: Real> Dual<T> {
    pub fn new(value: T, derivative: T) -> Self {
        Self { value, derivative }
    }

    pub fn constant(value: T) -> Self {
        Self::new(value, T::zero())
    }
}

impl<T: Real> Zero for Dual<T> {
    fn zero() -> Self {
        Self::constant(T::zero())
    }

    fn is_zero(&self) -> bool {
        self.value.is_zero() && self.derivative.is_zero()
    }
}

impl<T: Real> One for Dual<T> {
    fn one() -> Self {
        Self::constant(T::one())
    }
}

impl<T: Real> Add for Dual<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.value + rhs.value, self.derivative + rhs.derivative)
    }
}

impl<T: Real> Sub for Dual<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.value - rhs.value, self.derivative - rhs.derivative)
    }
}

impl<T: Real> Mul for Dual<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.value * rhs.value,
            self.derivative * rhs.value + self.value * rhs.derivative,
        )
    }
}

impl<T: Real> Div for Dual<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let denominator = rhs.value * rhs.value;
        Self::new(
            self.value / rhs.value,
            (self.derivative * rhs.value - self.value * rhs.derivative) / denominator,
        )
    }
}

impl<T: Real> Neg for Dual<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.value, -self.derivative)
    }
}

impl<T: Real> Add<T> for Dual<T> {
    type Output = Self;

    fn add(self, rhs: T) -> Self {
        Self::new(self.value + rhs, self.derivative)
    }
}

impl<T: Real> Mul<T> for Dual<T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self::new(self.value * rhs, self.derivative * rhs)
    }
}

impl<T: Real> AddAssign for Dual<T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<T: Real> SubAssign for Dual<T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<T: Real> MulAssign for Dual<T> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<T: Real> Number<T> for Dual<T> {
    fn from_real(value: T) -> Self {
        Self::constant(value)
    }

    fn value(&self) -> T {
        self.value
    }

    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        let n_as_t = T::from_i32(n).expect("Must be able to fit i32 in T");
        let derivative = n_as_t * ComplexField::powi(self.value, n - 1) * self.derivative;
        Self::new(ComplexField::powi(self.value, n), derivative)
    }

    fn exp(self) -> Self {
        let exp = ComplexField::exp(self.value);
        Self::new(exp, exp * self.derivative)
    }

    fn is_finite(&self) -> bool {
        ComplexField::is_finite(&self.value) && ComplexField::is_finite(&self.derivative)
    }
}
