use femcore::dual::{Dual, Number};
use matrixcompare::assert_scalar_eq;

fn cubic_plus_exp<N: Number<f64>>(x: N) -> N {
    x.powi(3) * 2.0 + x.exp() - N::one() / x
}

#[test]
fn dual_numbers_carry_exact_derivatives() {
    let x = 0.7;
    let result = cubic_plus_exp(Dual::new(x, 1.0));
    let expected_value = 2.0 * x * x * x + f64::exp(x) - 1.0 / x;
    let expected_derivative = 6.0 * x * x + f64::exp(x) + 1.0 / (x * x);
    assert_scalar_eq!(result.value, expected_value, comp = abs, tol = 1e-14);
    assert_scalar_eq!(result.derivative, expected_derivative, comp = abs, tol = 1e-13);

    // The plain evaluation agrees with the value part
    assert_scalar_eq!(cubic_plus_exp(x), expected_value, comp = abs, tol = 1e-14);
}

#[test]
fn constants_have_zero_derivative() {
    let c = Dual::constant(3.0);
    let x = Dual::new(2.0, 1.0);
    let product = c * x + c;
    assert_eq!(product, Dual::new(9.0, 3.0));
    assert_eq!((-x).derivative, -1.0);
    assert_eq!(Number::<f64>::value(&product), 9.0);
}

#[test]
fn finiteness_checks_both_parts() {
    assert!(Number::<f64>::is_finite(&Dual::new(1.0, 2.0)));
    assert!(!Number::<f64>::is_finite(&Dual::new(1.0, f64::NAN)));
    assert!(!Number::<f64>::is_finite(&Dual::new(f64::INFINITY, 0.0)));
    let zero = Dual::new(0.0, 1.0);
    assert!(!Number::<f64>::is_finite(&(Dual::constant(1.0) / zero)));
}
