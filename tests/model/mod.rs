//! Tests for building models from equation strings

use eqfit_rs::equation::{normalize_exponent, split_equation, EquationForm};
use eqfit_rs::model::{build_model, compose_split, infer_parameters, ModelShape, BREAKPOINT};
use eqfit_rs::parameters::{Bounds, Expression};
use eqfit_rs::{parse_and_build, EqFitError, Model};
use ndarray::array;
use std::collections::BTreeMap;

fn values(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_parameters_match_inferred_symbols() {
    for equation in [
        "a*x**b*exp(-c*x)",
        "m*x + c",
        "amp*sin(freq*x + phase) + offset",
        "log(k*x, 10) + pi",
    ] {
        let expr = Expression::parse(equation).unwrap();
        let model = parse_and_build(equation).unwrap();
        assert_eq!(model.parameter_names(), infer_parameters(&expr).unwrap());
        assert!(!model.is_split());
    }
}

#[test]
fn test_building_is_idempotent() {
    let first = parse_and_build("a*x|b*x+c|1;5").unwrap();
    let second = parse_and_build("a*x|b*x+c|1;5").unwrap();
    assert_eq!(first, second);

    let expr = Expression::parse("a*x + b").unwrap();
    let names = infer_parameters(&expr).unwrap();
    assert_eq!(
        build_model(&expr, &names).unwrap(),
        build_model(&expr, &names).unwrap()
    );
}

#[test]
fn test_x_cannot_be_a_parameter() {
    let expr = Expression::parse("a*x").unwrap();
    let err = build_model(&expr, &["a".to_string(), "x".to_string()]).unwrap_err();
    assert!(matches!(err, EqFitError::InvalidEquationFormat(_)), "{:?}", err);
    assert!(err.to_string().contains("independent variable"));
}

#[test]
fn test_split_shares_parameters() {
    let model = parse_and_build("a*x + b|a*x**2 + c").unwrap();
    assert_eq!(model.parameter_names(), vec!["a", "b", "c", BREAKPOINT]);

    // one value of `a` drives both branches
    let vals = values(&[("a", 2.0), ("b", 1.0), ("c", -1.0), ("x0", 1.0)]);
    let y = model.evaluate(&array![1.0, 3.0], &vals).unwrap();
    assert_eq!(y, array![3.0, 17.0]);
}

#[test]
fn test_breakpoint_in_branch_is_the_breakpoint() {
    let model = parse_and_build("a|a + b*(x - x0)").unwrap_err();
    assert!(matches!(model, EqFitError::MissingVariable(_)));

    let model = parse_and_build("a + 0*x|a + b*(x - x0)").unwrap();
    assert_eq!(model.parameter_names(), vec!["a", "b", "x0"]);
    assert_eq!(model.parameters().len(), 3);

    let vals = values(&[("a", 1.0), ("b", 2.0), ("x0", 2.0)]);
    let y = model.evaluate(&array![0.0, 2.0, 3.0, 5.0], &vals).unwrap();
    assert_eq!(y, array![1.0, 1.0, 3.0, 7.0]);
    assert!(model.breakpoint().unwrap().referenced);
}

#[test]
fn test_breakpoint_bounds() {
    let model = parse_and_build("a*x|b*x|1;5").unwrap();
    let x0 = model.parameters().get(BREAKPOINT).unwrap();
    assert_eq!((x0.min(), x0.max()), (1.0, 5.0));
    assert_eq!(x0.value(), 3.0);

    let model = parse_and_build("a*x|b*x|;5").unwrap();
    let x0 = model.parameters().get(BREAKPOINT).unwrap();
    assert_eq!(x0.min(), f64::NEG_INFINITY);
    assert_eq!(x0.max(), 5.0);

    let model = parse_and_build("a*x|b*x| -2 ; ").unwrap();
    let x0 = model.parameters().get(BREAKPOINT).unwrap();
    assert_eq!((x0.min(), x0.max()), (-2.0, f64::INFINITY));

    let model = parse_and_build("a*x|b*x").unwrap();
    let x0 = model.parameters().get(BREAKPOINT).unwrap();
    assert_eq!(x0.bounds(), Bounds::unbounded());
}

#[test]
fn test_invalid_equation_format() {
    for equation in ["a*x|b*x|1;5|c*x", "||||"] {
        assert!(
            matches!(
                parse_and_build(equation),
                Err(EqFitError::InvalidEquationFormat(_))
            ),
            "{}",
            equation
        );
    }
}

#[test]
fn test_invalid_bounds() {
    for equation in [
        "a*x|b*x|5;1",
        "a*x|b*x|1",
        "a*x|b*x|1;2;3",
        "a*x|b*x|one;5",
        "a*x|b*x|nan;5",
    ] {
        assert!(
            matches!(parse_and_build(equation), Err(EqFitError::InvalidBounds(_))),
            "{}",
            equation
        );
    }
}

#[test]
fn test_branch_errors_surface() {
    assert!(matches!(parse_and_build("a*x|"), Err(EqFitError::Parse(_))));
    assert!(matches!(parse_and_build("a*(x|b*x"), Err(EqFitError::Parse(_))));
    assert!(matches!(parse_and_build("c"), Err(EqFitError::MissingVariable(_))));
}

#[test]
fn test_exponent_shorthand() {
    assert!(matches!(parse_and_build("a*x^2"), Err(EqFitError::Parse(_))));
    let model = parse_and_build(&normalize_exponent("a*x^2 + b")).unwrap();
    assert_eq!(model.to_string(), "y = a*x**2+b");
}

#[test]
fn test_compose_split_by_hand() {
    let left = parse_and_build("a*x").unwrap();
    let right = parse_and_build("a*x + b").unwrap();
    let model = compose_split(left, right, Bounds::new(0.0, 1.0).unwrap()).unwrap();

    assert!(matches!(model.shape(), ModelShape::Split { .. }));
    assert_eq!(model.parameter_names(), vec!["a", "b", "x0"]);

    let nested = compose_split(model.clone(), parse_and_build("c*x").unwrap(), Bounds::unbounded());
    assert!(matches!(nested, Err(EqFitError::InvalidEquationFormat(_))));
}

#[test]
fn test_split_equation_keeps_raw_pieces() {
    assert_eq!(
        split_equation(" a*x | b*x ").unwrap(),
        EquationForm::Split {
            left: " a*x ",
            right: " b*x ",
            bounds: None
        }
    );
}

#[test]
fn test_residuals_length_mismatch() {
    let model = parse_and_build("a*x").unwrap();
    let err = model
        .residuals(&array![1.0, 2.0], &array![1.0], &values(&[("a", 1.0)]))
        .unwrap_err();
    assert!(matches!(err, EqFitError::DimensionMismatch(_)));
}
