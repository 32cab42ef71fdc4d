//! Tests for the fit engine

use crate::test_helpers::{grid, init_logger, noisy, piecewise};
use approx::assert_relative_eq;
use eqfit_rs::fit::{fit, fit_from_str, fit_with_config, Dataset, FitConfig};
use eqfit_rs::lm::LmConfig;
use eqfit_rs::parameters::Bounds;
use eqfit_rs::{parse_and_build, EqFitError, Model};
use ndarray::{array, Array1};

#[test]
fn test_power_law() {
    init_logger();
    let x: Vec<f64> = (1..=10).map(f64::from).collect();
    let y: Vec<f64> = x.iter().map(|x| 2.0 * x.powi(3)).collect();

    let result = fit_from_str("a*x**b", &x, &y).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-4);
    assert_relative_eq!(result.value("b").unwrap(), 3.0, epsilon = 1e-4);
    assert!(result.chisqr < 1e-8);
    assert_relative_eq!(result.r_squared, 1.0, epsilon = 1e-10);
}

#[test]
fn test_exponential_decay_with_offset() {
    let x = grid(0.0, 0.5, 41);
    let y = x.mapv(|x| 3.0 * (-0.4 * x).exp() + 0.5);

    let result = fit_from_str("a*exp(-k*x) + c", &x, &y).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 3.0, epsilon = 1e-6);
    assert_relative_eq!(result.value("k").unwrap(), 0.4, epsilon = 1e-6);
    assert_relative_eq!(result.value("c").unwrap(), 0.5, epsilon = 1e-6);
}

#[test]
fn test_split_recovers_breakpoint() {
    init_logger();
    let x = grid(0.0, 0.5, 20);
    let y = piecewise(&x, 4.0, |x| 2.0 * x, |x| 20.0 - x);

    let result = fit_from_str("a*x|b*x+c", &x, &y).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-6);
    assert_relative_eq!(result.value("b").unwrap(), -1.0, epsilon = 1e-6);
    assert_relative_eq!(result.value("c").unwrap(), 20.0, epsilon = 1e-6);

    let x0 = result.value("x0").unwrap();
    assert!((x0 - 4.0).abs() <= 0.5, "x0 = {}", x0);
    // the breakpoint sits between the last left point and the first right one
    assert_eq!(x0, 4.25);

    assert_eq!(result.nvarys, 4);
    assert_eq!(result.nfree, 16);
    assert!(result.stderr("x0").is_none());
    assert_eq!(result.var_names, vec!["a", "b", "c"]);
}

#[test]
fn test_breakpoint_respects_bounds() {
    // the true break at x = 10 lies outside 1 <= x0 <= 5
    let x = grid(0.0, 1.0, 21);
    let y = piecewise(&x, 10.0, |x| 2.0 * x, |x| 30.0 - x);

    let result = fit_from_str("a*x|b*x|1;5", &x, &y).unwrap();
    let x0 = result.value("x0").unwrap();
    assert!((1.0..=5.0).contains(&x0));
    assert_eq!(x0, 5.0);
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-6);
}

#[test]
fn test_referenced_breakpoint_is_refined() {
    // hinge at 2.3, between the grid points 2.0 and 2.5
    let x = grid(0.0, 0.5, 11);
    let y = piecewise(&x, 2.3, |_| 1.0, |x| 1.0 + 2.0 * (x - 2.3));

    let result = fit_from_str("a + 0*x|a + b*(x - x0)", &x, &y).unwrap();
    assert_relative_eq!(result.value("x0").unwrap(), 2.3, epsilon = 1e-4);
    assert_relative_eq!(result.value("a").unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(result.value("b").unwrap(), 2.0, epsilon = 1e-6);
    assert_eq!(result.nvarys, 3);
}

#[test]
fn test_fixed_breakpoint() {
    let x = grid(0.0, 1.0, 8);
    let y = piecewise(&x, 3.0, |x| 2.0 * x, |x| 3.0 * x);

    let mut model = parse_and_build("a*x|b*x").unwrap();
    let x0 = model.parameters_mut().get_mut("x0").unwrap();
    x0.set_value(3.0).unwrap();
    x0.set_vary(false);

    let result = fit(&model, &Dataset::new(x, y).unwrap()).unwrap();
    assert_eq!(result.value("x0"), Some(3.0));
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-8);
    assert_relative_eq!(result.value("b").unwrap(), 3.0, epsilon = 1e-8);
    assert_eq!(result.nvarys, 2);
    assert!(result.to_string().contains("(fixed)"));
}

#[test]
fn test_data_shape_mismatch() {
    let err = fit_from_str("a*x", [1.0, 2.0, 3.0, 4.0, 5.0], [1.0, 2.0, 3.0, 4.0]).unwrap_err();
    assert!(matches!(err, EqFitError::DataShape(_)));

    let err = fit_from_str("a*x", Vec::<f64>::new(), Vec::<f64>::new()).unwrap_err();
    assert!(matches!(err, EqFitError::DataShape(_)));

    let err = fit_from_str("a*x", [1.0, f64::NAN], [1.0, 2.0]).unwrap_err();
    assert!(matches!(err, EqFitError::DataShape(_)));
}

#[test]
fn test_equation_errors_surface_before_fitting() {
    let x = [1.0, 2.0, 3.0];
    assert!(matches!(
        fit_from_str("a + b", x, x),
        Err(EqFitError::MissingVariable(_))
    ));
    assert!(matches!(
        fit_from_str("a*x|b*x|c*x|d*x", x, x),
        Err(EqFitError::InvalidEquationFormat(_))
    ));
    assert!(matches!(
        fit_from_str("a*x|b*x|9;1", x, x),
        Err(EqFitError::InvalidBounds(_))
    ));
    assert!(matches!(fit_from_str("a*(x", x, x), Err(EqFitError::Parse(_))));
}

#[test]
fn test_shared_parameter_gets_one_value() {
    let x = grid(0.0, 0.5, 17);
    let y = piecewise(&x, 3.0, |x| 2.0 * x, |x| 2.0 * x + 5.0);

    let result = fit_from_str("a*x|a*x+b", &x, &y).unwrap();
    let values = result.values();
    assert_eq!(values.keys().collect::<Vec<_>>(), vec!["a", "b", "x0"]);
    assert_relative_eq!(values["a"], 2.0, epsilon = 1e-6);
    assert_relative_eq!(values["b"], 5.0, epsilon = 1e-6);

    let y = piecewise(&x, 3.0, |x| 2.0 * x, |x| 2.0 * x + 1.0);
    let result = fit_from_str("a*x|a*x+1", &x, &y).unwrap();
    assert_eq!(result.params.names(), vec!["a", "x0"]);
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-6);
}

#[test]
fn test_fits_are_deterministic() {
    let x = grid(0.0, 0.5, 20);
    let y = noisy(&x, |x| if x <= 4.0 { 2.0 * x } else { 20.0 - x }, 0.2, 11);
    let model = parse_and_build("a*x|b*x+c").unwrap();
    let data = Dataset::new(x, y).unwrap();

    let first = fit(&model, &data).unwrap();
    let second = fit(&model, &data).unwrap();
    assert_eq!(first.values(), second.values());
    assert_eq!(first.chisqr.to_bits(), second.chisqr.to_bits());
    assert_eq!(first.iterations, second.iterations);
}

#[test]
fn test_parallel_scan_matches_serial() {
    let x = grid(0.0, 0.25, 40);
    let y = noisy(&x, |x| if x <= 6.0 { 0.5 * x + 1.0 } else { 10.0 - x }, 0.1, 5);
    let model = parse_and_build("a*x + b|c*x + d").unwrap();
    let data = Dataset::new(x, y).unwrap();

    let serial = fit_with_config(&model, &data, &FitConfig::default().with_parallel(false)).unwrap();
    let parallel = fit_with_config(&model, &data, &FitConfig::default().with_parallel(true)).unwrap();
    assert_eq!(serial.values(), parallel.values());
    assert_eq!(serial.func_evals, parallel.func_evals);
}

#[test]
fn test_evaluate_reproduces_best_fit() {
    let x = grid(0.1, 0.3, 15);
    let y = noisy(&x, |x| 1.5 * x.powf(0.7), 0.05, 3);
    let result = fit_from_str("a*x**b", &x, &y).unwrap();

    let best_fit = result.best_fit().unwrap();
    assert_eq!(result.evaluate(&x).unwrap(), best_fit);
    for ((yi, fi), ri) in y.iter().zip(best_fit.iter()).zip(result.residuals().iter()) {
        assert_relative_eq!(yi - fi, *ri, epsilon = 1e-12);
    }
    assert_relative_eq!(
        result.residuals().dot(result.residuals()),
        result.chisqr,
        epsilon = 1e-12
    );

    // and beyond the data
    let far = result.evaluate(&array![10.0]).unwrap();
    let expected = result.value("a").unwrap() * 10.0_f64.powf(result.value("b").unwrap());
    assert_relative_eq!(far[0], expected, epsilon = 1e-9);
}

#[test]
fn test_domain_error_is_evaluation_error() {
    let err = fit_from_str("log(a - x)", [1.0, 2.0, 3.0], [0.0, 0.0, 0.0]).unwrap_err();
    assert!(matches!(err, EqFitError::Evaluation(_)));

    let err = fit_from_str("a/x", [0.0, 1.0], [1.0, 1.0]).unwrap_err();
    assert!(matches!(err, EqFitError::Evaluation(_)));
}

#[test]
fn test_iteration_budget_is_reported() {
    let config = FitConfig::default().with_lm_config(LmConfig::default().with_max_iterations(1));
    let model = parse_and_build("a*exp(b*x)").unwrap();
    let data = Dataset::new([0.0, 1.0, 2.0, 3.0], [5.0, 3.0, 1.8, 1.1]).unwrap();
    assert!(matches!(
        fit_with_config(&model, &data, &config),
        Err(EqFitError::FitConvergence(_))
    ));
}

#[test]
fn test_noisy_linear_statistics() {
    let x = grid(0.0, 0.2, 51);
    let y = noisy(&x, |x| 3.0 * x + 1.0, 0.1, 42);
    let result = fit_from_str("m*x + c", &x, &y).unwrap();

    assert!((result.value("m").unwrap() - 3.0).abs() < 0.02);
    assert!((result.value("c").unwrap() - 1.0).abs() < 0.1);
    assert_eq!(result.ndata, 51);
    assert_eq!(result.nfree, 49);
    assert_relative_eq!(result.redchi, result.chisqr / 49.0);
    assert!(result.redchi < 0.01);
    assert!(result.r_squared > 0.999);

    let stderr_m = result.stderr("m").unwrap();
    let stderr_c = result.stderr("c").unwrap();
    assert!(stderr_m > 0.0 && stderr_m < 0.01, "stderr(m) = {}", stderr_m);
    assert!(stderr_c > stderr_m);

    // slope and intercept of data starting at x = 0 are anti-correlated
    let correlation = result.correlation.as_ref().unwrap();
    assert!(correlation[[0, 1]] < -0.5);
    assert_relative_eq!(correlation[[0, 0]], 1.0, epsilon = 1e-12);
}

#[test]
fn test_bounded_parameter() {
    let x = grid(0.0, 1.0, 10);
    let y = x.mapv(|x| 3.0 * x - 2.0);
    let mut model = parse_and_build("m*x + c").unwrap();
    model
        .parameters_mut()
        .get_mut("m")
        .unwrap()
        .set_bounds(Bounds::new(0.0, 2.0).unwrap());

    let result = fit(&model, &Dataset::new(x, y).unwrap()).unwrap();
    let m = result.value("m").unwrap();
    assert!((0.0..=2.0).contains(&m));
    assert!(result.to_string().contains("bounds=[0, 2]"));
}

#[test]
fn test_one_sided_bound_does_not_trap_the_start() {
    let x = grid(1.0, 1.0, 10);
    let y = x.mapv(|x| 12.0 * x);

    // the default start of 1 is clamped onto the lower bound
    let mut model = parse_and_build("a*x").unwrap();
    let a = model.parameters_mut().get_mut("a").unwrap();
    a.set_bounds(Bounds::min_only(5.0));
    let result = fit(&model, &Dataset::new(x.clone(), y.clone()).unwrap()).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 12.0, epsilon = 1e-6);

    // a guess exactly on the bound
    let a = model.parameters_mut().get_mut("a").unwrap();
    a.set_init_value(Some(5.0));
    let result = fit(&model, &Dataset::new(x.clone(), y).unwrap()).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 12.0, epsilon = 1e-6);

    let mut model = parse_and_build("a*x").unwrap();
    let a = model.parameters_mut().get_mut("a").unwrap();
    a.set_bounds(Bounds::max_only(-5.0));
    let result = fit(&model, &Dataset::new(x.clone(), x.mapv(|x| -12.0 * x)).unwrap()).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), -12.0, epsilon = 1e-6);
}

#[test]
fn test_guess_on_range_edge_still_moves() {
    let x = grid(0.0, 1.0, 10);
    let y = x.mapv(|x| 1.5 * x - 2.0);
    let mut model = parse_and_build("m*x + c").unwrap();
    let m = model.parameters_mut().get_mut("m").unwrap();
    m.set_bounds(Bounds::new(0.0, 2.0).unwrap());
    m.set_init_value(Some(0.0));

    let result = fit(&model, &Dataset::new(x, y).unwrap()).unwrap();
    assert_relative_eq!(result.value("m").unwrap(), 1.5, epsilon = 1e-6);
    assert_relative_eq!(result.value("c").unwrap(), -2.0, epsilon = 1e-6);
}

#[test]
fn test_no_degrees_of_freedom() {
    let result = fit_from_str("m*x + c", [1.0, 2.0], [3.0, 5.0]).unwrap();
    assert_eq!(result.nfree, 0);
    assert!(result.covariance.is_none());
    assert!(result.stderr("m").is_none());
    assert_relative_eq!(result.value("m").unwrap(), 2.0, epsilon = 1e-8);
    assert_eq!(result.redchi, result.chisqr);
}

#[test]
fn test_constant_response_has_undefined_r_squared() {
    let result = fit_from_str("a + 0*x", [0.0, 1.0, 2.0], [2.0, 2.0, 2.0]).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 2.0, epsilon = 1e-8);
    assert!(result.r_squared.is_nan());
}

#[test]
fn test_initial_guess_is_used() {
    let x = grid(0.0, 0.5, 20);
    let y = x.mapv(|x| (1.3 * x).sin());
    let mut model = parse_and_build("sin(w*x)").unwrap();
    model
        .parameters_mut()
        .get_mut("w")
        .unwrap()
        .set_init_value(Some(1.2));

    let result = fit(&model, &Dataset::new(x, y).unwrap()).unwrap();
    assert_relative_eq!(result.value("w").unwrap(), 1.3, epsilon = 1e-6);
    // the model's own parameters are untouched
    assert_eq!(model.parameters().get("w").unwrap().value(), 1.0);
}

#[test]
fn test_json_report() {
    let x = grid(0.0, 0.5, 20);
    let y = noisy(&x, |x| if x <= 4.0 { 2.0 * x } else { 20.0 - x }, 0.1, 9);
    let result = fit_from_str("a*x|b*x+c", &x, &y).unwrap();

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["ndata"], 20);
    assert_eq!(json["nvarys"], 4);
    assert_eq!(json["var_names"], serde_json::json!(["a", "b", "c"]));
    assert!(json["params"]["params"]["x0"]["stderr"].is_null());
    assert!(json["params"]["params"]["a"]["stderr"].as_f64().unwrap() > 0.0);
    assert_eq!(json["covariance"].as_array().unwrap().len(), 3);
    assert!(json["model"].as_str().unwrap().contains("if x <= x0"));
}

#[test]
fn test_custom_default_initial_value() {
    let x: Array1<f64> = grid(1.0, 1.0, 8);
    let y = x.mapv(|x| 50.0 / x);
    let model = parse_and_build("a/x").unwrap();
    let config = FitConfig::default().with_default_initial_value(10.0);
    let result = fit_with_config(&model, &Dataset::new(x, y).unwrap(), &config).unwrap();
    assert_relative_eq!(result.value("a").unwrap(), 50.0, epsilon = 1e-8);
}
