//! End-to-end tests that run the library as a whole on realistic data

use crate::test_helpers::{grid, init_logger};
use eqfit_rs::fit::{fit_with_config, Dataset, FitConfig};
use eqfit_rs::lm::LmConfig;
use eqfit_rs::{fit, fit_from_str, parse_and_build, Model};

/// Decay curve with a fast rise, sampled at x = 0.1, 0.3, ..., 3.7
fn decay_curve() -> Dataset {
    let x = grid(0.1, 0.2, 19);
    let y = vec![
        15.18, 262.94, 337.03, 319.32, 211.86, 100.82, 39.35, 15.52, 7.70, 3.38, 1.83, 0.95, 0.52,
        0.23, 0.12, 0.07, 0.04, 0.02, 0.01,
    ];
    Dataset::new(x, y).unwrap()
}

#[test]
fn test_gamma_like_curve_from_defaults() {
    init_logger();
    let model = parse_and_build("a*x**b*exp(-c*x)").unwrap();
    let result = fit(&model, &decay_curve()).unwrap();

    assert!(result.r_squared > 0.99, "{}", result);
    let (b, c) = (result.value("b").unwrap(), result.value("c").unwrap());
    assert!(b > 2.5 && b < 4.0, "b = {}", b);
    assert!(c > 5.0 && c < 7.5, "c = {}", c);
    // the peak b/c falls where the data peak
    assert!((b / c - 0.5).abs() < 0.2);
    for name in ["a", "b", "c"] {
        assert!(result.stderr(name).unwrap() > 0.0);
    }
}

#[test]
fn test_gamma_like_curve_from_guesses() {
    let mut model = parse_and_build("a*x**b*exp(-c*x)").unwrap();
    for (name, guess) in [("a", 1e4), ("b", 2.5), ("c", 4.0)] {
        model
            .parameters_mut()
            .get_mut(name)
            .unwrap()
            .set_init_value(Some(guess));
    }
    let from_guesses = fit(&model, &decay_curve()).unwrap();
    let from_defaults = fit(&parse_and_build("a*x**b*exp(-c*x)").unwrap(), &decay_curve()).unwrap();

    // both starting points end in the same minimum
    assert!((from_guesses.chisqr - from_defaults.chisqr).abs() < 1e-6 * from_defaults.chisqr);
    assert!((from_guesses.value("b").unwrap() - from_defaults.value("b").unwrap()).abs() < 1e-4);
}

#[test]
fn test_caret_shorthand_and_report() {
    let data = decay_curve();
    let result = fit_from_str("a*x^b*exp(-c*x)", data.x(), data.y()).unwrap();

    let report = result.to_string();
    for section in ["[[Model]]", "[[Fit Statistics]]", "[[Variables]]", "[[Correlations]]"] {
        assert!(report.contains(section), "missing {} in\n{}", section, report);
    }
    assert!(report.contains("y = a*x**b*exp(-c*x)"));
    assert!(report.contains("# data points      = 19"));
    assert!(report.contains("# variables        = 3"));
    assert!(report.contains("+/-"));
}

#[test]
fn test_split_report_marks_profiled_breakpoint() {
    let x = grid(0.0, 0.5, 20);
    let y = x.mapv(|x| if x <= 4.0 { 2.0 * x } else { 20.0 - x });
    let result = fit_from_str("a*x|b*x+c|0;9", &x, &y).unwrap();

    let report = result.to_string();
    assert!(report.contains("y = { a*x if x <= x0; b*x+c if x > x0 }"));
    assert!(report.contains("(profiled)"));
    assert!(report.contains("bounds=[0, 9]"));
}

#[test]
fn test_config_file_round_trip() {
    let config = FitConfig::default()
        .with_parallel(true)
        .with_default_initial_value(0.5)
        .with_lm_config(LmConfig::default().with_max_iterations(250).with_ftol(1e-12));

    let path = std::env::temp_dir().join(format!("eqfit-config-{}.json", std::process::id()));
    config.save_json(&path).unwrap();
    let loaded = FitConfig::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, config);
    assert!(FitConfig::load_json(&path).is_err());

    // a partial file keeps the defaults for everything it leaves out
    let partial = FitConfig::from_json(r#"{ "lm": { "max_iterations": 50 } }"#).unwrap();
    assert_eq!(partial.lm.max_iterations, 50);
    assert_eq!(partial.lm.xtol, LmConfig::default().xtol);
    assert_eq!(partial.default_initial_value, 1.0);

    let result = fit_with_config(
        &parse_and_build("m*x + c").unwrap(),
        &Dataset::new([0.0, 1.0, 2.0, 3.0], [1.0, 3.0, 5.0, 7.0]).unwrap(),
        &loaded,
    )
    .unwrap();
    assert!((result.value("m").unwrap() - 2.0).abs() < 1e-8);
}
