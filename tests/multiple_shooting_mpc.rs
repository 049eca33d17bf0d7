//! Closed-loop cart-pole runs with the multiple-shooting C/GMRES solver.

use cgmres::problems::CartPole;
use cgmres::utils::rk4;
use cgmres::{Horizon, MultipleShootingCgmresSolver, SolverSettings, ZeroHorizonOcpSolver};

#[ctor::ctor]
fn init() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .format_module_path(false)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

const N: usize = 20;

fn ocp() -> CartPole {
    CartPole::default().with_force_bound(-15.0, 15.0, 0.1).unwrap()
}

fn seeded_solver(t0: f64, x0: &[f64], kmax: usize) -> MultipleShootingCgmresSolver<CartPole> {
    let settings = SolverSettings { max_iter: 50, profile_solver: true, ..SolverSettings::default() };
    let mut initializer = ZeroHorizonOcpSolver::new(ocp(), settings.clone(), 3).unwrap();
    initializer.init_dummy_mu();
    initializer.solve(t0, x0).unwrap();

    let horizon = Horizon::new(1.0, 0.0).unwrap();
    let mut solver = MultipleShootingCgmresSolver::new(ocp(), horizon, settings, N, kmax).unwrap();
    solver.set_uc(initializer.ucopt()).unwrap();
    solver.init_x_lmd(t0, x0).unwrap();
    solver.init_dummy_mu();
    solver
}

#[test]
fn closed_loop_drives_the_optimality_error_down() {
    let plant = ocp();
    let mut x = vec![0.0; 4];
    let mut t = 0.0;
    let mut solver = seeded_solver(t, &x, N);
    let dt = solver.settings().sampling_time;
    let initial = solver.opt_error_at(t, &x).unwrap();

    for _ in 0..200 {
        solver.update(t, &x).unwrap();
        let u = solver.uopt()[0].to_vec();
        assert!(u[0].is_finite());
        x = rk4(&plant, t, dt, &x, &u);
        t += dt;
    }

    let fin = solver.opt_error_at(t, &x).unwrap();
    assert!(fin.is_finite());
    assert!(fin < initial, "{fin} >= {initial}");
    assert!(fin < 1e-2, "final opt error {fin}");
    assert_eq!(solver.xopt().len(), N);
    assert_eq!(solver.lmdopt().len(), N);
    assert!(solver.dummyopt().iter().all(|d| d[0] >= solver.settings().min_dummy));
    assert_eq!(solver.profile().counts, 200);
}

#[test]
fn solution_is_reported_stage_by_stage() {
    let x = [0.0, 0.3, 0.0, 0.0];
    let mut solver = seeded_solver(0.0, &x, 6);
    solver.update(0.0, &x).unwrap();
    assert_eq!(solver.uopt().len(), N);
    assert_eq!(solver.ucopt().len(), N);
    assert_eq!(solver.muopt().len(), N);
    assert_eq!(solver.opt_error_array().len(), N);
    assert!(solver.gmres_iter() <= 6);
    assert!(solver.update(0.001, &[0.0; 3]).is_err());
}

/// Settings of the long swing-up run: sampling 0.03 s with a matching continuation gain.
fn slow_loop_settings() -> SolverSettings {
    SolverSettings {
        sampling_time: 0.03,
        zeta: 33.3,
        finite_difference_epsilon: 1e-8,
        max_iter: 50,
        opterr_tol: 1e-6,
        ..SolverSettings::default()
    }
}

#[test]
fn hundred_seconds_of_closed_loop_stay_bounded() {
    const N_LONG: usize = 50;
    let plant = ocp();
    let settings = slow_loop_settings();
    let mut x = vec![0.0; 4];
    let mut t = 0.0;

    let mut initializer = ZeroHorizonOcpSolver::new(ocp(), settings.clone(), 1).unwrap();
    initializer.init_dummy_mu();
    initializer.solve(t, &x).unwrap();

    let horizon = Horizon::new(2.0, 0.0).unwrap();
    let mut solver = MultipleShootingCgmresSolver::new(ocp(), horizon, settings.clone(), N_LONG, 5).unwrap();
    solver.set_uc(initializer.ucopt()).unwrap();
    solver.init_x_lmd(t, &x).unwrap();
    solver.init_dummy_mu();

    let dt = settings.sampling_time;
    let steps = (100.0 / dt) as usize;
    let mut worst: f64 = 0.0;
    for _ in 0..steps {
        solver.update(t, &x).unwrap();
        let opt_error = solver.opt_error();
        assert!(opt_error.is_finite(), "t = {t}");
        worst = worst.max(opt_error);
        let u = solver.uopt()[0].to_vec();
        x = rk4(&plant, t, dt, &x, &u);
        t += dt;
    }
    assert!(worst < 1.0, "largest opt error {worst}");
    assert!(x.iter().all(|v| v.is_finite()));
    let fin = solver.opt_error_at(t, &x).unwrap();
    assert!(fin < 1e-2, "final opt error {fin}");
}

#[test]
fn one_tick_at_an_equilibrium_reduces_the_error() {
    let mut rest = ocp();
    rest.x_ref = [0.0; 4];
    let horizon = Horizon::new(2.0, 0.0).unwrap();
    let mut solver = MultipleShootingCgmresSolver::new(rest, horizon, slow_loop_settings(), 50, 5).unwrap();
    let x = [0.0; 4];
    solver.set_u(&[0.5]).unwrap();
    solver.init_x_lmd(0.0, &x).unwrap();
    solver.init_dummy_mu();

    let before = solver.opt_error_at(0.0, &x).unwrap();
    solver.update(0.0, &x).unwrap();
    let after = solver.opt_error_at(0.03, &x).unwrap();
    assert!(before > 0.0);
    assert!(after < before, "{after} >= {before}");
}
