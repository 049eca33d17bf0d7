//! Closed-loop swing-up of the cart-pole with the multiple-shooting C/GMRES solver.
//!
//! Run with `RUST_LOG=info cargo run --example cartpole`. Logs are written to the system
//! temporary directory.

use std::f64::consts::PI;

use cgmres::problems::CartPole;
use cgmres::utils::rk4;
use cgmres::{CgmresError, Horizon, MultipleShootingCgmresSolver, RunLogger, SolverSettings, ZeroHorizonOcpSolver};

fn main() -> Result<(), CgmresError> {
    env_logger::init();

    let mut ocp = CartPole::default().with_force_bound(-15.0, 15.0, 0.1)?;
    ocp.x_ref = [0.0, PI, 0.0, 0.0];
    let horizon = Horizon::new(2.0, 0.0)?;
    let settings = SolverSettings {
        sampling_time: 0.001,
        zeta: 1000.0,
        max_iter: 50,
        opterr_tol: 1e-6,
        profile_solver: true,
        ..SolverSettings::default()
    };
    const N: usize = 100;
    const KMAX: usize = 5;

    let t0 = 0.0;
    let mut x = vec![0.0; 4];

    let mut initializer = ZeroHorizonOcpSolver::new(ocp.clone(), settings.clone(), 3)?;
    initializer.init_dummy_mu();
    initializer.solve(t0, &x)?;
    log::info!("initial solution: u = {:?}, opt error = {:e}", initializer.uopt(), initializer.opt_error());

    let mut mpc = MultipleShootingCgmresSolver::new(ocp.clone(), horizon, settings.clone(), N, KMAX)?;
    mpc.set_uc(initializer.ucopt())?;
    mpc.init_x_lmd(t0, &x)?;
    mpc.init_dummy_mu();

    let base = std::env::temp_dir().join("cartpole");
    let mut logger = RunLogger::create(&base)?;
    let dt = settings.sampling_time;
    let steps = (10.0 / dt) as usize;
    let mut t = t0;
    for _ in 0..steps {
        mpc.update(t, &x)?;
        let uopt = mpc.uopt();
        let u = uopt[0].to_vec();
        logger.save(t, &x, &u, &uopt, mpc.opt_error())?;
        x = rk4(&ocp, t, dt, &x, &u);
        t += dt;
    }
    logger.flush()?;
    logger.save_profile(&mpc.profile())?;

    println!("{mpc}");
    println!("final state: {x:?}");
    println!("logs written to {}_*.log", base.display());
    Ok(())
}
