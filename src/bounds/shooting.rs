//! Stage-wise application of the control-input bounds over a shooting horizon.
//!
//! `solution` holds `N` stacked stages of `nuc` entries; `dummy`, `mu` and the bound residuals
//! hold `N` stacked stages of `nub` entries. The block inverses of the parent module are
//! elementwise and apply to the stacked buffers unchanged.

use super::ControlInputBounds;

fn stages<'a>(
    bounds: &ControlInputBounds,
    nuc: usize,
    solution: &'a [f64],
    dummy: &'a [f64],
    mu: &'a [f64],
) -> impl Iterator<Item = (&'a [f64], &'a [f64], &'a [f64])> {
    let nub = bounds.nub().max(1);
    solution
        .chunks_exact(nuc)
        .zip(dummy.chunks_exact(nub))
        .zip(mu.chunks_exact(nub))
        .map(|((uc, d), m)| (uc, d, m))
}

pub fn eval_fonc_hu(
    bounds: &ControlInputBounds,
    nuc: usize,
    solution: &[f64],
    dummy: &[f64],
    mu: &[f64],
    fonc_hu: &mut [f64],
) {
    if bounds.nub() == 0 {
        return;
    }
    for ((uc, d, m), hu) in stages(bounds, nuc, solution, dummy, mu).zip(fonc_hu.chunks_exact_mut(nuc)) {
        bounds.eval_hu(uc, d, m, hu);
    }
}

pub fn eval_fonc_hdummy(
    bounds: &ControlInputBounds,
    nuc: usize,
    solution: &[f64],
    dummy: &[f64],
    mu: &[f64],
    fonc_hdummy: &mut [f64],
) {
    let nub = bounds.nub();
    if nub == 0 {
        return;
    }
    for ((uc, d, m), out) in stages(bounds, nuc, solution, dummy, mu).zip(fonc_hdummy.chunks_exact_mut(nub)) {
        bounds.eval_hdummy(uc, d, m, out);
    }
}

pub fn eval_fonc_hmu(
    bounds: &ControlInputBounds,
    nuc: usize,
    solution: &[f64],
    dummy: &[f64],
    mu: &[f64],
    fonc_hmu: &mut [f64],
) {
    let nub = bounds.nub();
    if nub == 0 {
        return;
    }
    for ((uc, d, m), out) in stages(bounds, nuc, solution, dummy, mu).zip(fonc_hmu.chunks_exact_mut(nub)) {
        bounds.eval_hmu(uc, d, m, out);
    }
}

pub fn retrieve_dummy_update(
    bounds: &ControlInputBounds,
    nuc: usize,
    solution: &[f64],
    dummy: &[f64],
    mu: &[f64],
    solution_update: &[f64],
    dummy_update: &mut [f64],
) {
    let nub = bounds.nub();
    if nub == 0 {
        return;
    }
    for (((uc, d, m), duc), out) in stages(bounds, nuc, solution, dummy, mu)
        .zip(solution_update.chunks_exact(nuc))
        .zip(dummy_update.chunks_exact_mut(nub))
    {
        bounds.retrieve_dummy_update(uc, d, m, duc, out);
    }
}

pub fn retrieve_mu_update(
    bounds: &ControlInputBounds,
    nuc: usize,
    solution: &[f64],
    dummy: &[f64],
    mu: &[f64],
    solution_update: &[f64],
    mu_update: &mut [f64],
) {
    let nub = bounds.nub();
    if nub == 0 {
        return;
    }
    for (((uc, d, m), duc), out) in stages(bounds, nuc, solution, dummy, mu)
        .zip(solution_update.chunks_exact(nuc))
        .zip(mu_update.chunks_exact_mut(nub))
    {
        bounds.retrieve_mu_update(uc, d, m, duc, out);
    }
}
