//! Plaintext logs of a closed-loop run, one file per signal.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::CgmresError;
use crate::utils::timer::TimingProfile;

/// Writes `<name>_t.log`, `<name>_x.log`, `<name>_u.log`, `<name>_uopt.log` and
/// `<name>_opterr.log`, one whitespace-separated line per call of [`RunLogger::save`].
/// A `uopt` line is the predicted input horizon flattened stage by stage.
pub struct RunLogger {
    base: PathBuf,
    t_log: BufWriter<File>,
    x_log: BufWriter<File>,
    u_log: BufWriter<File>,
    uopt_log: BufWriter<File>,
    opterr_log: BufWriter<File>,
}

fn signal_path(base: &Path, signal: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("_{signal}.log"));
    PathBuf::from(name)
}

fn create(base: &Path, signal: &str) -> Result<BufWriter<File>, CgmresError> {
    Ok(BufWriter::new(File::create(signal_path(base, signal))?))
}

fn write_row(w: &mut BufWriter<File>, values: &[f64]) -> Result<(), CgmresError> {
    let mut sep = "";
    for v in values {
        write!(w, "{sep}{v}")?;
        sep = " ";
    }
    writeln!(w)?;
    Ok(())
}

impl RunLogger {
    /// `base` is a path prefix such as `logs/cartpole`; its directory must exist.
    pub fn create(base: impl AsRef<Path>) -> Result<Self, CgmresError> {
        let base = base.as_ref().to_path_buf();
        Ok(Self {
            t_log: create(&base, "t")?,
            x_log: create(&base, "x")?,
            u_log: create(&base, "u")?,
            uopt_log: create(&base, "uopt")?,
            opterr_log: create(&base, "opterr")?,
            base,
        })
    }

    pub fn save(
        &mut self,
        t: f64,
        x: &[f64],
        u: &[f64],
        uopt: &[&[f64]],
        opt_error: f64,
    ) -> Result<(), CgmresError> {
        write_row(&mut self.t_log, &[t])?;
        write_row(&mut self.x_log, x)?;
        write_row(&mut self.u_log, u)?;
        write_row(&mut self.uopt_log, &uopt.concat())?;
        write_row(&mut self.opterr_log, &[opt_error])?;
        Ok(())
    }

    /// Writes `<name>_timing_profile.log`.
    pub fn save_profile(&self, profile: &TimingProfile) -> Result<(), CgmresError> {
        let mut w = create(&self.base, "timing_profile")?;
        writeln!(w, "{profile}")?;
        w.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CgmresError> {
        self.t_log.flush()?;
        self.x_log.flush()?;
        self.u_log.flush()?;
        self.uopt_log.flush()?;
        self.opterr_log.flush()?;
        Ok(())
    }
}
