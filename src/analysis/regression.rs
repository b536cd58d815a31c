//! Ordinary least squares of incidence on an exposure variable.
//!
//! Reports slope, intercept, correlation coefficient, the two-sided p-value
//! of the slope (Student's t with n − 2 degrees of freedom) and the slope's
//! standard error.

use crate::analysis::stats::{NumericFrame, StatsError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub p_value: f64,
    pub std_err: f64,
    pub n: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit `y = slope·x + intercept` by least squares.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Result<LinearFit, StatsError> {
    let n = xs.len().min(ys.len());
    if n < 3 {
        return Err(StatsError::InsufficientData { needed: 3, got: n });
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let nf = n as f64;
    let mx = xs.iter().sum::<f64>() / nf;
    let my = ys.iter().sum::<f64>() / nf;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return Err(StatsError::ConstantInput);
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let df = nf - 2.0;

    if syy == 0.0 {
        // Flat response: zero slope, nothing to test.
        return Ok(LinearFit {
            slope,
            intercept,
            r_value: 0.0,
            p_value: 1.0,
            std_err: 0.0,
            n,
        });
    }

    let r_value = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let residual_ss = (syy - slope * sxy).max(0.0);
    let std_err = (residual_ss / df / sxx).sqrt();

    let p_value = if std_err == 0.0 {
        0.0
    } else {
        let t = slope / std_err;
        students_t_two_sided(t, df)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_value,
        p_value,
        std_err,
        n,
    })
}

/// Pairs of (x, y) from two frame columns, skipping rows where either side
/// is missing.
pub fn paired_observations(frame: &NumericFrame, x: &str, y: &str) -> (Vec<f64>, Vec<f64>) {
    let (Some(xc), Some(yc)) = (frame.column(x), frame.column(y)) else {
        return (Vec::new(), Vec::new());
    };
    xc.iter()
        .zip(yc)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip()
}

// Statistical helper functions

/// Two-sided tail probability `P(|T| > |t|)` for Student's t.
pub fn students_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation (g = 7, n = 9)
    const C: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let mut a = C[0];
    for (i, c) in C.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized incomplete beta `I_x(a, b)`.
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_bt = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let bt = ln_bt.exp();

    // Use symmetry where the continued fraction converges faster
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * betacf(a, b, x) / a
    } else {
        1.0 - bt * betacf(b, a, 1.0 - x) / b
    }
}

fn betacf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const FPMIN: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}
