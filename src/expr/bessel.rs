//! Bessel functions of the first and second kind for integer orders.
//!
//! Rational/asymptotic approximations for orders 0 and 1, recurrences above that.
//! Accuracy is around 1e-8 which is plenty for geometry formulas.

const SMALL_ARG: f64 = 8.0;
const QUARTER_PI: f64 = 0.785_398_164;
const THREE_QUARTER_PI: f64 = 2.356_194_491;
const TWO_OVER_PI: f64 = 0.636_619_772;

pub(crate) fn j0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < SMALL_ARG {
        let y = x * x;
        let num = 57_568_490_574.0
            + y * (-13_362_590_354.0
                + y * (651_619_640.7
                    + y * (-11_214_424.18 + y * (77_392.330_17 + y * (-184.905_245_6)))));
        let den = 57_568_490_411.0
            + y * (1_029_532_985.0
                + y * (9_494_680.718 + y * (59_272.648_53 + y * (267.853_271_2 + y))));
        num / den
    } else {
        let z = SMALL_ARG / ax;
        let y = z * z;
        let xx = ax - QUARTER_PI;
        let p = 1.0
            + y * (-0.109_862_862_7e-2
                + y * (0.273_451_040_7e-4 + y * (-0.207_337_063_9e-5 + y * 0.209_388_721_1e-6)));
        let q = -0.156_249_999_5e-1
            + y * (0.143_048_876_5e-3
                + y * (-0.691_114_765_1e-5 + y * (0.762_109_516_1e-6 - y * 0.934_935_152e-7)));
        (TWO_OVER_PI / ax).sqrt() * (xx.cos() * p - z * xx.sin() * q)
    }
}

pub(crate) fn j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < SMALL_ARG {
        let y = x * x;
        let num = x
            * (72_362_614_232.0
                + y * (-7_895_059_235.0
                    + y * (242_396_853.1
                        + y * (-2_972_611.439 + y * (15_704.482_60 + y * (-30.160_366_06))))));
        let den = 144_725_228_442.0
            + y * (2_300_535_178.0
                + y * (18_583_304.74 + y * (99_447.433_94 + y * (376.999_139_7 + y))));
        num / den
    } else {
        let z = SMALL_ARG / ax;
        let y = z * z;
        let xx = ax - THREE_QUARTER_PI;
        let p = 1.0
            + y * (0.183_105e-2
                + y * (-0.351_639_649_6e-4 + y * (0.245_752_017_4e-5 + y * (-0.240_337_019e-6))));
        let q = 0.046_874_999_95
            + y * (-0.200_269_087_3e-3
                + y * (0.844_919_909_6e-5 + y * (-0.882_289_87e-6 + y * 0.105_787_412e-6)));
        let ans = (TWO_OVER_PI / ax).sqrt() * (xx.cos() * p - z * xx.sin() * q);
        if x < 0.0 { -ans } else { ans }
    }
}

/// `J_n(x)` for `n >= 0`; `None` for a negative order.
pub(crate) fn jn(n: i64, x: f64) -> Option<f64> {
    match n {
        _ if n < 0 => None,
        0 => Some(j0(x)),
        1 => Some(j1(x)),
        _ => Some(jn_recurrence(n, x)),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn jn_recurrence(n: i64, x: f64) -> f64 {
    const ACC: f64 = 40.0;
    const BIG: f64 = 1.0e10;
    const BIG_INV: f64 = 1.0e-10;

    let ax = x.abs();
    if ax == 0.0 {
        return 0.0;
    }

    let ans = if ax > n as f64 {
        // upward recurrence is stable above the order
        let tox = 2.0 / ax;
        let mut bjm = j0(ax);
        let mut bj = j1(ax);
        for j in 1..n {
            let bjp = j as f64 * tox * bj - bjm;
            bjm = bj;
            bj = bjp;
        }
        bj
    } else {
        // Miller's downward recurrence, normalised by the sum rule
        let tox = 2.0 / ax;
        let start = 2 * ((n + (ACC * n as f64).sqrt() as i64) / 2);
        let mut even = false;
        let mut bjp = 0.0;
        let mut bj = 1.0;
        let mut ans = 0.0;
        let mut sum = 0.0;
        let mut j = start;
        while j > 0 {
            let bjm = j as f64 * tox * bj - bjp;
            bjp = bj;
            bj = bjm;
            if bj.abs() > BIG {
                bj *= BIG_INV;
                bjp *= BIG_INV;
                ans *= BIG_INV;
                sum *= BIG_INV;
            }
            if even {
                sum += bj;
            }
            even = !even;
            if j == n {
                ans = bjp;
            }
            j -= 1;
        }
        sum = 2.0 * sum - bj;
        ans / sum
    };

    if x < 0.0 && n % 2 == 1 { -ans } else { ans }
}

/// `Y_0(x)`; `None` outside the domain `x > 0`.
pub(crate) fn y0(x: f64) -> Option<f64> {
    if x <= 0.0 {
        return None;
    }
    let value = if x < SMALL_ARG {
        let y = x * x;
        let num = -2_957_821_389.0
            + y * (7_062_834_065.0
                + y * (-512_359_803.6
                    + y * (10_879_881.29 + y * (-86_327.927_57 + y * 228.462_273_3))));
        let den = 40_076_544_269.0
            + y * (745_249_964.8
                + y * (7_189_466.438 + y * (47_447.264_70 + y * (226.103_024_4 + y))));
        num / den + TWO_OVER_PI * j0(x) * x.ln()
    } else {
        let z = SMALL_ARG / x;
        let y = z * z;
        let xx = x - QUARTER_PI;
        let p = 1.0
            + y * (-0.109_862_862_7e-2
                + y * (0.273_451_040_7e-4 + y * (-0.207_337_063_9e-5 + y * 0.209_388_721_1e-6)));
        let q = -0.156_249_999_5e-1
            + y * (0.143_048_876_5e-3
                + y * (-0.691_114_765_1e-5 + y * (0.762_109_516_1e-6 + y * (-0.934_945_152e-7))));
        (TWO_OVER_PI / x).sqrt() * (xx.sin() * p + z * xx.cos() * q)
    };
    Some(value)
}

/// `Y_1(x)`; `None` outside the domain `x > 0`.
pub(crate) fn y1(x: f64) -> Option<f64> {
    if x <= 0.0 {
        return None;
    }
    let value = if x < SMALL_ARG {
        let y = x * x;
        let num = x
            * (-0.490_060_494_3e13
                + y * (0.127_527_439_0e13
                    + y * (-0.515_343_813_9e11
                        + y * (0.734_926_455_1e9
                            + y * (-0.423_792_272_6e7 + y * 0.851_193_793_5e4)))));
        let den = 0.249_958_057_0e14
            + y * (0.424_441_966_4e12
                + y * (0.373_365_036_7e10
                    + y * (0.224_590_400_2e8 + y * (0.102_042_605_0e6 + y * (0.354_963_288_5e3 + y)))));
        num / den + TWO_OVER_PI * (j1(x) * x.ln() - 1.0 / x)
    } else {
        let z = SMALL_ARG / x;
        let y = z * z;
        let xx = x - THREE_QUARTER_PI;
        let p = 1.0
            + y * (0.183_105e-2
                + y * (-0.351_639_649_6e-4 + y * (0.245_752_017_4e-5 + y * (-0.240_337_019e-6))));
        let q = 0.046_874_999_95
            + y * (-0.200_269_087_3e-3
                + y * (0.844_919_909_6e-5 + y * (-0.882_289_87e-6 + y * 0.105_787_412e-6)));
        (TWO_OVER_PI / x).sqrt() * (xx.sin() * p + z * xx.cos() * q)
    };
    Some(value)
}

/// `Y_n(x)` for `n >= 0` and `x > 0`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn yn(n: i64, x: f64) -> Option<f64> {
    if n < 0 {
        return None;
    }
    match n {
        0 => y0(x),
        1 => y1(x),
        _ => {
            let tox = 2.0 / x;
            let mut bym = y0(x)?;
            let mut by = y1(x)?;
            for j in 1..n {
                let byp = j as f64 * tox * by - bym;
                bym = by;
                by = byp;
            }
            Some(by)
        }
    }
}
