//! Per-criterion comparison of a single performance difference.
//!
//! `d` is always oriented so that a positive value favours the initial
//! alternative (minimized criteria flip the sign before calling in here).
//! Differences and thresholds are exact decimals: every bound is inclusive
//! exactly as written.

use rust_decimal::Decimal;

/// Local concordance in {-1, 0, +1}.
pub fn local_concordance(
    d: Decimal,
    ind: Option<Decimal>,
    weak_pref: Option<Decimal>,
    pref: Option<Decimal>,
) -> i8 {
    if let Some(p) = pref {
        if d <= -p {
            return -1;
        }
        return match (ind, weak_pref) {
            (Some(i), _) => {
                if d >= -i {
                    1
                } else {
                    0
                }
            }
            (None, Some(wp)) => {
                if d > -wp {
                    1
                } else {
                    0
                }
            }
            (None, None) => {
                if d < Decimal::ZERO {
                    -1
                } else {
                    1
                }
            }
        };
    }
    if let Some(i) = ind {
        return if d >= -i { 1 } else { -1 };
    }
    if let Some(wp) = weak_pref {
        return if d > -wp { 1 } else { -1 };
    }
    if d < Decimal::ZERO {
        -1
    } else {
        1
    }
}

/// Local veto: +1 strong, 0 weak, -1 none (also when both thresholds are undefined).
pub fn local_veto(d: Decimal, weak_veto: Option<Decimal>, veto: Option<Decimal>) -> i8 {
    if veto.is_some_and(|v| d <= -v) {
        1
    } else if weak_veto.is_some_and(|wv| d <= -wv) {
        0
    } else {
        -1
    }
}

/// Local counter-veto, the positive mirror of [`local_veto`].
pub fn local_counter_veto(d: Decimal, weak_veto: Option<Decimal>, veto: Option<Decimal>) -> i8 {
    if veto.is_some_and(|v| d >= v) {
        1
    } else if weak_veto.is_some_and(|wv| d >= wv) {
        0
    } else {
        -1
    }
}
