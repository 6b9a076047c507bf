use crate::error::SimError;

/// Power of ten of a time unit string.
pub fn time_scale(unit: &str) -> Result<i8, SimError> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" | "s" => Ok(0),
        _ => Err(SimError::UnknownTimeUnit(unit.to_string())),
    }
}

pub fn scale_time(exp: i8) -> Result<&'static str, SimError> {
    match exp {
        -15 => Ok("fs"),
        -12 => Ok("ps"),
        -9 => Ok("ns"),
        -6 => Ok("us"),
        -3 => Ok("ms"),
        0 => Ok("sec"),
        _ => Err(SimError::UnknownTimeUnit(format!("1e{}", exp))),
    }
}

/// Like `ldexp`, but base 10.
pub fn ldexp10(frac: f64, exp: i8) -> f64 {
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

/// Converts `time` in `unit` to steps of a simulator with the given precision.
/// Fails instead of rounding.
pub fn to_steps(time: f64, unit: &str, precision: i8) -> Result<u64, SimError> {
    let steps = ldexp10(time, time_scale(unit)? - precision);
    if steps >= 0.0 && steps % 1.0 == 0.0 {
        Ok(steps as u64)
    } else {
        Err(SimError::TimeRounding {
            time,
            unit: unit.to_string(),
            precision: scale_time(precision)?.to_string(),
        })
    }
}

/// Converts steps back to `unit`. Precision may be lost.
pub fn from_steps(steps: u64, unit: &str, precision: i8) -> Result<f64, SimError> {
    Ok(ldexp10(steps as f64, precision - time_scale(unit)?))
}
