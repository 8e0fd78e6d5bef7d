use std::cmp::Ordering;

// 0.0 when there is nothing to divide by
pub fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 { return 0.0; }
    num as f64 / den as f64
}

pub fn round_to(val: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (val * factor).round() / factor
}

// Exact comparison of a/b against c/d. A zero denominator counts as 0/1.
pub fn cmp_fraction(a: u32, b: u32, c: u32, d: u32) -> Ordering {
    let (a, b) = if b == 0 { (0, 1) } else { (a as u64, b as u64) };
    let (c, d) = if d == 0 { (0, 1) } else { (c as u64, d as u64) };

    (a * d).cmp(&(c * b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmp_fraction() {
        assert_eq!(cmp_fraction(1, 2, 2, 4), Ordering::Equal);
        assert_eq!(cmp_fraction(2, 3, 3, 5), Ordering::Greater);
        assert_eq!(cmp_fraction(0, 0, 0, 5), Ordering::Equal);
        assert_eq!(cmp_fraction(0, 0, 1, 5), Ordering::Less);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.6666, 3), 0.667);
        assert_eq!(round_to(2.5, 1), 2.5);
        assert_eq!(ratio(3, 0), 0.0);
    }
}
