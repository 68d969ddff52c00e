//! Unit-suffix handling for numeric and symbolic math answers.

/// Normalize a configured unit list: full-width percent becomes `\%` and the
/// empty unit (optional units) moves to the end. Otherwise order is kept, so
/// a unit listed before one of its own suffixes wins (`["m", "cm"]` reads
/// `5cm` as `5c` metres).
pub fn normalize_units(units: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = units
        .iter()
        .filter(|u| !u.is_empty())
        .map(|u| u.replace('％', "\\%"))
        .collect();
    if units.iter().any(String::is_empty) {
        normalized.push(String::new());
    }
    normalized
}

/// Strip one surrounding pair of `$` math-mode markers.
pub fn strip_math_mode(text: &str) -> &str {
    if text.len() > 2 && text.starts_with('$') && text.ends_with('$') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Split a response into its value and the first configured unit it ends
/// with. `None` when no unit in the list matches.
pub fn split_unit<'a>(response: &'a str, units: &[String]) -> Option<(&'a str, String)> {
    let text = strip_math_mode(response.trim());
    normalize_units(units).into_iter().find_map(|unit| {
        text.strip_suffix(unit.as_str())
            .map(|value| (value.trim(), unit.clone()))
    })
}

/// Grade a math response against a solution value with unit handling.
///
/// * `allowed_units == None` or `Some([])`: compare directly.
/// * non-empty list: the response must end with one of the units; the value
///   before it is compared. No matching unit is incorrect.
/// * `legacy_fallback` (only without a unit list, and only for responses that
///   do not look like markup): when the direct comparison fails, retry with
///   the first whitespace-delimited token, then with a trailing `\%` removed.
pub fn grade_with_units(
    solution: &str,
    response: &str,
    allowed_units: Option<&[String]>,
    legacy_fallback: bool,
    compare: impl Fn(&str, &str) -> bool,
) -> bool {
    match allowed_units {
        Some(units) if !units.is_empty() => match split_unit(response, units) {
            Some((value, unit)) => {
                tracing::debug!(unit = %unit, value, "matched unit suffix");
                compare(solution, value)
            }
            None => {
                tracing::debug!(response, "no allowed unit matched");
                false
            }
        },
        _ => {
            if compare(solution, response) {
                return true;
            }
            if !legacy_fallback || allowed_units.is_some() || looks_like_markup(response) {
                return false;
            }
            legacy_retry(solution, response, &compare)
        }
    }
}

fn looks_like_markup(response: &str) -> bool {
    response.trim_start().starts_with('<')
}

fn legacy_retry(solution: &str, response: &str, compare: &impl Fn(&str, &str) -> bool) -> bool {
    let trimmed = response.trim();
    let mut tokens = trimmed.split_whitespace();
    if let (Some(first), Some(_)) = (tokens.next(), tokens.next()) {
        if compare(solution, first) {
            tracing::debug!(response, "legacy fallback matched leading token");
            return true;
        }
    }
    if let Some(value) = trimmed.strip_suffix("\\%") {
        if compare(solution, value.trim()) {
            tracing::debug!(response, "legacy fallback matched without percent");
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    fn numeric(a: &str, b: &str) -> bool {
        match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }

    #[test]
    fn optional_unit() {
        let allowed = units(&["cm", ""]);
        for response in ["5", "5 cm", "5cm", "$5 cm$"] {
            assert!(
                grade_with_units("5", response, Some(&allowed), true, numeric),
                "{response}"
            );
        }
        assert!(!grade_with_units("5", "5 in", Some(&allowed), true, numeric));
    }

    #[test]
    fn required_unit() {
        let allowed = units(&["cm"]);
        assert!(grade_with_units("5", "5cm", Some(&allowed), true, numeric));
        assert!(!grade_with_units("5", "5", Some(&allowed), true, numeric));
        assert!(!grade_with_units("5", "5 m", Some(&allowed), true, numeric));
    }

    #[test]
    fn empty_unit_is_moved_last() {
        assert_eq!(normalize_units(&units(&["", "cm"])), units(&["cm", ""]));
        assert!(grade_with_units("5", "5cm", Some(&units(&["", "cm"])), true, numeric));
    }

    #[test]
    fn full_width_percent() {
        let allowed = units(&["％"]);
        assert_eq!(normalize_units(&allowed), units(&["\\%"]));
        assert!(grade_with_units("50", "50\\%", Some(&allowed), true, numeric));
    }

    #[test]
    fn list_order_is_kept() {
        let (value, unit) = split_unit("5cm", &units(&["m", "cm"])).unwrap();
        assert_eq!((value, unit.as_str()), ("5c", "m"));
    }

    #[test]
    fn forbidden_units_grade_directly() {
        assert!(grade_with_units("5", "5", Some(&[]), true, numeric));
        assert!(!grade_with_units("5", "5 cm", Some(&[]), true, numeric));
    }

    #[test]
    fn legacy_fallback() {
        assert!(grade_with_units("5", "5 apples", None, true, numeric));
        assert!(grade_with_units("50", "50\\%", None, true, numeric));
        assert!(!grade_with_units("5", "5 apples", None, false, numeric));
        assert!(!grade_with_units("5", "<b>5</b> x", None, true, numeric));
    }
}
