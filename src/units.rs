// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Mapping of Grafana unit codes onto the shared `standards.units` library.

/// Units understood by the generated panel library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Requests per second (`reqps`).
    RequestRate,
    /// Fraction in `0.0..=1.0` (`percentunit`).
    Percent01,
    /// Whole-number percentage (`percent`).
    Percent100,
    /// Seconds (`s`).
    Seconds,
    /// Milliseconds (`ms`).
    Milliseconds,
    /// Bytes (`bytes`).
    Bytes,
    /// Plain count (`short`).
    Count
}

impl Unit {
    /// Resolves a Grafana unit code. Unknown codes are not an error: they map
    /// to `None` and the panel simply carries no unit annotation.
    ///
    /// # Examples
    ///
    /// ```
    /// use grafonnet_scaffold::Unit;
    ///
    /// assert_eq!(Unit::from_code("reqps"), Some(Unit::RequestRate));
    /// assert_eq!(Unit::from_code("decbytes"), None);
    /// ```
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "reqps" => Some(Self::RequestRate),
            "percentunit" => Some(Self::Percent01),
            "percent" => Some(Self::Percent100),
            "s" => Some(Self::Seconds),
            "ms" => Some(Self::Milliseconds),
            "bytes" => Some(Self::Bytes),
            "short" => Some(Self::Count),
            _ => None
        }
    }

    /// Jsonnet expression referencing the unit in `standards.libsonnet`.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::RequestRate => "standards.units.qps",
            Self::Percent01 => "standards.units.percent01",
            Self::Percent100 => "standards.units.percent100",
            Self::Seconds => "standards.units.seconds",
            Self::Milliseconds => "standards.units.milliseconds",
            Self::Bytes => "standards.units.bytes",
            Self::Count => "standards.units.count"
        }
    }
}

/// Normalizes an optional unit code into its library symbol.
pub fn normalize_unit(code: Option<&str>) -> Option<&'static str> {
    code.filter(|value| !value.is_empty())
        .and_then(Unit::from_code)
        .map(Unit::symbol)
}

#[cfg(test)]
mod tests {
    use super::{Unit, normalize_unit};

    #[test]
    fn known_codes_map_to_symbols() {
        let cases = [
            ("reqps", "standards.units.qps"),
            ("percentunit", "standards.units.percent01"),
            ("percent", "standards.units.percent100"),
            ("s", "standards.units.seconds"),
            ("ms", "standards.units.milliseconds"),
            ("bytes", "standards.units.bytes"),
            ("short", "standards.units.count")
        ];

        for (code, symbol) in cases {
            assert_eq!(normalize_unit(Some(code)), Some(symbol), "code {code}");
        }
    }

    #[test]
    fn unknown_or_missing_codes_yield_none() {
        assert_eq!(normalize_unit(None), None);
        assert_eq!(normalize_unit(Some("")), None);
        assert_eq!(normalize_unit(Some("dtdurations")), None);
        assert_eq!(normalize_unit(Some("MS")), None);
    }

    #[test]
    fn from_code_is_case_sensitive() {
        assert_eq!(Unit::from_code("s"), Some(Unit::Seconds));
        assert_eq!(Unit::from_code("S"), None);
    }
}
