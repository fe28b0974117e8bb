//! Parameter surface for index construction and querying.
//!
//! Parameters are passed as `key=value` strings grouped into index-time and
//! query-time sets (spec §6). Unknown keys are rejected at construction;
//! there is no silent fallback. Modeled after `VelesConfig`'s layered,
//! validated configuration, but scoped to the flat key=value surface the
//! spec describes rather than a TOML file.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// A flat bag of `key=value` parameters, as accepted by index constructors
/// and query-time setters.
#[derive(Debug, Clone, Default)]
pub struct ParamManager {
    values: HashMap<String, String>,
    consumed: std::cell::RefCell<std::collections::HashSet<String>>,
}

impl ParamManager {
    /// Builds a parameter manager from `key=value` strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an entry isn't of the form `key=value`.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = HashMap::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::config(pair, "expected 'key=value' syntax")
            })?;
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self {
            values,
            consumed: std::cell::RefCell::new(std::collections::HashSet::new()),
        })
    }

    /// Returns an empty parameter set (all defaults).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fetches and parses a parameter, returning `default` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is present but fails to parse,
    /// or fails `validate`.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
    {
        self.consumed.borrow_mut().insert(key.to_string());
        match self.values.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| Error::config(key, format!("cannot parse value '{raw}'"))),
        }
    }

    /// Fetches and parses a required parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the key is absent or fails to parse.
    pub fn get_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
    {
        self.consumed.borrow_mut().insert(key.to_string());
        let raw = self
            .values
            .get(key)
            .ok_or_else(|| Error::config(key, "required parameter missing"))?;
        raw.parse::<T>()
            .map_err(|_| Error::config(key, format!("cannot parse value '{raw}'")))
    }

    /// Validates that every supplied key was consumed by a `get_*` call;
    /// any key left over is unrecognized for this index/space and is
    /// rejected per spec §6 ("unknown keys are rejected").
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first unrecognized key.
    pub fn check_unused(&self) -> Result<()> {
        let consumed = self.consumed.borrow();
        for key in self.values.keys() {
            if !consumed.contains(key) {
                return Err(Error::config(key.clone(), "unrecognized parameter"));
            }
        }
        Ok(())
    }
}

/// Bounds-checks a numeric parameter, producing a [`Error::Config`] naming
/// the key when it falls outside `range`.
///
/// # Errors
///
/// Returns [`Error::Config`] if `value` is outside `range`.
pub fn check_range<T: PartialOrd + std::fmt::Display>(
    key: &str,
    value: T,
    min: T,
    max: T,
) -> Result<T> {
    if value < min || value > max {
        return Err(Error::config(
            key,
            format!("value {value} out of range [{min}, {max}]"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let params = ParamManager::from_pairs(["M=32", "efConstruction=400"]).unwrap();
        let m: usize = params.get_or("M", 16).unwrap();
        let ef: usize = params.get_or("efConstruction", 200).unwrap();
        assert_eq!(m, 32);
        assert_eq!(ef, 400);
        params.check_unused().unwrap();
    }

    #[test]
    fn rejects_unknown_key() {
        let params = ParamManager::from_pairs(["bogus=1"]).unwrap();
        let _m: usize = params.get_or("M", 16).unwrap();
        assert!(params.check_unused().is_err());
    }

    #[test]
    fn rejects_malformed_pair() {
        assert!(ParamManager::from_pairs(["no_equals_sign"]).is_err());
    }

    #[test]
    fn range_check() {
        assert!(check_range("delaunay_type", 5, 0, 3).is_err());
        assert!(check_range("delaunay_type", 2, 0, 3).is_ok());
    }
}
