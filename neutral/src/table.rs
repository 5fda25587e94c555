//! Energy-indexed cross-section tables.

use super::error::{Error, Result};

/// A piecewise-linear microscopic cross section over an energy-sorted table.
///
/// Keys are energies in eV, values are cross sections in barns. Keys must be
/// strictly increasing; lookups outside `[keys[0], keys[N-1]]` are a fatal
/// configuration error because the injector guarantees in-range energies
/// during normal operation.
#[derive(Clone, Debug)]
pub struct CrossSection {
    keys: Vec<f64>,
    values: Vec<f64>,
}

impl CrossSection {
    /// Builds a table from sorted `keys` and their `values`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableNotMonotone`] if the keys are not strictly
    /// increasing, or if the arrays differ in length or hold fewer than two
    /// entries.
    pub fn new(keys: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if keys.len() != values.len() || keys.len() < 2 {
            return Err(Error::TableNotMonotone { index: 0 });
        }
        if let Some(index) = keys.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(Error::TableNotMonotone { index: index + 1 });
        }

        Ok(Self { keys, values })
    }

    /// Parses a table from plain text: one `energy value` pair per line,
    /// blank lines and `#` comments ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableNotMonotone`] for unparsable lines or keys that
    /// are not strictly increasing.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut keys = Vec::new();
        let mut values = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let parsed = fields
                .next()
                .zip(fields.next())
                .and_then(|(key, value)| key.parse().ok().zip(value.parse().ok()));
            let Some((key, value)) = parsed else {
                return Err(Error::TableNotMonotone { index });
            };
            keys.push(key);
            values.push(value);
        }

        Self::new(keys, values)
    }

    /// Number of table entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the table holds no entries. A successfully
    /// constructed table never is.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lowest and highest tabulated energy, in eV.
    #[must_use]
    pub fn energy_bounds(&self) -> (f64, f64) {
        (self.keys[0], self.keys[self.keys.len() - 1])
    }

    /// Returns the linearly interpolated microscopic cross section at
    /// `energy`, together with the lower bracketing bin index.
    ///
    /// `hint` is the bin index of a previous lookup; when the energy still
    /// falls inside the hinted bin no search is performed. Otherwise a
    /// binary search starts at the middle of the table with a stride that
    /// halves each step, clamped to one so that the final approach is a
    /// directed walk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CrossSectionOutOfRange`] if `energy` lies outside
    /// the tabulated range.
    pub fn microscopic(&self, energy: f64, hint: Option<usize>) -> Result<(f64, usize)> {
        let last = self.keys.len() - 1;
        if !(energy >= self.keys[0] && energy <= self.keys[last]) {
            return Err(Error::CrossSectionOutOfRange { energy });
        }

        if let Some(index) = hint {
            if index < last && self.keys[index] <= energy && energy < self.keys[index + 1] {
                return Ok((self.interpolate(index, energy), index));
            }
        }

        // the top edge has no bin of its own
        if energy == self.keys[last] {
            return Ok((self.interpolate(last - 1, energy), last - 1));
        }

        let mut index = (self.keys.len() / 2).min(last - 1);
        let mut stride = (index / 2).max(1);
        while !(self.keys[index] <= energy && energy < self.keys[index + 1]) {
            index = if energy < self.keys[index] {
                index.saturating_sub(stride)
            } else {
                (index + stride).min(last - 1)
            };
            stride = (stride / 2).max(1);
        }

        Ok((self.interpolate(index, energy), index))
    }

    fn interpolate(&self, index: usize, energy: f64) -> f64 {
        let fraction =
            (energy - self.keys[index]) / (self.keys[index + 1] - self.keys[index]);
        fraction.mul_add(self.values[index + 1] - self.values[index], self.values[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn table() -> CrossSection {
        CrossSection::new(
            vec![1.0, 10.0, 100.0, 1000.0, 10000.0],
            vec![4.0, 8.0, 2.0, 6.0, 6.0],
        )
        .unwrap()
    }

    #[test]
    fn rejects_unsorted_keys() {
        let result = CrossSection::new(vec![1.0, 3.0, 2.0], vec![0.0; 3]);
        assert!(matches!(result, Err(Error::TableNotMonotone { index: 2 })));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(CrossSection::new(vec![1.0, 2.0], vec![0.0]).is_err());
    }

    #[test]
    fn interpolates_between_bins() {
        let (value, index) = table().microscopic(5.5, None).unwrap();
        assert_eq!(index, 0);
        assert_approx_eq!(f64, value, 6.0);

        let (value, index) = table().microscopic(550.0, None).unwrap();
        assert_eq!(index, 2);
        assert_approx_eq!(f64, value, 4.0);
    }

    #[test]
    fn exact_keys_and_edges() {
        let table = table();

        let (value, index) = table.microscopic(1.0, None).unwrap();
        assert_eq!(index, 0);
        assert_approx_eq!(f64, value, 4.0);

        let (value, index) = table.microscopic(10000.0, None).unwrap();
        assert_eq!(index, 3);
        assert_approx_eq!(f64, value, 6.0);
    }

    #[test]
    fn warm_hint_matches_cold_search() {
        let table = table();
        let (_, index) = table.microscopic(550.0, None).unwrap();
        let (warm, warm_index) = table.microscopic(620.0, Some(index)).unwrap();
        let (cold, cold_index) = table.microscopic(620.0, None).unwrap();
        assert_eq!(warm_index, cold_index);
        assert_approx_eq!(f64, warm, cold);

        // a stale hint from a different bin must not be trusted
        let (value, index) = table.microscopic(5.5, Some(3)).unwrap();
        assert_eq!(index, 0);
        assert_approx_eq!(f64, value, 6.0);
    }

    #[test]
    fn out_of_range_is_fatal() {
        assert!(matches!(
            table().microscopic(0.5, None),
            Err(Error::CrossSectionOutOfRange { .. })
        ));
        assert!(matches!(
            table().microscopic(1.0e5, None),
            Err(Error::CrossSectionOutOfRange { .. })
        ));
    }

    #[test]
    fn parses_text_tables() {
        let table = CrossSection::from_text(
            "# scatter cross section\n1.0e-2 10.0\n\n1.0e4 10.0 # flat\n1.0e8 12.0\n",
        )
        .unwrap();
        assert_eq!(table.len(), 3);
        let (value, _) = table.microscopic(1.0, None).unwrap();
        assert_approx_eq!(f64, value, 10.0);
    }

    #[test]
    fn two_entry_table_brackets_everything() {
        let flat = CrossSection::new(vec![1.0e-2, 1.0e8], vec![3.0, 3.0]).unwrap();
        let (value, index) = flat.microscopic(1.0e3, None).unwrap();
        assert_eq!(index, 0);
        assert_approx_eq!(f64, value, 3.0);
    }
}
