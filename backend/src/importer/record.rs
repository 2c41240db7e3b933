use std::collections::HashMap;

/// One CSV data row keyed by header name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportRecord {
    values: HashMap<String, String>,
}

impl ImportRecord {
    /// Maps `values` onto `headers` by position; missing values become `""`.
    pub fn from_row(headers: &[String], mut values: Vec<String>) -> Self {
        values.resize(headers.len(), String::new());
        Self {
            values: headers.iter().cloned().zip(values).collect(),
        }
    }

    #[cfg(test)]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// The value under `key`, even when empty.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The value under `key` when it is present and non-empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).filter(|v| !v.is_empty())
    }

    /// First non-empty value among `aliases`, in order.
    pub fn first(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| self.get(alias))
    }

    pub fn has_any(&self, aliases: &[&str]) -> bool {
        self.first(aliases).is_some()
    }
}
