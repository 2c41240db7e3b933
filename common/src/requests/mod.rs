use serde::{Deserialize, Serialize};

const DEFAULT_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 1000;

fn default_true() -> bool {
    true
}

/// Options sent as the `options` JSON part of `POST /api/import/upload`.
///
/// Every field is optional on the wire; missing fields take the defaults below.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Compute the would-be effects and roll everything back.
    #[serde(default)]
    pub dry_run: bool,
    /// Rows between two progress updates; see [`ImportOptions::batch_size`].
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Skip the per-row field checks that add warnings.
    #[serde(default)]
    pub skip_validation: bool,
    /// Skip resolving the assigned agent of each row.
    #[serde(default)]
    pub skip_association: bool,
    /// When `false`, a non-empty `tipo_record` column is taken verbatim.
    #[serde(default = "default_true")]
    pub auto_detect_type: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: None,
            skip_validation: false,
            skip_association: false,
            auto_detect_type: true,
        }
    }
}

impl ImportOptions {
    /// Effective batch size, clamped to `1..=1000` (default 100).
    pub fn batch_size(&self) -> usize {
        match self.batch_size {
            Some(0) | None => DEFAULT_BATCH_SIZE,
            Some(n) => n.min(MAX_BATCH_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let options: ImportOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ImportOptions::default());
        assert!(options.auto_detect_type);
        assert_eq!(options.batch_size(), 100);
    }

    #[test]
    fn batch_size_is_clamped() {
        let options: ImportOptions =
            serde_json::from_str(r#"{"batchSize": 5000, "dryRun": true}"#).unwrap();
        assert!(options.dry_run);
        assert_eq!(options.batch_size(), 1000);

        let options = ImportOptions {
            batch_size: Some(0),
            ..ImportOptions::default()
        };
        assert_eq!(options.batch_size(), 100);

        let options = ImportOptions {
            batch_size: Some(1),
            ..ImportOptions::default()
        };
        assert_eq!(options.batch_size(), 1);
    }

    #[test]
    fn auto_detect_can_be_disabled() {
        let options: ImportOptions =
            serde_json::from_str(r#"{"autoDetectType": false, "skipAssociation": true}"#).unwrap();
        assert!(!options.auto_detect_type);
        assert!(options.skip_association);
    }
}
