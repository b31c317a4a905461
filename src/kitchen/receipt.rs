// src/kitchen/receipt.rs

//! Install receipts
//!
//! Every keg carries an `INSTALL_RECEIPT.json` recording what was installed
//! and how. The receipt holds no timestamps or host details, so two
//! installs of the same formula produce the same bytes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// File name of the receipt inside the keg
pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub source: ReceiptSource,
    /// `source`, or `bottle:<platform>`
    pub poured_from: String,
    /// Runtime dependency names; build-only dependencies are never recorded
    #[serde(default)]
    pub runtime_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSource {
    pub url: String,
    pub checksum: String,
}

impl InstallReceipt {
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Encode(format!("install receipt: {}", e)))?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("install receipt: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> InstallReceipt {
        InstallReceipt {
            name: "transmission".into(),
            version: "2.94".into(),
            source: ReceiptSource {
                url: "https://example.com/transmission-2.94.tar.xz".into(),
                checksum: "sha256:35442cc849f91f8df982c3d0d479d650c6ca19310a994eccdaa79a4af3916b7d".into(),
            },
            poured_from: "source".into(),
            runtime_dependencies: vec!["libevent".into()],
        }
    }

    #[test]
    fn test_receipt_json() {
        let json = receipt().to_json().unwrap();
        assert!(json.contains("\"poured_from\": \"source\""));
        assert!(json.contains("\"libevent\""));
        assert!(json.ends_with("}\n"));
        assert_eq!(InstallReceipt::from_json(&json).unwrap(), receipt());
    }

    #[test]
    fn test_receipt_rejects_garbage() {
        assert!(matches!(InstallReceipt::from_json("{"), Err(Error::Parse(_))));
    }
}
