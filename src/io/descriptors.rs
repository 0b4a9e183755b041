//! Band and flag descriptor tables, keyed by product format.
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::io::format::format_key;
use crate::types::{PolMode, RotatedChannel, Split64};

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("I/O error reading descriptors {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Descriptor table {table}: band `{band}` defined twice")]
    DuplicateBand { table: String, band: String },
    #[error("Descriptor table {table}: band `{band}` uses unknown flag coding `{coding}`")]
    UnknownFlagCoding {
        table: String,
        band: String,
        coding: String,
    },
    #[error("Descriptor table {table}: rotated band `{band}` must not name a polarization")]
    RotatedWithPolarization { table: String, band: String },
}

fn one() -> f64 {
    1.0
}

/// One renderable band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandDescriptor {
    pub band_name: String,
    /// Record member the band reads (grid point member, or observation member
    /// when `polarization` is set)
    #[serde(default)]
    pub member: String,
    #[serde(default)]
    pub polarization: Option<PolMode>,
    #[serde(default = "one")]
    pub scaling_factor: f64,
    #[serde(default)]
    pub scaling_offset: f64,
    #[serde(default)]
    pub typical_min: Option<f64>,
    #[serde(default)]
    pub typical_max: Option<f64>,
    /// Raw value marking a missing sample
    #[serde(default)]
    pub fill_value: Option<f64>,
    #[serde(default)]
    pub flag_coding: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub split64: Split64,
    #[serde(default)]
    pub rotation: Option<RotatedChannel>,
}

impl BandDescriptor {
    pub fn is_flag_band(&self) -> bool {
        self.flag_coding.is_some()
    }

    pub fn is_scaled(&self) -> bool {
        self.scaling_factor != 1.0 || self.scaling_offset != 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagDescriptor {
    pub name: String,
    pub mask: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagCoding {
    pub name: String,
    pub flags: Vec<FlagDescriptor>,
}

/// Linear scaling of a raw record member
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemberScaling {
    #[serde(default = "one")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Default for MemberScaling {
    fn default() -> Self {
        Self {
            factor: 1.0,
            offset: 0.0,
        }
    }
}

impl MemberScaling {
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.factor + self.offset
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorTable {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub bands: Vec<BandDescriptor>,
    #[serde(default)]
    pub flag_codings: Vec<FlagCoding>,
    /// Physical scaling of observation members used by derived computations
    #[serde(default)]
    pub member_scaling: HashMap<String, MemberScaling>,
}

impl DescriptorTable {
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        let table: DescriptorTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen = std::collections::HashSet::new();
        for band in &self.bands {
            if !seen.insert(band.band_name.as_str()) {
                return Err(DescriptorError::DuplicateBand {
                    table: self.name.clone(),
                    band: band.band_name.clone(),
                });
            }
            if let Some(coding) = &band.flag_coding {
                if self.flag_coding(coding).is_none() {
                    return Err(DescriptorError::UnknownFlagCoding {
                        table: self.name.clone(),
                        band: band.band_name.clone(),
                        coding: coding.clone(),
                    });
                }
            }
            if band.rotation.is_some() && band.polarization.is_some() {
                return Err(DescriptorError::RotatedWithPolarization {
                    table: self.name.clone(),
                    band: band.band_name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn band(&self, name: &str) -> Option<&BandDescriptor> {
        self.bands.iter().find(|b| b.band_name == name)
    }

    pub fn flag_coding(&self, name: &str) -> Option<&FlagCoding> {
        self.flag_codings.iter().find(|c| c.name == name)
    }

    pub fn member_scaling(&self, member: &str) -> MemberScaling {
        self.member_scaling.get(member).copied().unwrap_or_default()
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.iter().map(|b| b.band_name.as_str())
    }
}

const BUNDLED: &[&str] = &[
    include_str!("../../resources/descriptors/dbl_sm_xxxx_mir_sclf1c_0400.json"),
    include_str!("../../resources/descriptors/dbl_sm_xxxx_mir_scld1c_0400.json"),
    include_str!("../../resources/descriptors/dbl_sm_xxxx_mir_bwlf1c_0400.json"),
    include_str!("../../resources/descriptors/dbl_sm_xxxx_mir_bwld1c_0400.json"),
    include_str!("../../resources/descriptors/dbl_sm_xxxx_mir_smudp2_0400.json"),
    include_str!("../../resources/descriptors/dbl_sm_xxxx_mir_osudp2_0400.json"),
    include_str!("../../resources/descriptors/dbl_sm_xxxx_aux_dgglsm_0001.json"),
];

#[derive(Debug, Default, Clone)]
pub struct DescriptorRegistry {
    tables: HashMap<String, Arc<DescriptorTable>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundled() -> Result<Self, DescriptorError> {
        let mut reg = Self::new();
        for json in BUNDLED {
            reg.insert_json(json)?;
        }
        Ok(reg)
    }

    pub fn insert_json(&mut self, json: &str) -> Result<Arc<DescriptorTable>, DescriptorError> {
        let table = Arc::new(DescriptorTable::from_json(json)?);
        self.tables.insert(format_key(&table.name), table.clone());
        for alias in &table.aliases {
            self.tables.insert(format_key(alias), table.clone());
        }
        Ok(table)
    }

    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, DescriptorError> {
        let io_err = |source| DescriptorError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let json = std::fs::read_to_string(&path).map_err(|source| DescriptorError::Io {
                path: path.display().to_string(),
                source,
            })?;
            self.insert_json(&json)?;
            loaded += 1;
        }
        info!("Loaded {} descriptor table(s) from {:?}", loaded, dir);
        Ok(loaded)
    }

    pub fn get(&self, format: &str) -> Option<Arc<DescriptorTable>> {
        self.tables.get(&format_key(format)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_tables_load() {
        let reg = DescriptorRegistry::with_bundled().unwrap();
        let science = reg.get("DBL_SM_OPER_MIR_SCSF1C_0400").unwrap();
        let bt_h = science.band("BT_Value_H").unwrap();
        assert_eq!(bt_h.rotation, Some(RotatedChannel::BtH));
        let flags = science.band("Flags_X").unwrap();
        assert!(flags.is_flag_band());
        assert_eq!(flags.polarization, Some(PolMode::X));
        let inc = science.member_scaling("Incidence_Angle");
        assert!((inc.apply(65536.0) - 90.0).abs() < 1e-9);
        assert_eq!(science.member_scaling("Nope"), MemberScaling::default());

        let l2 = reg.get("DBL_SM_XXXX_MIR_SMUDP2_0400").unwrap();
        assert_eq!(l2.band("Days").unwrap().split64, Split64::High32);
    }

    #[test]
    fn rejects_unknown_flag_coding() {
        let json = r#"{"name": "T", "bands": [
            {"band_name": "F", "member": "Flags", "flag_coding": "missing"}
        ]}"#;
        assert!(matches!(
            DescriptorTable::from_json(json),
            Err(DescriptorError::UnknownFlagCoding { .. })
        ));
    }

    #[test]
    fn defaults_apply() {
        let json = r#"{"name": "T", "bands": [{"band_name": "A", "member": "A"}]}"#;
        let table = DescriptorTable::from_json(json).unwrap();
        let a = table.band("A").unwrap();
        assert_eq!(a.scaling_factor, 1.0);
        assert!(!a.is_scaled());
        assert_eq!(a.split64, Split64::Full64);
        assert!(a.polarization.is_none());
    }
}
