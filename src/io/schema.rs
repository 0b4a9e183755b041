//! Binary schema descriptions loaded from JSON.
//!
//! A schema names the compound types of one product format, the root type of
//! the data block and the roles of well-known members (grid point list, ids,
//! coordinates, observation list, ...). Types are resolved once into an
//! immutable `Arc` graph shared by every product opened with that format.
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::grid::GridIdTransform;
use crate::io::decoder::{CompoundType, LeafType, Member, SeqLength, SequenceType, TypeRef};
use crate::io::format::format_key;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error reading schema {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Schema {schema}: unknown type `{name}`")]
    UnknownType { schema: String, name: String },
    #[error("Schema {schema}: type `{name}` defined twice")]
    DuplicateType { schema: String, name: String },
    #[error("Schema {schema}: count `{field}` of `{owner}.{member}` is not an earlier member")]
    UnknownCountField {
        schema: String,
        owner: String,
        member: String,
        field: String,
    },
    #[error("Schema {schema}: count field `{field}` of `{owner}` is not an integer leaf")]
    CountNotInteger {
        schema: String,
        owner: String,
        field: String,
    },
    #[error("Schema {schema}: root type `{root}` is not a compound")]
    BadRoot { schema: String, root: String },
    #[error("Schema {schema}: role {role} refers to missing member `{member}`")]
    MissingRole {
        schema: String,
        role: &'static str,
        member: String,
    },
}

/// Member names the product layer relies on. Every name has the default used
/// by the bundled schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaRoles {
    pub zone_list: Option<String>,
    pub grid_point_list: String,
    pub snapshot_list: String,
    pub grid_point_id: String,
    pub latitude: String,
    pub longitude: String,
    pub observations: String,
    pub snapshot_id: String,
    pub observation_snapshot_id: String,
    pub observation_flags: String,
    pub incidence_angle: String,
    pub snapshot_time: String,
}

impl Default for SchemaRoles {
    fn default() -> Self {
        Self {
            zone_list: None,
            grid_point_list: "Grid_Point_List".into(),
            snapshot_list: "Snapshot_List".into(),
            grid_point_id: "Grid_Point_ID".into(),
            latitude: "Grid_Point_Latitude".into(),
            longitude: "Grid_Point_Longitude".into(),
            observations: "BT_Data".into(),
            snapshot_id: "Snapshot_ID".into(),
            observation_snapshot_id: "Snapshot_ID_of_Pixel".into(),
            observation_flags: "Flags".into(),
            incidence_angle: "Incidence_Angle".into(),
            snapshot_time: "Snapshot_Time".into(),
        }
    }
}

#[derive(Deserialize)]
struct SchemaDoc {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    root: String,
    #[serde(default)]
    grid_id_transform: GridIdTransform,
    types: Vec<TypeDoc>,
    #[serde(default)]
    roles: SchemaRoles,
}

#[derive(Deserialize)]
struct TypeDoc {
    name: String,
    members: Vec<MemberDoc>,
}

#[derive(Deserialize)]
struct MemberDoc {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    count: Option<CountDoc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountDoc {
    Static(usize),
    Field(String),
}

/// A resolved binary schema
#[derive(Debug)]
pub struct BinarySchema {
    pub name: String,
    pub aliases: Vec<String>,
    pub root: Arc<CompoundType>,
    pub grid_id_transform: GridIdTransform,
    pub roles: SchemaRoles,
    types: HashMap<String, Arc<CompoundType>>,
}

impl BinarySchema {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDoc = serde_json::from_str(json)?;
        Self::resolve(doc)
    }

    fn resolve(doc: SchemaDoc) -> Result<Self, SchemaError> {
        let schema = doc.name.clone();
        let mut types: HashMap<String, Arc<CompoundType>> = HashMap::new();

        for ty in &doc.types {
            if types.contains_key(&ty.name) || LeafType::parse(&ty.name).is_some() {
                return Err(SchemaError::DuplicateType {
                    schema,
                    name: ty.name.clone(),
                });
            }
            let mut members: Vec<Member> = Vec::with_capacity(ty.members.len());
            for m in &ty.members {
                let element = match LeafType::parse(&m.ty) {
                    Some(leaf) => TypeRef::Leaf(leaf),
                    None => match types.get(&m.ty) {
                        Some(c) => TypeRef::Compound(c.clone()),
                        None => {
                            return Err(SchemaError::UnknownType {
                                schema,
                                name: m.ty.clone(),
                            });
                        }
                    },
                };
                let resolved = match &m.count {
                    None => element,
                    Some(CountDoc::Static(n)) => TypeRef::Sequence(Arc::new(SequenceType {
                        element,
                        length: SeqLength::Static(*n),
                    })),
                    Some(CountDoc::Field(field)) => {
                        let idx = members.iter().position(|p| &p.name == field).ok_or_else(|| {
                            SchemaError::UnknownCountField {
                                schema: schema.clone(),
                                owner: ty.name.clone(),
                                member: m.name.clone(),
                                field: field.clone(),
                            }
                        })?;
                        let is_int = members[idx]
                            .ty
                            .as_leaf()
                            .map(|l| l.is_integer())
                            .unwrap_or(false);
                        if !is_int {
                            return Err(SchemaError::CountNotInteger {
                                schema,
                                owner: ty.name.clone(),
                                field: field.clone(),
                            });
                        }
                        TypeRef::Sequence(Arc::new(SequenceType {
                            element,
                            length: SeqLength::Field(idx),
                        }))
                    }
                };
                members.push(Member {
                    name: m.name.clone(),
                    ty: resolved,
                });
            }
            types.insert(ty.name.clone(), Arc::new(CompoundType::new(ty.name.clone(), members)));
        }

        let root = types.get(&doc.root).cloned().ok_or_else(|| SchemaError::BadRoot {
            schema: schema.clone(),
            root: doc.root.clone(),
        })?;
        debug!("Resolved schema {} ({} types)", schema, types.len());

        Ok(BinarySchema {
            name: doc.name,
            aliases: doc.aliases,
            root,
            grid_id_transform: doc.grid_id_transform,
            roles: doc.roles,
            types,
        })
    }

    pub fn compound(&self, name: &str) -> Option<&Arc<CompoundType>> {
        self.types.get(name)
    }

    /// Member of the root compound playing `role`.
    pub fn root_member(&self, role: &'static str, name: &str) -> Result<usize, SchemaError> {
        self.root.member_index(name).ok_or_else(|| SchemaError::MissingRole {
            schema: self.name.clone(),
            role,
            member: name.to_string(),
        })
    }

    pub fn missing_role(&self, role: &'static str, name: &str) -> SchemaError {
        SchemaError::MissingRole {
            schema: self.name.clone(),
            role,
            member: name.to_string(),
        }
    }
}

const BUNDLED: &[&str] = &[
    include_str!("../../resources/schemas/dbl_sm_xxxx_mir_sclf1c_0400.json"),
    include_str!("../../resources/schemas/dbl_sm_xxxx_mir_scld1c_0400.json"),
    include_str!("../../resources/schemas/dbl_sm_xxxx_mir_bwlf1c_0400.json"),
    include_str!("../../resources/schemas/dbl_sm_xxxx_mir_bwld1c_0400.json"),
    include_str!("../../resources/schemas/dbl_sm_xxxx_mir_smudp2_0400.json"),
    include_str!("../../resources/schemas/dbl_sm_xxxx_mir_osudp2_0400.json"),
    include_str!("../../resources/schemas/dbl_sm_xxxx_aux_dgglsm_0001.json"),
];

/// Schemas by normalized format key
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<BinarySchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the schemas shipped with the crate.
    pub fn with_bundled() -> Result<Self, SchemaError> {
        let mut reg = Self::new();
        for json in BUNDLED {
            reg.insert_json(json)?;
        }
        Ok(reg)
    }

    /// Register a schema under its name and every alias.
    pub fn insert_json(&mut self, json: &str) -> Result<Arc<BinarySchema>, SchemaError> {
        let schema = Arc::new(BinarySchema::from_json(json)?);
        self.schemas.insert(format_key(&schema.name), schema.clone());
        for alias in &schema.aliases {
            self.schemas.insert(format_key(alias), schema.clone());
        }
        Ok(schema)
    }

    /// Load every `*.json` in `dir`, overriding schemas with the same key.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, SchemaError> {
        let io_err = |source| SchemaError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let json = std::fs::read_to_string(&path).map_err(|source| SchemaError::Io {
                path: path.display().to_string(),
                source,
            })?;
            self.insert_json(&json)?;
            loaded += 1;
        }
        info!("Loaded {} schema(s) from {:?}", loaded, dir);
        Ok(loaded)
    }

    pub fn get(&self, format: &str) -> Option<Arc<BinarySchema>> {
        self.schemas.get(&format_key(format)).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
