use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::capture::{CaptureEvent, CaptureSet};
use crate::database::{NewPerson, PersonKind, PersonUpdate};
use crate::{RegistryError, Result};

/// Decode method parameters; missing params decode as an empty object
#[inline]
pub fn parse<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T> {
    let params = params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(params)
        .map_err(|e| RegistryError::Validation(format!("Invalid params for {}: {}", method, e)))
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct HnParams {
    pub hn: String,
}

#[derive(Debug, Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GetPersonParams {
    pub kind: PersonKind,
    pub hn: String,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct KindParams {
    pub kind: PersonKind,
}

#[derive(Debug, Deserialize)]
pub struct InsertParams {
    pub data: NewPerson,
}

#[derive(Debug, Deserialize)]
pub struct FamilyParams {
    pub child: NewPerson,
    pub parent: NewPerson,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    pub hn: String,
    pub data: PersonUpdate,
}

#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub parent_hn: String,
    pub child_hn: String,
}

/// Identity vectors for one person, given as a list, as `v1..v3`, or as capture events
#[derive(Debug, Deserialize)]
pub struct VectorParams {
    pub hn: String,
    #[serde(default)]
    pub vectors: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub v1: Option<Vec<f32>>,
    #[serde(default)]
    pub v2: Option<Vec<f32>>,
    #[serde(default)]
    pub v3: Option<Vec<f32>>,
    #[serde(default)]
    pub captures: Option<Vec<CaptureEvent>>,
    #[serde(default)]
    pub folder: Option<String>,
}

impl VectorParams {
    /// Resolve the one supplied form into a capture set
    #[inline]
    pub fn into_capture_set(self) -> Result<CaptureSet> {
        let slots: Vec<Vec<f32>> = [self.v1, self.v2, self.v3].into_iter().flatten().collect();

        let supplied = usize::from(self.vectors.is_some())
            + usize::from(!slots.is_empty())
            + usize::from(self.captures.is_some());
        if supplied != 1 {
            return Err(RegistryError::Validation(
                "Supply exactly one of vectors, v1..v3 or captures".into(),
            ));
        }

        if let Some(vectors) = self.vectors {
            return Ok(CaptureSet {
                vectors,
                folder: self.folder,
            });
        }
        if let Some(captures) = self.captures {
            let mut set = CaptureSet::from_events(&captures)?;
            if self.folder.is_some() {
                set.folder = self.folder;
            }
            return Ok(set);
        }
        Ok(CaptureSet {
            vectors: slots,
            folder: self.folder,
        })
    }
}

/// A probe is either a bare array or `{"vector": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProbeParams {
    Bare(Vec<f32>),
    Named { vector: Vec<f32> },
}

impl ProbeParams {
    #[inline]
    pub fn into_vector(self) -> Vec<f32> {
        match self {
            ProbeParams::Bare(vector) | ProbeParams::Named { vector } => vector,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    #[serde(default)]
    pub limit: Option<i64>,
}
