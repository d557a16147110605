use crate::model::types::{ComponentKind, Element};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ComponentFile {
    pub info: ComponentInfo,
    pub topology: ComponentTopology,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ComponentInfo {
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub one_letter: Option<String>,
    #[serde(default)]
    pub leaving: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ComponentTopology {
    #[serde(default)]
    pub atoms: Vec<ComponentAtom>,
    #[serde(default)]
    pub bonds: Vec<ComponentBond>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComponentAtom(pub String, pub Element);

#[derive(Debug, Deserialize, Clone)]
pub struct ComponentBond(pub String, pub String);
