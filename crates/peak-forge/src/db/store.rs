use super::loader;
use super::schema::ComponentFile;
use crate::model::types::ComponentKind;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct InternalComponent {
    pub schema: ComponentFile,
    pub atom_index: HashMap<String, usize>,
    pub neighbors: Vec<Vec<usize>>,
}

impl InternalComponent {
    pub fn new(schema: ComponentFile) -> Self {
        let atom_index: HashMap<String, usize> = schema
            .topology
            .atoms
            .iter()
            .enumerate()
            .map(|(i, atom)| (atom.0.clone(), i))
            .collect();

        let mut neighbors = vec![Vec::new(); schema.topology.atoms.len()];
        for bond in &schema.topology.bonds {
            if let (Some(&a), Some(&b)) = (atom_index.get(&bond.0), atom_index.get(&bond.1)) {
                neighbors[a].push(b);
                neighbors[b].push(a);
            }
        }

        Self {
            schema,
            atom_index,
            neighbors,
        }
    }
}

pub struct DataStore {
    pub components_by_name: HashMap<String, InternalComponent>,
    pub by_one_letter: HashMap<(ComponentKind, char), String>,
}

static STORE: OnceLock<DataStore> = OnceLock::new();

pub fn get_store() -> &'static DataStore {
    STORE.get_or_init(loader::load_all_components)
}
