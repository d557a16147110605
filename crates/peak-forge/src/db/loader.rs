use super::schema::ComponentFile;
use super::store::{DataStore, InternalComponent};
use std::collections::HashMap;

pub fn load_all_components() -> DataStore {
    let mut components_by_name = HashMap::new();
    let mut by_one_letter = HashMap::new();

    macro_rules! load_component {
        ($path:literal) => {
            let content = include_str!(concat!("../../components/", $path));
            let schema: ComponentFile = toml::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse component file '{}': {}", $path, e));

            let name = schema.info.name.clone();
            if let Some(code) = schema.info.one_letter.as_deref().and_then(|s| s.chars().next()) {
                by_one_letter.insert((schema.info.kind, code), name.clone());
            }

            if components_by_name
                .insert(name.clone(), InternalComponent::new(schema))
                .is_some()
            {
                panic!("Duplicate component name found: {}", name);
            }
        };
    }

    load_component!("protein/ALA.toml");
    load_component!("protein/ARG.toml");
    load_component!("protein/ASN.toml");
    load_component!("protein/ASP.toml");
    load_component!("protein/CYS.toml");
    load_component!("protein/GLN.toml");
    load_component!("protein/GLU.toml");
    load_component!("protein/GLY.toml");
    load_component!("protein/HIS.toml");
    load_component!("protein/ILE.toml");
    load_component!("protein/LEU.toml");
    load_component!("protein/LYS.toml");
    load_component!("protein/MET.toml");
    load_component!("protein/PHE.toml");
    load_component!("protein/PRO.toml");
    load_component!("protein/SER.toml");
    load_component!("protein/THR.toml");
    load_component!("protein/TRP.toml");
    load_component!("protein/TYR.toml");
    load_component!("protein/VAL.toml");

    load_component!("nucleic/A.toml");
    load_component!("nucleic/C.toml");
    load_component!("nucleic/G.toml");
    load_component!("nucleic/U.toml");

    load_component!("nucleic/DA.toml");
    load_component!("nucleic/DC.toml");
    load_component!("nucleic/DG.toml");
    load_component!("nucleic/DT.toml");

    load_component!("ion/NA.toml");
    load_component!("ion/MG.toml");
    load_component!("ion/K.toml");
    load_component!("ion/CA.toml");
    load_component!("ion/MN.toml");
    load_component!("ion/FE.toml");
    load_component!("ion/FE2.toml");
    load_component!("ion/CO.toml");
    load_component!("ion/NI.toml");
    load_component!("ion/CU.toml");
    load_component!("ion/ZN.toml");
    load_component!("ion/CD.toml");
    load_component!("ion/CL.toml");

    DataStore {
        components_by_name,
        by_one_letter,
    }
}
