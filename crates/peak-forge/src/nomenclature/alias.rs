use std::collections::HashMap;

/// Maps force-field and legacy residue spellings onto dictionary component ids.
#[derive(Debug, Clone)]
pub struct ResidueAliases {
    alias_map: HashMap<String, String>,
}

impl ResidueAliases {
    pub fn new_default() -> Self {
        let mut alias_map = HashMap::new();

        macro_rules! register_standard {
            ($($canonical:expr),+ $(,)?) => {
                $(alias_map.insert($canonical.to_string(), $canonical.to_string());)+
            };
        }

        macro_rules! register_alias {
            ($canonical:expr => $($alias:expr),+ $(,)?) => {
                $(alias_map.insert($alias.to_string(), $canonical.to_string());)+
            };
        }

        register_standard!(
            "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS",
            "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
        );
        register_standard!("A", "C", "G", "U", "DA", "DC", "DG", "DT");

        register_alias!("ARG" => "ARN");
        register_alias!("ASP" => "ASH");
        register_alias!("CYS" => "CYM", "CYX", "CYN");
        register_alias!("GLU" => "GLH");
        register_alias!("HIS" => "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "HIN", "HISH");
        register_alias!("LYS" => "LYN", "LSN");
        register_alias!("TYR" => "TYM");
        register_alias!("PRO" => "CPR", "TPR");

        register_alias!("A" => "RA", "RA5", "RA3", "RAN", "ADE", "RADE", "A5", "A3");
        register_alias!("C" => "RC", "RC5", "RC3", "RCN", "CYT", "RCYT", "C5", "C3");
        register_alias!("G" => "RG", "RG5", "RG3", "RGN", "GUA", "RGUA", "G5", "G3");
        register_alias!("U" => "RU", "RU5", "RU3", "RUN", "URA", "URI", "RURA", "U5", "U3");
        register_alias!("DA" => "DA5", "DA3", "DAN", "DADE");
        register_alias!("DC" => "DC5", "DC3", "DCN", "DCYT");
        register_alias!("DG" => "DG5", "DG3", "DGN", "DGUA");
        register_alias!("DT" => "DT5", "DT3", "DTN", "THY", "DTHY");

        Self { alias_map }
    }

    /// Resolves an upper-case spelling to its canonical component id.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias_map.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    pub fn add_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.alias_map.insert(alias.into(), canonical.into());
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.alias_map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.alias_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alias_map.is_empty()
    }
}

impl Default for ResidueAliases {
    fn default() -> Self {
        Self::new_default()
    }
}
