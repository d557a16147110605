use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    H,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    P,
    S,
    Cl,
    K,
    Ca,
    Mn,
    Fe,
    Co,
    Ni,
    Cu,
    Zn,
    Se,
    Cd,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nucleus {
    H,
    C,
    N,
    F,
    P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectralRegion {
    #[serde(rename = "H")]
    H,
    #[serde(rename = "HN")]
    HN,
    #[serde(rename = "H-aliphatic")]
    HAliphatic,
    #[serde(rename = "H-aromatic")]
    HAromatic,
    #[serde(rename = "H-methyl")]
    HMethyl,
    #[serde(rename = "H-imide")]
    HImide,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-aliphatic")]
    CAliphatic,
    #[serde(rename = "C-aromatic")]
    CAromatic,
    #[serde(rename = "C-methyl")]
    CMethyl,
    #[serde(rename = "CO")]
    CO,
    #[serde(rename = "N")]
    N,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "P")]
    P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferType {
    #[serde(rename = "onebond")]
    OneBond,
    #[serde(rename = "jcoupling")]
    JCoupling,
    #[serde(rename = "jmultibond")]
    JMultiBond,
    #[serde(rename = "relayed")]
    Relayed,
    #[serde(rename = "relayed-alternate")]
    RelayedAlternate,
    #[serde(rename = "through-space")]
    ThroughSpace,
    #[serde(rename = "through-space?")]
    ThroughSpaceTentative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Undersampling {
    #[serde(rename = "not observed")]
    NotObserved,
    #[serde(rename = "aliased")]
    Aliased,
    #[serde(rename = "folded")]
    Folded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidthUnit {
    #[serde(rename = "ppm", alias = "PPM")]
    Ppm,
    #[serde(rename = "Hz", alias = "hz", alias = "HZ")]
    Hz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolymerType {
    Polypeptide,
    Polyribonucleotide,
    Polydeoxyribonucleotide,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Peptide,
    Rna,
    Dna,
    Ion,
}

impl Element {
    pub fn symbol(&self) -> &'static str {
        match self {
            Element::H => "H",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::F => "F",
            Element::Na => "Na",
            Element::Mg => "Mg",
            Element::P => "P",
            Element::S => "S",
            Element::Cl => "Cl",
            Element::K => "K",
            Element::Ca => "Ca",
            Element::Mn => "Mn",
            Element::Fe => "Fe",
            Element::Co => "Co",
            Element::Ni => "Ni",
            Element::Cu => "Cu",
            Element::Zn => "Zn",
            Element::Se => "Se",
            Element::Cd => "Cd",
            Element::Unknown => "Unknown",
        }
    }

    pub fn is_heavy_atom(&self) -> bool {
        !matches!(self, Element::H)
    }

    /// Reports whether the element is a metal that appears as a monatomic ion.
    pub fn is_metal(&self) -> bool {
        matches!(
            self,
            Element::Na
                | Element::Mg
                | Element::K
                | Element::Ca
                | Element::Mn
                | Element::Fe
                | Element::Co
                | Element::Ni
                | Element::Cu
                | Element::Zn
                | Element::Cd
        )
    }

    pub fn nucleus(&self) -> Option<Nucleus> {
        match self {
            Element::H => Some(Nucleus::H),
            Element::C => Some(Nucleus::C),
            Element::N => Some(Nucleus::N),
            Element::F => Some(Nucleus::F),
            Element::P => Some(Nucleus::P),
            _ => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Element {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "H" | "D" => Ok(Element::H),
            "C" => Ok(Element::C),
            "N" => Ok(Element::N),
            "O" => Ok(Element::O),
            "F" => Ok(Element::F),
            "NA" => Ok(Element::Na),
            "MG" => Ok(Element::Mg),
            "P" => Ok(Element::P),
            "S" => Ok(Element::S),
            "CL" => Ok(Element::Cl),
            "K" => Ok(Element::K),
            "CA" => Ok(Element::Ca),
            "MN" => Ok(Element::Mn),
            "FE" => Ok(Element::Fe),
            "CO" => Ok(Element::Co),
            "NI" => Ok(Element::Ni),
            "CU" => Ok(Element::Cu),
            "ZN" => Ok(Element::Zn),
            "SE" => Ok(Element::Se),
            "CD" => Ok(Element::Cd),
            _ => Err(format!("Invalid element symbol: {}", s)),
        }
    }
}

impl Nucleus {
    pub fn symbol(&self) -> &'static str {
        match self {
            Nucleus::H => "H",
            Nucleus::C => "C",
            Nucleus::N => "N",
            Nucleus::F => "F",
            Nucleus::P => "P",
        }
    }

    /// Isotope number observed by default for the nucleus.
    pub fn default_isotope(&self) -> u16 {
        match self {
            Nucleus::H => 1,
            Nucleus::C => 13,
            Nucleus::N => 15,
            Nucleus::F => 19,
            Nucleus::P => 31,
        }
    }

    /// Maps an isotope number to its nucleus, treating deuterium as a proton channel.
    pub fn from_isotope(isotope: u16) -> Option<Self> {
        match isotope {
            1 | 2 => Some(Nucleus::H),
            13 => Some(Nucleus::C),
            15 => Some(Nucleus::N),
            19 => Some(Nucleus::F),
            31 => Some(Nucleus::P),
            _ => None,
        }
    }

    /// Derives the observed nucleus from the leading character of an atom id.
    ///
    /// Pseudo-atom prefixes `Q` and `M` denote proton groups.
    pub fn from_atom_id(atom_id: &str) -> Option<Self> {
        match atom_id.chars().next()?.to_ascii_uppercase() {
            'H' | 'Q' | 'M' | 'D' => Some(Nucleus::H),
            'C' => Some(Nucleus::C),
            'N' => Some(Nucleus::N),
            'F' => Some(Nucleus::F),
            'P' => Some(Nucleus::P),
            _ => None,
        }
    }

    pub fn is_proton(&self) -> bool {
        matches!(self, Nucleus::H)
    }

    pub fn is_heavy_bonded_to_proton(&self) -> bool {
        matches!(self, Nucleus::C | Nucleus::N)
    }
}

impl fmt::Display for Nucleus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Nucleus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches(|c: char| c.is_ascii_digit());
        match trimmed.to_ascii_uppercase().as_str() {
            "H" | "D" => Ok(Nucleus::H),
            "C" => Ok(Nucleus::C),
            "N" => Ok(Nucleus::N),
            "F" => Ok(Nucleus::F),
            "P" => Ok(Nucleus::P),
            _ => Err(format!("Invalid nucleus: {}", s)),
        }
    }
}

/// Gyromagnetic ratio of an isotope relative to the proton.
///
/// The same factor weights ppm mismatches when comparing peak positions against
/// assigned chemical shifts, so that one proton ppm carries the same frequency
/// weight as the heavy-atom ppm it is compared with.
///
/// # Arguments
///
/// * `isotope` - Isotope mass number such as `1`, `13`, or `15`.
///
/// # Returns
///
/// The relative ratio, or `1.0` for isotopes without a tabulated value.
pub fn isotope_weight(isotope: u16) -> f64 {
    match isotope {
        1 => 1.0,
        2 => 0.153506088,
        13 => 0.251449530,
        15 => 0.101329118,
        19 => 0.940866982,
        31 => 0.404807356,
        _ => 1.0,
    }
}

impl SpectralRegion {
    pub fn label(&self) -> &'static str {
        match self {
            SpectralRegion::H => "H",
            SpectralRegion::HN => "HN",
            SpectralRegion::HAliphatic => "H-aliphatic",
            SpectralRegion::HAromatic => "H-aromatic",
            SpectralRegion::HMethyl => "H-methyl",
            SpectralRegion::HImide => "H-imide",
            SpectralRegion::C => "C",
            SpectralRegion::CAliphatic => "C-aliphatic",
            SpectralRegion::CAromatic => "C-aromatic",
            SpectralRegion::CMethyl => "C-methyl",
            SpectralRegion::CO => "CO",
            SpectralRegion::N => "N",
            SpectralRegion::F => "F",
            SpectralRegion::P => "P",
        }
    }

    pub fn nucleus(&self) -> Nucleus {
        match self {
            SpectralRegion::H
            | SpectralRegion::HN
            | SpectralRegion::HAliphatic
            | SpectralRegion::HAromatic
            | SpectralRegion::HMethyl
            | SpectralRegion::HImide => Nucleus::H,
            SpectralRegion::C
            | SpectralRegion::CAliphatic
            | SpectralRegion::CAromatic
            | SpectralRegion::CMethyl
            | SpectralRegion::CO => Nucleus::C,
            SpectralRegion::N => Nucleus::N,
            SpectralRegion::F => Nucleus::F,
            SpectralRegion::P => Nucleus::P,
        }
    }

    /// The catch-all region of a nucleus.
    pub fn generic(nucleus: Nucleus) -> Self {
        match nucleus {
            Nucleus::H => SpectralRegion::H,
            Nucleus::C => SpectralRegion::C,
            Nucleus::N => SpectralRegion::N,
            Nucleus::F => SpectralRegion::F,
            Nucleus::P => SpectralRegion::P,
        }
    }

    pub fn is_aromatic(&self) -> bool {
        matches!(self, SpectralRegion::HAromatic | SpectralRegion::CAromatic)
    }
}

impl fmt::Display for SpectralRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for SpectralRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" => Ok(SpectralRegion::H),
            "HN" => Ok(SpectralRegion::HN),
            "H-aliphatic" => Ok(SpectralRegion::HAliphatic),
            "H-aromatic" => Ok(SpectralRegion::HAromatic),
            "H-methyl" => Ok(SpectralRegion::HMethyl),
            "H-imide" => Ok(SpectralRegion::HImide),
            "C" => Ok(SpectralRegion::C),
            "C-aliphatic" => Ok(SpectralRegion::CAliphatic),
            "C-aromatic" => Ok(SpectralRegion::CAromatic),
            "C-methyl" => Ok(SpectralRegion::CMethyl),
            "CO" => Ok(SpectralRegion::CO),
            "N" => Ok(SpectralRegion::N),
            "F" => Ok(SpectralRegion::F),
            "P" => Ok(SpectralRegion::P),
            _ => Err(format!("Invalid spectral region: {}", s)),
        }
    }
}

impl TransferType {
    pub fn label(&self) -> &'static str {
        match self {
            TransferType::OneBond => "onebond",
            TransferType::JCoupling => "jcoupling",
            TransferType::JMultiBond => "jmultibond",
            TransferType::Relayed => "relayed",
            TransferType::RelayedAlternate => "relayed-alternate",
            TransferType::ThroughSpace => "through-space",
            TransferType::ThroughSpaceTentative => "through-space?",
        }
    }

    /// Rank used to elect the primary transfer of a list; higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            TransferType::ThroughSpace => 6,
            TransferType::ThroughSpaceTentative => 5,
            TransferType::Relayed | TransferType::RelayedAlternate => 4,
            TransferType::JMultiBond => 3,
            TransferType::JCoupling => 2,
            TransferType::OneBond => 1,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Undersampling {
    pub fn label(&self) -> &'static str {
        match self {
            Undersampling::NotObserved => "not observed",
            Undersampling::Aliased => "aliased",
            Undersampling::Folded => "folded",
        }
    }
}

impl fmt::Display for Undersampling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl PolymerType {
    /// Classifies an entity polymer-type tag such as `"polypeptide(L)"`.
    pub fn from_tag(tag: &str) -> Self {
        let lower = tag.to_ascii_lowercase();
        if lower.starts_with("polypeptide") {
            PolymerType::Polypeptide
        } else if lower.starts_with("polyribonucleotide") {
            PolymerType::Polyribonucleotide
        } else if lower.starts_with("polydeoxyribonucleotide") {
            PolymerType::Polydeoxyribonucleotide
        } else {
            PolymerType::Other
        }
    }

    pub fn is_nucleotide(&self) -> bool {
        matches!(
            self,
            PolymerType::Polyribonucleotide | PolymerType::Polydeoxyribonucleotide
        )
    }

    /// Whether a dictionary component kind can occupy a position of this polymer.
    pub fn accepts(&self, kind: ComponentKind) -> bool {
        match self {
            PolymerType::Polypeptide => kind == ComponentKind::Peptide,
            PolymerType::Polyribonucleotide => kind == ComponentKind::Rna,
            PolymerType::Polydeoxyribonucleotide => kind == ComponentKind::Dna,
            PolymerType::Other => kind != ComponentKind::Ion,
        }
    }
}

impl ComponentKind {
    pub fn is_nucleotide(&self) -> bool {
        matches!(self, ComponentKind::Rna | ComponentKind::Dna)
    }
}
