//! Topology and image kinds.
//!
//! Both are closed enums matched exhaustively; a new topology family or a new
//! routing daemon is a compile-time-checked extension.

use std::fmt;
use std::str::FromStr;

use crate::error::TopoError;

/// Which family of topology to generate, with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyKind {
    /// k-ary fat-tree (Clos) with ToR, Leaf and Spine tiers
    FatTree { k: u32 },
    /// A graph imported from a Topology Zoo GML file
    TopoZoo { name: String },
    /// `copies` disjoint copies of a Topology Zoo graph stitched together
    DupZoo { name: String, copies: u32 },
}

impl TopologyKind {
    /// Build a kind from the CLI pair `(topology-kind, topology-identifier)`.
    ///
    /// `dupzoo` identifiers have the form `<name>:<copies>`.
    pub fn parse(kind: &str, id: &str) -> Result<Self, TopoError> {
        let invalid = || TopoError::InvalidTopologyId(id.to_string());
        match kind {
            "fattree" => {
                let k: u32 = id.parse().map_err(|_| invalid())?;
                if k == 0 || k % 2 != 0 {
                    return Err(invalid());
                }
                Ok(Self::FatTree { k })
            }
            "topozoo" | "graph-import" => {
                if id.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::TopoZoo { name: id.to_string() })
            }
            "dupzoo" | "graph-replicate" => {
                let (name, copies) = id.split_once(':').ok_or_else(invalid)?;
                let copies: u32 = copies.parse().map_err(|_| invalid())?;
                if name.is_empty() || copies == 0 {
                    return Err(invalid());
                }
                Ok(Self::DupZoo {
                    name: name.to_string(),
                    copies,
                })
            }
            other => Err(TopoError::UnsupportedTopology(other.to_string())),
        }
    }

    /// Directory name for generated artifacts, stable across runs.
    pub fn dir_name(&self) -> String {
        match self {
            Self::FatTree { k } => format!("fattree{k}"),
            Self::TopoZoo { name } => format!("topozoo_{name}"),
            Self::DupZoo { name, copies } => format!("topozoo_{name}_dup{copies}"),
        }
    }

    pub fn is_fattree(&self) -> bool {
        matches!(self, Self::FatTree { .. })
    }
}

/// Routing daemon image a configuration is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Frr,
    Bird,
    Crpd,
}

impl ImageKind {
    pub const ALL: [ImageKind; 3] = [ImageKind::Frr, ImageKind::Bird, ImageKind::Crpd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frr => "frr",
            Self::Bird => "bird",
            Self::Crpd => "crpd",
        }
    }
}

impl FromStr for ImageKind {
    type Err = TopoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frr" => Ok(Self::Frr),
            "bird" => Ok(Self::Bird),
            "crpd" => Ok(Self::Crpd),
            other => Err(TopoError::UnsupportedImage(other.to_string())),
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(TopologyKind::parse("fattree", "4").unwrap(), TopologyKind::FatTree { k: 4 });
        assert_eq!(
            TopologyKind::parse("topozoo", "Kdl").unwrap(),
            TopologyKind::TopoZoo { name: "Kdl".into() }
        );
        assert_eq!(
            TopologyKind::parse("graph-replicate", "Fccn:2").unwrap(),
            TopologyKind::DupZoo { name: "Fccn".into(), copies: 2 }
        );
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert!(matches!(TopologyKind::parse("fattree", "3"), Err(TopoError::InvalidTopologyId(_))));
        assert!(matches!(TopologyKind::parse("fattree", "0"), Err(TopoError::InvalidTopologyId(_))));
        assert!(matches!(TopologyKind::parse("dupzoo", "Fccn"), Err(TopoError::InvalidTopologyId(_))));
        assert!(matches!(TopologyKind::parse("dupzoo", "Fccn:0"), Err(TopoError::InvalidTopologyId(_))));
        assert!(matches!(TopologyKind::parse("torus", "4"), Err(TopoError::UnsupportedTopology(_))));
    }

    #[test]
    fn test_dir_names() {
        assert_eq!(TopologyKind::FatTree { k: 8 }.dir_name(), "fattree8");
        assert_eq!(TopologyKind::TopoZoo { name: "Kdl".into() }.dir_name(), "topozoo_Kdl");
        assert_eq!(
            TopologyKind::DupZoo { name: "Fccn".into(), copies: 3 }.dir_name(),
            "topozoo_Fccn_dup3"
        );
    }

    #[test]
    fn test_image_kind_round_trip_names() {
        for image in ImageKind::ALL {
            assert_eq!(image.as_str().parse::<ImageKind>().unwrap(), image);
        }
        assert!(matches!("srlinux".parse::<ImageKind>(), Err(TopoError::UnsupportedImage(_))));
    }
}
