//! PLY point source

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ply_rs::{
    parser::Parser,
    ply::{DefaultElement, Property, PropertyAccess},
};

use super::{PointCloud, PointRecord, PointSource};
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};

const REQUIRED_PROPERTIES: [&str; 9] = ["x", "y", "z", "nx", "ny", "nz", "red", "green", "blue"];

/// Reads `x y z nx ny nz red green blue` from the `vertex` element of a PLY file
#[derive(Clone, Copy, Debug, Default)]
pub struct PlyPointSource;

impl PropertyAccess for PointRecord {
    fn new() -> Self {
        PointRecord::default()
    }

    fn set_property(&mut self, key: String, property: Property) {
        let value = match property {
            Property::Float(v) => v,
            Property::Double(v) => v as f32,
            Property::UChar(v) => v as f32,
            Property::Char(v) => v as f32,
            Property::UShort(v) => v as f32,
            Property::Short(v) => v as f32,
            Property::UInt(v) => v as f32,
            Property::Int(v) => v as f32,
            _ => return,
        };
        match key.as_ref() {
            "x" => self.position.x = value,
            "y" => self.position.y = value,
            "z" => self.position.z = value,
            "nx" => self.normal.x = value,
            "ny" => self.normal.y = value,
            "nz" => self.normal.z = value,
            "red" => self.color[0] = value.clamp(0.0, 255.0) as u8,
            "green" => self.color[1] = value.clamp(0.0, 255.0) as u8,
            "blue" => self.color[2] = value.clamp(0.0, 255.0) as u8,
            _ => {}
        }
    }
}

impl PlyPointSource {
    /// Parse PLY data from any buffered reader
    pub fn parse(&self, mut reader: &mut dyn BufRead) -> Result<PointCloud> {
        let parser = Parser::<PointRecord>::new();
        let header = parser
            .read_header(&mut reader)
            .map_err(|e| Error::PointLoad(format!("invalid PLY header: {}", e)))?;

        let skip_parser = Parser::<DefaultElement>::new();
        let mut records = None;

        for (_name, element) in &header.elements {
            if element.name != "vertex" {
                // Elements preceding the vertices still have to be consumed
                skip_parser
                    .read_payload_for_element(&mut reader, element, &header)
                    .map_err(|e| Error::PointLoad(format!("element {}: {}", element.name, e)))?;
                continue;
            }

            let missing: Vec<&str> = REQUIRED_PROPERTIES
                .iter()
                .copied()
                .filter(|p| !element.properties.contains_key(*p))
                .collect();
            if !missing.is_empty() {
                return Err(Error::PointLoad(format!(
                    "vertex element is missing properties: {}",
                    missing.join(", ")
                )));
            }

            let payload = parser
                .read_payload_for_element(&mut reader, element, &header)
                .map_err(|e| Error::PointLoad(format!("vertex payload: {}", e)))?;
            records = Some(payload);
            break;
        }

        let mut records = records.ok_or_else(|| Error::PointLoad("no vertex element".into()))?;
        for record in &mut records {
            record.normal = record.normal.normalize_or(Vec3::Z);
        }

        Ok(PointCloud::from_records(records))
    }
}

impl PointSource for PlyPointSource {
    fn load_points(&self, path: &Path) -> Result<PointCloud> {
        let file = File::open(path)
            .map_err(|e| Error::PointLoad(format!("{}: {}", path.display(), e)))?;
        let mut reader = BufReader::new(file);
        let cloud = self.parse(&mut reader)?;
        log::info!("Loaded {} points from {}", cloud.len(), path.display());
        Ok(cloud)
    }
}
