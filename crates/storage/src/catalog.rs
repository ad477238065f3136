//! Footprint catalogs loaded from JSON files.
//!
//! A catalog is a JSON array of footprint records:
//!
//! ```json
//! [
//!   {"id": "0105p005", "ra": 10.5, "dec": 0.5,
//!    "ra1": 10.0, "ra2": 11.0, "dec1": 0.0, "dec2": 1.0,
//!    "bands": ["g", "r", "z"]},
//!   {"id": "c4d_170102_033140", "ra": 44.1, "dec": -1.2, "radius": 0.15,
//!    "fields": {"expnum": "610029", "ccdname": "N4"}}
//! ]
//! ```

use serde::{Deserialize, Serialize};
use sky_common::{angular_distance, RaRange, SkyCoord, SkyError, SkyResult, SkyWindow};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The sky region and locator of one source raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub id: String,
    pub ra: f64,
    pub dec: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ra1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ra2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec2: Option<f64>,
    /// Radius in degrees for footprints without a box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Bands with data; `None` means every band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<String>>,
    /// Extra path-template fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl Footprint {
    pub fn center(&self) -> SkyCoord {
        SkyCoord::new(self.ra, self.dec)
    }

    fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        Some((self.ra1?, self.ra2?, self.dec1?, self.dec2?))
    }

    /// RA/Dec box enclosing the footprint.
    ///
    /// Box records wrap through RA 0 when `ra1 > ra2`. Circles reaching a
    /// pole span all right ascensions.
    pub fn window(&self) -> SkyWindow {
        if let Some((ra1, ra2, dec1, dec2)) = self.bounds() {
            return SkyWindow::new(RaRange::from_bounds(ra1, ra2), dec1.min(dec2), dec1.max(dec2));
        }
        let r = self.radius.unwrap_or(0.0);
        let (dec_min, dec_max) = (self.dec - r, self.dec + r);
        if dec_min <= -90.0 || dec_max >= 90.0 {
            return SkyWindow::new(RaRange::full(), dec_min, dec_max);
        }
        let half = (r.to_radians().sin() / self.dec.to_radians().cos())
            .min(1.0)
            .asin()
            .to_degrees();
        let ra = if half >= 180.0 {
            RaRange::full()
        } else {
            RaRange::from_bounds(self.ra - half, self.ra + half)
        };
        SkyWindow::new(ra, dec_min, dec_max)
    }

    /// Largest angular distance from the centre to the footprint edge.
    pub fn half_size(&self) -> f64 {
        match self.bounds() {
            Some((ra1, ra2, dec1, dec2)) => {
                let c = self.center();
                [(ra1, dec1), (ra1, dec2), (ra2, dec1), (ra2, dec2)]
                    .iter()
                    .map(|&(ra, dec)| angular_distance(&c, &SkyCoord::new(ra, dec)))
                    .fold(0.0, f64::max)
            }
            None => self.radius.unwrap_or(0.0),
        }
    }

    pub fn has_band(&self, band: &str) -> bool {
        self.bands
            .as_ref()
            .map_or(true, |bands| bands.iter().any(|b| b == band))
    }

    /// Value of a path-template field; `id` names the footprint itself.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            _ => self.fields.get(name).map(String::as_str),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !self.ra.is_finite() || !self.dec.is_finite() || self.dec.abs() > 90.0 {
            return Err(format!("footprint '{}' has an invalid centre", self.id));
        }
        match (self.bounds(), self.radius) {
            (Some(_), _) => Ok(()),
            (None, Some(r)) if r.is_finite() && r >= 0.0 => Ok(()),
            _ => Err(format!(
                "footprint '{}' needs ra1/ra2/dec1/dec2 or a non-negative radius",
                self.id
            )),
        }
    }
}

/// A named, read-only set of footprints.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    footprints: Vec<Footprint>,
}

impl Catalog {
    /// Parse a catalog document.
    pub fn from_json(name: &str, json: &str) -> SkyResult<Self> {
        let footprints: Vec<Footprint> = serde_json::from_str(json)
            .map_err(|e| SkyError::CatalogLoad(format!("{}: {}", name, e)))?;
        for fp in &footprints {
            fp.validate()
                .map_err(|msg| SkyError::CatalogLoad(format!("{}: {}", name, msg)))?;
        }
        Ok(Self {
            name: name.to_string(),
            footprints,
        })
    }

    /// Read and parse a catalog file.
    pub fn load(name: &str, path: &Path) -> SkyResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| SkyError::CatalogLoad(format!("{}: {}: {}", name, path.display(), e)))?;
        Self::from_json(name, &json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{catalog_json, catalogs, FootprintFixture};

    #[test]
    fn test_parse_box_and_circle() {
        let doc = catalog_json(&[
            FootprintFixture::boxed("b", 10.0, 11.0, 0.0, 1.0).with_bands(&["g", "r"]),
            FootprintFixture::circle("c", 44.0, -1.0, 0.2),
        ]);
        let cat = Catalog::from_json("mixed", &doc).unwrap();
        assert_eq!(cat.len(), 2);

        let b = &cat.footprints()[0];
        assert!(b.has_band("g") && !b.has_band("z"));
        assert!(b.window().contains(&SkyCoord::new(10.9, 0.9)));
        assert!(!b.window().contains(&SkyCoord::new(11.1, 0.5)));

        let c = &cat.footprints()[1];
        assert!(c.has_band("z"));
        assert_eq!(c.half_size(), 0.2);
        assert!(c.window().contains(&SkyCoord::new(44.19, -1.0)));
    }

    #[test]
    fn test_box_half_size_reaches_corner() {
        let cat = Catalog::from_json("one", &catalog_json(&catalogs::single_brick())).unwrap();
        let hs = cat.footprints()[0].half_size();
        assert!((hs - 0.7071).abs() < 1e-3, "{}", hs);
    }

    #[test]
    fn test_seam_box_window() {
        let cat = Catalog::from_json("seam", &catalog_json(&catalogs::seam_brick())).unwrap();
        let w = cat.footprints()[0].window();
        assert!(w.contains(&SkyCoord::new(359.8, 0.0)));
        assert!(w.contains(&SkyCoord::new(0.2, 0.0)));
        assert!(!w.contains(&SkyCoord::new(180.0, 0.0)));
    }

    #[test]
    fn test_polar_circle_spans_all_ra() {
        let fp = FootprintFixture::circle("p", 0.0, 89.9, 0.5).to_json().to_string();
        let cat = Catalog::from_json("polar", &format!("[{}]", fp)).unwrap();
        assert!(cat.footprints()[0].window().ra.is_full());
    }

    #[test]
    fn test_fields_and_id_lookup() {
        let json = r#"[{"id": "x1", "ra": 1, "dec": 2, "radius": 0.1, "fields": {"expnum": "42"}}]"#;
        let cat = Catalog::from_json("ccds", json).unwrap();
        let fp = &cat.footprints()[0];
        assert_eq!(fp.field("id"), Some("x1"));
        assert_eq!(fp.field("expnum"), Some("42"));
        assert_eq!(fp.field("ccdname"), None);
    }

    #[test]
    fn test_invalid_documents_rejected() {
        assert!(matches!(Catalog::from_json("bad", "{"), Err(SkyError::CatalogLoad(_))));
        let no_extent = r#"[{"id": "x", "ra": 1, "dec": 2}]"#;
        assert!(matches!(Catalog::from_json("bad", no_extent), Err(SkyError::CatalogLoad(_))));
        assert!(matches!(
            Catalog::load("missing", Path::new("/nonexistent/catalog.json")),
            Err(SkyError::CatalogLoad(_))
        ));
    }
}
