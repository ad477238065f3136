//! Common test fixtures for sky tile tests.
//!
//! This module provides pre-defined footprints and catalog documents that
//! represent common scenarios: a single brick, a brick straddling RA 0, and
//! a small grid of bricks.

use serde_json::{json, Value};

/// Pixel scale of brick mosaics in arcseconds.
pub const BRICK_PIXSCALE: f64 = 0.262;

/// A footprint record in the catalog JSON layout.
#[derive(Debug, Clone)]
pub struct FootprintFixture {
    pub id: String,
    pub ra: f64,
    pub dec: f64,
    /// (ra1, ra2, dec1, dec2) box; `None` emits a `radius` record instead.
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub radius: f64,
    pub bands: Option<Vec<String>>,
}

impl FootprintFixture {
    /// A rectangular footprint centred on the box.
    pub fn boxed(id: &str, ra1: f64, ra2: f64, dec1: f64, dec2: f64) -> Self {
        let ra = if ra1 <= ra2 {
            (ra1 + ra2) / 2.0
        } else {
            ((ra1 + ra2 + 360.0) / 2.0) % 360.0
        };
        Self {
            id: id.to_string(),
            ra,
            dec: (dec1 + dec2) / 2.0,
            bounds: Some((ra1, ra2, dec1, dec2)),
            radius: 0.0,
            bands: None,
        }
    }

    /// A circular footprint.
    pub fn circle(id: &str, ra: f64, dec: f64, radius: f64) -> Self {
        Self {
            id: id.to_string(),
            ra,
            dec,
            bounds: None,
            radius,
            bands: None,
        }
    }

    /// Restrict the bands available for this footprint.
    pub fn with_bands(mut self, bands: &[&str]) -> Self {
        self.bands = Some(bands.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut v = json!({ "id": self.id, "ra": self.ra, "dec": self.dec });
        match self.bounds {
            Some((ra1, ra2, dec1, dec2)) => {
                v["ra1"] = json!(ra1);
                v["ra2"] = json!(ra2);
                v["dec1"] = json!(dec1);
                v["dec2"] = json!(dec2);
            }
            None => v["radius"] = json!(self.radius),
        }
        if let Some(bands) = &self.bands {
            v["bands"] = json!(bands);
        }
        v
    }
}

/// Serialize footprints into a catalog document.
pub fn catalog_json(footprints: &[FootprintFixture]) -> String {
    Value::Array(footprints.iter().map(FootprintFixture::to_json).collect()).to_string()
}

/// Common footprint sets.
pub mod catalogs {
    use super::FootprintFixture;

    /// One brick covering RA 10..11, Dec 0..1.
    pub fn single_brick() -> Vec<FootprintFixture> {
        vec![FootprintFixture::boxed("0105p005", 10.0, 11.0, 0.0, 1.0)]
    }

    /// A brick straddling RA 0/360.
    pub fn seam_brick() -> Vec<FootprintFixture> {
        vec![FootprintFixture::boxed("0000p000", 359.5, 0.5, -0.5, 0.5)]
    }

    /// A grid of 0.25 degree bricks covering RA 20..21, Dec -1..0.
    pub fn brick_grid() -> Vec<FootprintFixture> {
        let mut out = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                let ra1 = 20.0 + i as f64 * 0.25;
                let dec1 = -1.0 + j as f64 * 0.25;
                let id = format!("grid{}{}", i, j);
                out.push(FootprintFixture::boxed(&id, ra1, ra1 + 0.25, dec1, dec1 + 0.25));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_record_layout() {
        let v = FootprintFixture::boxed("b1", 10.0, 11.0, 0.0, 1.0)
            .with_bands(&["g", "r"])
            .to_json();
        assert_eq!(v["ra"], 10.5);
        assert_eq!(v["dec2"], 1.0);
        assert_eq!(v["bands"][1], "r");
        assert!(v.get("radius").is_none());
    }

    #[test]
    fn test_seam_center() {
        let f = &catalogs::seam_brick()[0];
        assert!(f.ra < 1e-9 || (f.ra - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_catalog_json_parses() {
        let doc = catalog_json(&catalogs::brick_grid());
        let parsed: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 16);
    }
}
