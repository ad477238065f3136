//! Sky projections stored in FITS headers.

use crate::error::{RasterError, Result};
use crate::fits::FitsHeader;
use projection::{GalacticZea, Hemisphere, SkyProjection, TanWcs};
use sky_common::SkyCoord;

fn require_float(header: &FitsHeader, key: &str, path: &str) -> Result<f64> {
    header
        .get_float(key)
        .ok_or_else(|| RasterError::invalid_wcs(path, format!("missing {}", key)))
}

fn image_size(header: &FitsHeader, path: &str) -> Result<(usize, usize)> {
    let get = |primary: &str, fallback: &str| {
        header
            .get_int(primary)
            .or_else(|| header.get_int(fallback))
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| RasterError::invalid_wcs(path, format!("missing {} / {}", primary, fallback)))
    };
    Ok((get("IMAGEW", "NAXIS1")?, get("IMAGEH", "NAXIS2")?))
}

/// TAN projection from CRVAL/CRPIX and CD (or CDELT) cards.
pub fn tan_from_header(header: &FitsHeader, path: &str) -> Result<TanWcs> {
    let crval = SkyCoord::new(
        require_float(header, "CRVAL1", path)?,
        require_float(header, "CRVAL2", path)?,
    );
    let crpix = (
        require_float(header, "CRPIX1", path)?,
        require_float(header, "CRPIX2", path)?,
    );
    let cd = match header.get_float("CD1_1") {
        Some(cd11) => [
            [cd11, header.get_float("CD1_2").unwrap_or(0.0)],
            [
                header.get_float("CD2_1").unwrap_or(0.0),
                require_float(header, "CD2_2", path)?,
            ],
        ],
        None => [
            [require_float(header, "CDELT1", path)?, 0.0],
            [0.0, require_float(header, "CDELT2", path)?],
        ],
    };
    let (w, h) = image_size(header, path)?;
    TanWcs::new(crval, crpix, cd, w, h).map_err(|e| RasterError::invalid_wcs(path, e.to_string()))
}

/// Header cards describing a TAN projection.
pub fn tan_cards(wcs: &TanWcs) -> FitsHeader {
    let mut h = FitsHeader::new();
    let crval = wcs.crval();
    let crpix = wcs.crpix();
    let cd = wcs.cd();
    h.set("CTYPE1", "RA---TAN");
    h.set("CTYPE2", "DEC--TAN");
    h.set("CRVAL1", crval.ra);
    h.set("CRVAL2", crval.dec);
    h.set("CRPIX1", crpix.0);
    h.set("CRPIX2", crpix.1);
    h.set("CD1_1", cd[0][0]);
    h.set("CD1_2", cd[0][1]);
    h.set("CD2_1", cd[1][0]);
    h.set("CD2_2", cd[1][1]);
    h.set("IMAGEW", wcs.width() as i64);
    h.set("IMAGEH", wcs.height() as i64);
    h
}

/// Zenithal-equal-area hemisphere map from LAM_* cards.
pub fn zea_from_header(header: &FitsHeader, path: &str) -> Result<GalacticZea> {
    let nsgp = header
        .get_int("LAM_NSGP")
        .ok_or_else(|| RasterError::invalid_wcs(path, "missing LAM_NSGP"))?;
    let hemisphere = Hemisphere::from_nsgp(nsgp)
        .ok_or_else(|| RasterError::invalid_wcs(path, format!("LAM_NSGP = {}", nsgp)))?;
    let lam_scal = require_float(header, "LAM_SCAL", path)?;
    let crpix = (
        require_float(header, "CRPIX1", path)?,
        require_float(header, "CRPIX2", path)?,
    );
    let (w, h) = image_size(header, path)?;
    Ok(GalacticZea::new(hemisphere, lam_scal, crpix, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tan_cards_roundtrip() {
        let wcs = TanWcs::cutout(&SkyCoord::new(244.75, 7.5), 0.262, 100, 80, false);
        let cards = tan_cards(&wcs);
        let back = tan_from_header(&cards, "mem").unwrap();
        assert_eq!((back.width(), back.height()), (100, 80));
        let a = wcs.pixel_to_radec(3.0, 4.0).unwrap();
        let b = back.pixel_to_radec(3.0, 4.0).unwrap();
        assert!((a.ra - b.ra).abs() < 1e-12 && (a.dec - b.dec).abs() < 1e-12);
    }

    #[test]
    fn test_cdelt_fallback() {
        let mut h = FitsHeader::new();
        h.set("NAXIS1", 10i64);
        h.set("NAXIS2", 10i64);
        h.set("CRVAL1", 10.0);
        h.set("CRVAL2", 0.0);
        h.set("CRPIX1", 5.5);
        h.set("CRPIX2", 5.5);
        h.set("CDELT1", -0.001);
        h.set("CDELT2", 0.001);
        let wcs = tan_from_header(&h, "mem").unwrap();
        assert!((wcs.pixel_scale() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_missing_wcs_is_error() {
        let mut h = FitsHeader::new();
        h.set("NAXIS1", 10i64);
        h.set("NAXIS2", 10i64);
        assert!(matches!(
            tan_from_header(&h, "x.fits"),
            Err(RasterError::InvalidWcs { .. })
        ));
    }

    #[test]
    fn test_zea_header() {
        let mut h = FitsHeader::new();
        h.set("NAXIS1", 4096i64);
        h.set("NAXIS2", 4096i64);
        h.set("LAM_NSGP", -1i64);
        h.set("LAM_SCAL", 2048i64);
        h.set("CRPIX1", 2048.5);
        h.set("CRPIX2", 2048.5);
        let zea = zea_from_header(&h, "sgp.fits").unwrap();
        assert_eq!(zea.hemisphere(), Hemisphere::South);
    }
}
