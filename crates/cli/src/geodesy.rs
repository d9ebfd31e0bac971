//! PL-2000 → PL-1992 arithmetic backed by `proj4rs`.

use anyhow::{anyhow, Result};
use diffh::api::{CanonicalSystem, Geodesy, GeodesyError, Zone};
use diffh::Vec2;
use proj4rs::proj::Proj;

const PL1992: &str =
    "+proj=tmerc +lat_0=0 +lon_0=19 +k=0.9993 +x_0=500000 +y_0=-5300000 +ellps=GRS80 +units=m +no_defs";

fn pl2000(zone: Zone) -> String {
    format!(
        "+proj=tmerc +lat_0=0 +lon_0={} +k=0.999923 +x_0={}500000 +y_0=0 +ellps=GRS80 +units=m +no_defs",
        zone.central_meridian(),
        zone.digit()
    )
}

/// Transverse Mercator definitions for every supported zone, built once.
pub struct ProjGeodesy {
    zones: Vec<(Zone, Proj)>,
    pl1992: Proj,
}

impl ProjGeodesy {
    pub fn new() -> Result<Self> {
        let mut zones = Vec::with_capacity(Zone::ALL.len());
        for zone in Zone::ALL {
            let proj = Proj::from_proj_string(&pl2000(zone))
                .map_err(|e| anyhow!("defining {zone}: {e}"))?;
            zones.push((zone, proj));
        }
        let pl1992 =
            Proj::from_proj_string(PL1992).map_err(|e| anyhow!("defining PL-1992: {e}"))?;
        Ok(Self { zones, pl1992 })
    }

    fn zone(&self, zone: Zone) -> Result<&Proj, GeodesyError> {
        self.zones
            .iter()
            .find(|(z, _)| *z == zone)
            .map(|(_, p)| p)
            .ok_or_else(|| GeodesyError(format!("no definition for {zone}")))
    }
}

impl Geodesy for ProjGeodesy {
    fn transform(
        &self,
        source: Zone,
        target: CanonicalSystem,
        coords: &[Vec2<f64>],
    ) -> std::result::Result<Vec<Vec2<f64>>, GeodesyError> {
        let src = self.zone(source)?;
        let dst = match target {
            CanonicalSystem::Pl1992 => &self.pl1992,
        };
        coords
            .iter()
            .map(|c| {
                let mut pt = (c.x, c.y, 0.0);
                proj4rs::transform::transform(src, dst, &mut pt)
                    .map_err(|e| GeodesyError(format!("({}, {}): {e}", c.x, c.y)))?;
                if !(pt.0.is_finite() && pt.1.is_finite()) {
                    return Err(GeodesyError(format!("({}, {}): non-finite result", c.x, c.y)));
                }
                Ok(Vec2::new(pt.0, pt.1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_definitions_follow_the_band_layout() {
        let s = pl2000(Zone::Z7);
        assert!(s.contains("+lon_0=21 "));
        assert!(s.contains("+x_0=7500000 "));
    }

    #[test]
    fn zone_seven_lands_in_poland() {
        let geo = ProjGeodesy::new().unwrap();
        // About 20.5°E 51.25°N in PL-2000/7 (easting, northing).
        let out = geo
            .transform(
                Zone::Z7,
                CanonicalSystem::Pl1992,
                &[Vec2::new(7_466_893.08, 5_679_143.50)],
            )
            .unwrap();
        let p = out[0];
        assert!((590_000.0..620_000.0).contains(&p.x), "{p:?}");
        assert!((360_000.0..400_000.0).contains(&p.y), "{p:?}");
    }

    #[test]
    fn projection_keeps_west_east_order() {
        // 18°E lies west of the PL-1992 central meridian (19°E).
        let geo = ProjGeodesy::new().unwrap();
        let fwd = geo
            .transform(
                Zone::Z6,
                CanonicalSystem::Pl1992,
                &[Vec2::new(6_500_000.0, 5_800_000.0), Vec2::new(6_570_000.0, 5_800_000.0)],
            )
            .unwrap();
        assert_eq!(fwd.len(), 2);
        assert!(fwd[0].x < 500_000.0);
        assert!(fwd[1].x > fwd[0].x);
    }
}
