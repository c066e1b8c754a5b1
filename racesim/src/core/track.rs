use anyhow::{Context, Result};
use helpers::general::lin_interp;
use log::warn;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// * `name` - Track name
/// * `length` - (m) Length of the track
/// * `reference_lap_time` - (s) Race lap time of a nominal car on this track
/// * `attack_zone` - (m) Start and end of the attack mode activation zone (track coordinates)
/// * `friction_profile` - Inline (s, mu) sample points of the local grip profile
/// * `friction_csv` - CSV file in input/tracks/ to load the grip profile from instead
#[derive(Debug, Deserialize, Clone)]
pub struct TrackPars {
    pub name: String,
    pub length: f64,
    pub reference_lap_time: f64,
    pub attack_zone: [f64; 2],
    #[serde(default)]
    pub friction_profile: Vec<[f64; 2]>,
    #[serde(default)]
    pub friction_csv: Option<String>,
}

/// TrackProfile is the runtime form of the track parameters: length, reference
/// lap time and a position-indexed grip lookup. Everything else about the track
/// (geometry, elevation, racing line) stays outside the simulator.
#[derive(Debug)]
pub struct TrackProfile {
    pub name: String,
    pub length: f64,
    pub reference_lap_time: f64,
    pub attack_zone: [f64; 2],
    friction_s: Vec<f64>,
    friction_mu: Vec<f64>,
}

/// CSV row of a grip profile file.
#[derive(Debug, Deserialize, Clone)]
pub struct CsvFrictionEl {
    pub s_m: f64,
    pub mu: f64,
}

/// read_friction_profile reads (s, mu) sample points from a CSV file.
pub fn read_friction_profile(filepath: &Path) -> Result<Vec<[f64; 2]>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open friction profile file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;

    let mut csv_reader = csv::Reader::from_reader(&fh);
    let mut samples: Vec<[f64; 2]> = vec![];

    for result in csv_reader.deserialize() {
        let el: CsvFrictionEl = result?;
        samples.push([el.s_m, el.mu]);
    }

    Ok(samples)
}

impl TrackProfile {
    pub fn new(track_pars: &TrackPars) -> TrackProfile {
        // inline samples take precedence, a named CSV file is the fallback
        let mut samples = track_pars.friction_profile.to_owned();

        if samples.is_empty() {
            if let Some(csv_name) = &track_pars.friction_csv {
                let mut csv_path = std::path::PathBuf::new();
                csv_path.push("input");
                csv_path.push("tracks");
                csv_path.push(csv_name);

                samples = read_friction_profile(&csv_path).unwrap_or_else(|e| {
                    warn!(
                        "could not load friction profile {:?}: {}. Defaulting to 1.0",
                        csv_path, e
                    );
                    vec![]
                });
            }
        }

        // the interpolation helper requires increasing sample positions
        samples.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap());

        TrackProfile {
            name: track_pars.name.to_owned(),
            length: track_pars.length,
            reference_lap_time: track_pars.reference_lap_time,
            attack_zone: track_pars.attack_zone,
            friction_s: samples.iter().map(|el| el[0]).collect(),
            friction_mu: samples.iter().map(|el| el[1]).collect(),
        }
    }

    /// The method returns the local grip multiplier at the given track coordinate.
    /// A track without a profile is uniformly 1.0.
    pub fn local_friction(&self, s_track: f64) -> f64 {
        if self.friction_s.is_empty() {
            return 1.0;
        }
        lin_interp(s_track, &self.friction_s, &self.friction_mu)
    }

    /// The method checks whether the given track coordinate lies within the
    /// attack mode activation zone.
    pub fn is_in_attack_zone(&self, s_track: f64) -> bool {
        let zone = self.attack_zone;
        if zone[0] <= zone[1] {
            // normal case: zone does not wrap around the finish line
            s_track >= zone[0] && s_track <= zone[1]
        } else {
            // wrap-around case: zone crosses the finish line
            s_track >= zone[0] || s_track <= zone[1]
        }
    }

    /// The method returns the average speed of a nominal car over one lap.
    pub fn base_speed(&self) -> f64 {
        self.length / self.reference_lap_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tempelhof() -> TrackPars {
        TrackPars {
            name: "Tempelhof".to_owned(),
            length: 2400.0,
            reference_lap_time: 64.0,
            attack_zone: [480.0, 600.0],
            friction_profile: vec![[0.0, 1.0], [1200.0, 0.9], [2400.0, 1.0]],
            friction_csv: None,
        }
    }

    #[test]
    fn friction_is_interpolated_between_samples() {
        let track = TrackProfile::new(&tempelhof());
        assert_relative_eq!(track.local_friction(0.0), 1.0);
        assert_relative_eq!(track.local_friction(600.0), 0.95);
        assert_relative_eq!(track.local_friction(1200.0), 0.9);
    }

    #[test]
    fn track_without_profile_has_uniform_grip() {
        let mut pars = tempelhof();
        pars.friction_profile.clear();
        let track = TrackProfile::new(&pars);
        assert_relative_eq!(track.local_friction(1700.0), 1.0);
    }

    #[test]
    fn attack_zone_handles_wrap_around() {
        let mut pars = tempelhof();
        pars.attack_zone = [2300.0, 100.0];
        let track = TrackProfile::new(&pars);
        assert!(track.is_in_attack_zone(2350.0));
        assert!(track.is_in_attack_zone(50.0));
        assert!(!track.is_in_attack_zone(1200.0));
    }

    #[test]
    fn base_speed_follows_reference_lap_time() {
        let track = TrackProfile::new(&tempelhof());
        assert_relative_eq!(track.base_speed(), 37.5);
    }
}
