use crate::core::track::TrackPars;
use crate::pre::sim_config::{
    AttackModePars, ConfigError, EnergyPars, EventPars, OvertakePars, PitPars, RacePars, SimPars,
};
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// read_sim_pars reads the JSON file and decodes the JSON string into the
/// simulation parameters struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.to_str().unwrap_or("unknown")
    ))?;
    Ok(pars)
}

/// A race scenario without inline track parameters; the track is loaded by name
/// from input/tracks/.
#[derive(Debug, Deserialize, Clone)]
pub struct RaceScenarioFile {
    pub race_pars: RacePars,
    #[serde(default)]
    pub event_pars: EventPars,
    #[serde(default)]
    pub overtake_pars: OvertakePars,
    #[serde(default)]
    pub attack_pars: AttackModePars,
    #[serde(default)]
    pub pit_pars: PitPars,
    #[serde(default)]
    pub energy_pars: EnergyPars,
}

pub fn read_race_scenario(filepath: &Path) -> anyhow::Result<RaceScenarioFile> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open race scenario file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse race scenario file {}!",
        filepath.to_str().unwrap_or("unknown")
    ))?;
    Ok(pars)
}

pub fn read_track_pars(filepath: &Path) -> anyhow::Result<TrackPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open track config file {}!",
            filepath.to_str().unwrap_or("unknown")
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse track config file {}!",
        filepath.to_str().unwrap_or("unknown")
    ))?;
    Ok(pars)
}

/// Flexible reader: tries a full parameter file first; if that fails, reads a
/// scenario-only file (without `track_pars`) and loads the track from
/// `input/tracks/{track_name}.json`. A scenario naming a track that has no such
/// file is a configuration error.
pub fn read_sim_pars_flexible(filepath: &Path) -> anyhow::Result<SimPars> {
    match read_sim_pars(filepath) {
        Ok(p) => Ok(p),
        Err(_) => {
            let scen = read_race_scenario(filepath)?;
            let track_name = scen.race_pars.track_name.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "Scenario missing track_name; required when track_pars is not present"
                )
            })?;
            let track_path: std::path::PathBuf =
                ["input", "tracks", &format!("{}.json", track_name)]
                    .iter()
                    .collect();

            if !track_path.is_file() {
                return Err(ConfigError::UnknownTrack(track_name).into());
            }

            let track_pars = read_track_pars(&track_path)?;
            Ok(SimPars {
                race_pars: scen.race_pars,
                track_pars,
                event_pars: scen.event_pars,
                overtake_pars: scen.overtake_pars,
                attack_pars: scen.attack_pars,
                pit_pars: scen.pit_pars,
                energy_pars: scen.energy_pars,
            })
        }
    }
}
