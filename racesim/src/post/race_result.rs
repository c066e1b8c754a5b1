use std::fmt::Write;
use std::io::Write as IoWrite;

use crate::core::car::{DnfReason, StrategyProfile};
use crate::core::events::EventSummary;
use crate::core::overtaking::OvertakingStats;
use crate::core::pit_strategy::PitStopRecord;
use serde::{Deserialize, Serialize};

/// A single logged race event for post-processing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceEvent {
    pub kind: String, // "Crash", "WeatherRainStart", "WeatherDryStart", "SC_DEPLOYED", "SC_IN"
    pub lap: u32,     // lap number at the time of the event (1-based)
    pub time_s: f64,  // race time in seconds
    pub cars: Vec<usize>, // affected cars (e.g. for a crash)
}

/// One entry of the position history, appended at the configured interval.
/// `ranking` lists car ids in classification order; `distances` and `energy`
/// are indexed by car id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PositionSnapshot {
    pub race_time: f64,
    pub ranking: Vec<usize>,
    pub distances: Vec<f64>,
    pub energy: Vec<f64>,
}

/// One row of the final classification.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassificationEntry {
    pub position: u32,
    pub car_id: usize,
    pub strategy: StrategyProfile,
    pub laps_completed: u32,
    pub total_time: f64,
    pub energy_remaining: f64,
    pub pit_stops: u32,
    pub attack_mode_activations: u32,
    pub dnf_reason: Option<DnfReason>,
}

/// One retired car with the reason and its mileage at retirement.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DnfEntry {
    pub car_id: usize,
    pub reason: DnfReason,
    pub laps_completed: u32,
}

/// RaceResult contains everything required for post-processing a race:
/// classification, per-car aggregates, event and overtaking statistics and the
/// position history. Visualization and Monte Carlo callers consume only this
/// record.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RaceResult {
    pub track_name: String,
    pub num_cars: usize,
    pub random_seed: u64,
    pub classification: Vec<ClassificationEntry>,
    // flat per-car vectors, indexed by car id
    pub final_positions: Vec<u32>,
    pub final_times: Vec<f64>,
    pub laps_completed: Vec<u32>,
    pub dnf_list: Vec<DnfEntry>,
    pub race_events_summary: EventSummary,
    pub overtaking_stats: OvertakingStats,
    pub pit_stops: Vec<PitStopRecord>,
    pub events: Vec<RaceEvent>,
    pub position_history: Vec<PositionSnapshot>,
}

impl RaceResult {
    /// write_classification_to_file writes the final classification and the
    /// event log to a text file in output/. Returns the path of the written
    /// file.
    pub fn write_classification_to_file(
        &self,
        path: Option<&std::path::Path>,
    ) -> anyhow::Result<String> {
        let mut content = String::new();
        writeln!(&mut content, "RESULT: Final classification")?;
        writeln!(&mut content, "{}", self.classification_table()?)?;

        writeln!(&mut content, "RESULT: Race events")?;
        if self.events.is_empty() {
            writeln!(&mut content, "none")?;
        }
        for ev in &self.events {
            if ev.cars.is_empty() {
                writeln!(
                    &mut content,
                    "lap {:3}, {:8.1}s, {}",
                    ev.lap, ev.time_s, ev.kind
                )?;
            } else {
                writeln!(
                    &mut content,
                    "lap {:3}, {:8.1}s, {} (cars {:?})",
                    ev.lap, ev.time_s, ev.kind, ev.cars
                )?;
            }
        }

        writeln!(
            &mut content,
            "RESULT: Overtaking: {} attempts, {} successful ({:.1}%)",
            self.overtaking_stats.total_attempts,
            self.overtaking_stats.total_successes,
            self.overtaking_stats.success_rate * 100.0
        )?;

        let out_dir = std::path::Path::new("output");
        std::fs::create_dir_all(out_dir)?;
        let out_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            out_dir.join("last_run.txt")
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    /// write_json serializes the full result record to a JSON file in output/.
    /// Returns the path of the written file.
    pub fn write_json(&self, path: Option<&std::path::Path>) -> anyhow::Result<String> {
        let out_dir = std::path::Path::new("output");
        std::fs::create_dir_all(out_dir)?;
        let out_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            out_dir.join("last_run.json")
        };

        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)?;
        serde_json::to_writer_pretty(file, self)?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    /// print_classification prints the final classification to the console
    /// output.
    pub fn print_classification(&self) {
        println!("RESULT: Final classification of {}", self.track_name);
        println!(
            "{}",
            self.classification_table()
                .expect("formatting the classification table failed")
        );
        println!(
            "RESULT: {} overtakes from {} attempts, {} safety car phase(s), {} crash(es)",
            self.overtaking_stats.total_successes,
            self.overtaking_stats.total_attempts,
            self.race_events_summary.total_safety_cars,
            self.race_events_summary.total_crashes
        );
    }

    fn classification_table(&self) -> Result<String, std::fmt::Error> {
        let mut table = String::new();
        writeln!(
            &mut table,
            "pos, car, strategy     , laps,     time, pits, boosts, status"
        )?;

        for entry in &self.classification {
            let status = match entry.dnf_reason {
                None => "Finished".to_owned(),
                Some(DnfReason::Crash) => "DNF (crash)".to_owned(),
                Some(DnfReason::Other) => "DNF (other)".to_owned(),
            };
            writeln!(
                &mut table,
                "{:3}, {:3}, {:13}, {:4}, {:8.1}, {:4}, {:6}, {}",
                entry.position,
                entry.car_id,
                format!("{:?}", entry.strategy).to_lowercase(),
                entry.laps_completed,
                entry.total_time,
                entry.pit_stops,
                entry.attack_mode_activations,
                status
            )?;
        }

        Ok(table)
    }
}
