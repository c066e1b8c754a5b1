use crate::core::race::Race;
use crate::post::race_result::RaceResult;
use crate::pre::sim_config::SimPars;
use anyhow::Context;
use flume::{Receiver, Sender};
use log::info;

// throttle of the live timing feed
pub const MAX_PROGRESS_UPDATE_FREQUENCY: f64 = 2.0;

/// One live timing update, sent while the simulation is running.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub race_time: f64,
    pub current_lap: u32,
    pub leader_id: usize,
    pub safety_car_active: bool,
    pub active_cars: usize,
}

/// handle_race validates the inserted parameters, creates and simulates a race,
/// and returns the result record for post-processing.
///
/// An early stop request over `stop_rx` is honored at the next tick boundary
/// only, so all state invariants hold at the stop point. `progress_tx` feeds an
/// optional live timing consumer; the race itself never blocks on it.
pub fn handle_race(
    sim_pars: &SimPars,
    timestep_size: f64,
    print_debug: bool,
    stop_rx: Option<&Receiver<()>>,
    progress_tx: Option<&Sender<ProgressUpdate>>,
) -> anyhow::Result<RaceResult> {
    sim_pars
        .validate(timestep_size)
        .context("Invalid simulation parameters!")?;

    let mut race = Race::new(sim_pars, timestep_size);

    let mut last_printed_lap = 0u32;
    let mut t_progress_update = 0.0;

    while !race.finished() {
        if let Some(rx) = stop_rx {
            if rx.try_recv().is_ok() {
                info!(
                    "early stop requested, race halted at t={:.1}s",
                    race.race_state.race_time
                );
                break;
            }
        }

        race.simulate_timestep();

        if print_debug && race.race_state.current_lap > last_printed_lap {
            println!(
                "INFO: Leader started lap {} at t={:.1}s",
                race.race_state.current_lap, race.race_state.race_time
            );
            last_printed_lap = race.race_state.current_lap;
        }

        if let Some(tx) = progress_tx {
            if race.race_state.race_time
                > t_progress_update + 1.0 / MAX_PROGRESS_UPDATE_FREQUENCY - 0.001
            {
                tx.send(ProgressUpdate {
                    race_time: race.race_state.race_time,
                    current_lap: race.race_state.current_lap,
                    leader_id: race.race_state.leader_id,
                    safety_car_active: race.race_state.safety_car_active,
                    active_cars: race.cars_list.iter().filter(|c| c.active).count(),
                })
                .context("Failed to send progress update!")?;
                t_progress_update = race.race_state.race_time;
            }
        }
    }

    Ok(race.get_race_result())
}
