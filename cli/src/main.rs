use clap::Parser;
use fe_racesim::core::handle_race::handle_race;
use fe_racesim::post::race_result::RaceResult;
use fe_racesim::pre::read_sim_pars::read_sim_pars_flexible;
use fe_racesim::pre::sim_config::SimPars;
use fe_racesim::pre::sim_opts::SimOpts;
use helpers::general::argmax;
use rayon::prelude::*;
use std::thread;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        println!("INFO: Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars_flexible(parfile_path)?
    } else {
        anyhow::bail!("No parameter file provided! Use -p <path_to_json> to run the simulation.");
    };

    if let Some(seed) = sim_opts.random_seed {
        sim_pars.race_pars.random_seed = seed;
    }

    // print race details
    println!(
        "INFO: Simulating {} with {} cars, {:.1} min + time step {:.3}s, seed {}",
        sim_pars.track_pars.name,
        sim_pars.race_pars.num_cars,
        sim_pars.race_pars.race_duration_min,
        sim_opts.timestep_size,
        sim_pars.race_pars.random_seed
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.no_sim_runs <= 1 {
        let t_start = Instant::now();
        let race_result = if sim_opts.live {
            run_with_live_timing(&sim_pars, &sim_opts)?
        } else {
            handle_race(&sim_pars, sim_opts.timestep_size, sim_opts.debug, None, None)?
        };
        println!("INFO: Execution time: {}ms", t_start.elapsed().as_millis());

        race_result.print_classification();

        let txt_path = race_result.write_classification_to_file(None)?;
        let json_path = race_result.write_json(None)?;
        println!("INFO: Results written to {} and {}", txt_path, json_path);
    } else {
        // repeated runs on consecutive seeds, simulated in parallel
        let t_start = Instant::now();
        let base_seed = sim_pars.race_pars.random_seed;

        let results: Vec<RaceResult> = (0..sim_opts.no_sim_runs)
            .into_par_iter()
            .map(|run| {
                let mut pars_run = sim_pars.clone();
                pars_run.race_pars.random_seed = base_seed.wrapping_add(run as u64);
                handle_race(&pars_run, sim_opts.timestep_size, false, None, None)
            })
            .collect::<anyhow::Result<Vec<RaceResult>>>()?;

        println!(
            "INFO: Simulated {} races in {}ms",
            results.len(),
            t_start.elapsed().as_millis()
        );

        print_multi_run_summary(&sim_pars, &results);
    }

    Ok(())
}

/// Simulates the race in a worker thread and prints the live timing feed on the
/// main thread until the channel closes.
fn run_with_live_timing(sim_pars: &SimPars, sim_opts: &SimOpts) -> anyhow::Result<RaceResult> {
    let (tx, rx) = flume::unbounded();
    let pars_thread = sim_pars.clone();
    let timestep_size = sim_opts.timestep_size;
    let print_debug = sim_opts.debug;

    let sim_thread = thread::spawn(move || {
        handle_race(&pars_thread, timestep_size, print_debug, None, Some(&tx))
    });

    for update in rx.iter() {
        println!(
            "INFO: t={:7.1}s | lap {:3} | leader car {:2} | {:2} cars running{}",
            update.race_time,
            update.current_lap,
            update.leader_id,
            update.active_cars,
            if update.safety_car_active {
                " | SAFETY CAR"
            } else {
                ""
            }
        );
    }

    sim_thread
        .join()
        .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))?
}

/// Prints which car won how often and the aggregate event counts over all runs.
fn print_multi_run_summary(sim_pars: &SimPars, results: &[RaceResult]) {
    let num_cars = sim_pars.race_pars.num_cars;
    let mut wins = vec![0u32; num_cars];
    let mut total_crashes = 0;
    let mut total_safety_cars = 0;
    let mut total_overtakes = 0u64;

    for result in results {
        if let Some(winner) = result.classification.first() {
            wins[winner.car_id] += 1;
        }
        total_crashes += result.race_events_summary.total_crashes;
        total_safety_cars += result.race_events_summary.total_safety_cars;
        total_overtakes += result.overtaking_stats.total_successes;
    }

    println!("RESULT: Wins per car over {} runs", results.len());
    for (car_id, win_count) in wins.iter().enumerate() {
        if *win_count > 0 {
            println!("car {:2}: {:4} wins", car_id, win_count);
        }
    }

    let best_car = argmax(&wins);
    println!(
        "RESULT: Car {} wins most often ({}/{} races)",
        best_car, wins[best_car], results.len()
    );
    println!(
        "RESULT: Aggregates: {} crashes, {} safety car phases, {} overtakes",
        total_crashes, total_safety_cars, total_overtakes
    );
}
