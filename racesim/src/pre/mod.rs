pub mod read_sim_pars;
pub mod sim_config;
pub mod sim_opts;
