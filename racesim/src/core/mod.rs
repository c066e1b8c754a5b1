pub mod attack_mode;
pub mod car;
pub mod events;
pub mod handle_race;
pub mod overtaking;
pub mod pit_strategy;
pub mod race;
pub mod track;
