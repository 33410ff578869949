pub mod home_assistant;
pub mod modbus;
pub mod open_meteo;
pub mod retry;
