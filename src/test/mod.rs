mod emulator;
mod persistent;
mod session;
mod sim_time;
mod telemetry;
