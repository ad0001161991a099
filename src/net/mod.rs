pub mod aoi;
pub mod arena_session;
pub mod connections;
pub mod dos_protection;
pub mod fight_session;
pub mod handler;
pub mod protocol;
pub mod tls;
pub mod transport;
